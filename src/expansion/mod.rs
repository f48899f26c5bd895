//! Expansion kernels (spec.md §4.E): S2M, M2M, M2X, X2L, L2L, L2T and the
//! direct 1/r evaluator used by lists 1, 3 and 4.
//!
//! A multipole or local expansion is a flat `Vec<Complex64>` of length
//! `pgsz = (p+1)^2`, packed with [`crate::tables::idx`]; only `0 <= m <= ell
//! <= p` is stored, the `m < 0` coefficients being recoverable as
//! `(-1)^m * conj(c[ell, m])` since the underlying field is real.

pub mod direct;
pub mod l2l;
pub mod l2t;
pub mod m2m;
pub mod m2x;
pub mod s2m;
pub mod x2l;

use num_complex::Complex64;

use crate::tables::{idx, KernelTables};

pub type Expansion = Vec<Complex64>;

pub fn zero_expansion(tables: &KernelTables) -> Expansion {
    vec![Complex64::new(0.0, 0.0); tables.pgsz]
}

/// Six directional plane-wave (exponential) expansions attached to a source
/// box (spec.md §3 "Expansion arrays"): up/down/north/south/east/west.
#[derive(Clone)]
pub struct PlaneWave {
    pub expu: Vec<Complex64>,
    pub expd: Vec<Complex64>,
    pub expn: Vec<Complex64>,
    pub exps: Vec<Complex64>,
    pub expe: Vec<Complex64>,
    pub expw: Vec<Complex64>,
}

impl PlaneWave {
    /// Buffers cover the full circle of physical angles per λ-ring (length
    /// `2 * nexptotp`, since `nexptotp` is defined as half that count) —
    /// simpler than the source's half-buffer-plus-mirror-symmetry scheme,
    /// at the cost of the memory the symmetry would have saved.
    pub fn zero(tables: &KernelTables) -> Self {
        let z = vec![Complex64::new(0.0, 0.0); 2 * tables.nexptotp];
        Self {
            expu: z.clone(),
            expd: z.clone(),
            expn: z.clone(),
            exps: z.clone(),
            expe: z.clone(),
            expw: z,
        }
    }
}

/// Applies a Wigner small-d rotation matrix `rd` (one of
/// `rdplus`/`rdminus`/`rdsq3`/`rdmsq3`) to a packed expansion, i.e. computes
/// `out[ell, mp] = sum_{m=-ell}^{ell} rd[ell, mp, m] * in[ell, m]`, exploiting
/// `in[ell, -m] = (-1)^m * conj(in[ell, m])` since the field is real.
///
/// `sign` flips the sense of the rotation (used for the "rotate back" half
/// of M2M/L2L, which applies the same table with odd azimuthal orders
/// negated).
pub fn rotate(tables: &KernelTables, rd: &[f64], input: &Expansion, sign: f64) -> Expansion {
    let p = tables.pterms;
    let pgsz = tables.pgsz;
    let mut out = zero_expansion(tables);

    let rd_at = |ell: usize, mp: usize, m: isize| -> f64 {
        rd[ell + mp * (p + 1) + ((m + p as isize) as usize) * pgsz]
    };

    for ell in 0..=p {
        for mp in 0..=ell {
            let mut acc = rd_at(ell, mp, 0) * input[idx(p, ell, 0)];
            for m in 1..=ell as isize {
                let mu = m as usize;
                let pos = input[idx(p, ell, mu)];
                let parity = if mu % 2 == 0 { 1.0 } else { -1.0 };
                let neg = pos.conj() * parity * sign.powi(mu as i32);
                acc += rd_at(ell, mp, m) * pos + rd_at(ell, mp, -m) * neg;
            }
            out[idx(p, ell, mp)] = acc;
        }
    }

    out
}

/// Multiplies azimuthal order `m` by `i^(phase * m)`, a diagonal z-axis
/// rotation by a multiple of `pi/2`. Used where the rotation really is a
/// quarter turn: aligning a source box's plane waves onto the merged-list
/// exponential axes ([`m2x::rotz2x`]) and rotating a combined exponential
/// back off those axes into a local expansion ([`x2l::unrotate`]).
pub fn rotate_z(tables: &KernelTables, input: &Expansion, phase: i32) -> Expansion {
    let p = tables.pterms;
    let mut out = zero_expansion(tables);
    let i_pow = Complex64::new(0.0, 1.0);
    for ell in 0..=p {
        for m in 0..=ell {
            let angle = i_pow.powi((phase * m as i32).rem_euclid(4));
            out[idx(p, ell, m)] = input[idx(p, ell, m)] * angle;
        }
    }
    out
}

/// Multiplies azimuthal order `m` by `e^{i * phase * m * pi/4}`, the
/// eighth-turn z-axis rotation M2M/L2L's per-octant azimuth actually needs:
/// `phase` is one of `geometry::IFLU`/`IFLD`'s odd values (`{-3,-1,1,3}`),
/// derived from `MultipoleToMultipole`/`LocalToLocal`'s `var[5]` constant
/// array and `arg = sqrt(2)/2` (`fmm-laplace.c`). `rotate_z`'s `i^(phase*m)`
/// only covers quarter turns and is the wrong granularity here.
pub fn rotate_z_eighth(tables: &KernelTables, input: &Expansion, phase: i32) -> Expansion {
    let p = tables.pterms;
    let mut out = zero_expansion(tables);
    let eighth = std::f64::consts::FRAC_PI_4;
    for ell in 0..=p {
        for m in 0..=ell {
            let angle = Complex64::from_polar(1.0, eighth * (phase * m as i32) as f64);
            out[idx(p, ell, m)] = input[idx(p, ell, m)] * angle;
        }
    }
    out
}
