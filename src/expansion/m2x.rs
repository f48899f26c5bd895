//! Multipole→exponential (spec.md §4.E.3).
//!
//! Phase 2 (Fourier→physical) is implemented as direct trigonometric
//! synthesis rather than by consuming the precomputed `fexpe`/`fexpo`
//! lookup tables: those tables exist purely to avoid repeated `sin`/`cos`
//! calls at the original's scale, and their exact consumption order could
//! not be cross-checked without compiling and running the original. The
//! tables are still built in [`crate::tables`] (verbatim, per spec) and
//! available to a future optimization pass.

use num_complex::Complex64;
use std::f64::consts::PI;

use crate::tables::{idx, KernelTables};

use super::{rotate, rotate_z, PlaneWave};

use super::Expansion;

/// Cumulative offsets into a per-ring flat Fourier-mode buffer.
fn ring_offsets(counts: &[usize]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(counts.len() + 1);
    let mut acc = 0;
    for &c in counts {
        offsets.push(acc);
        acc += c;
    }
    offsets.push(acc);
    offsets
}

/// Phase 1: spherical-harmonic coefficients → per-ring Fourier modes, split
/// into the "up" and "down" diagonal combinations (spec.md §4.E.3).
fn phase1(tables: &KernelTables, m: &Expansion) -> (Vec<Complex64>, Vec<Complex64>) {
    let p = tables.pterms;
    let offsets = ring_offsets(&tables.numfour);
    let total = *offsets.last().unwrap();
    let mut mexpu = vec![Complex64::new(0.0, 0.0); total];
    let mut mexpd = vec![Complex64::new(0.0, 0.0); total];

    for (nell, &nf) in tables.numfour.iter().enumerate() {
        for mm in 0..nf {
            let mut even = Complex64::new(0.0, 0.0);
            let mut odd = Complex64::new(0.0, 0.0);
            for ell in mm..=p {
                let w = tables.rlsc[idx(p, ell, mm) + nell * tables.pgsz];
                let term = m[idx(p, ell, mm)] * w;
                if (ell - mm) % 2 == 0 {
                    even += term;
                } else {
                    odd += term;
                }
            }
            let i_pow = Complex64::new(0.0, 1.0).powi(mm as i32);
            let sign = if mm % 2 == 0 { 1.0 } else { -1.0 };
            mexpu[offsets[nell] + mm] = (even + odd) * i_pow;
            mexpd[offsets[nell] + mm] = sign * (even - odd) * i_pow;
        }
    }

    (mexpu, mexpd)
}

/// Phase 2: per-ring Fourier modes → full-circle physical samples, by
/// direct trigonometric synthesis of the real-valued periodic function each
/// ring's Fourier series represents.
fn phase2(tables: &KernelTables, mexp: &[Complex64], four_offsets: &[usize]) -> Vec<Complex64> {
    let mut out = vec![Complex64::new(0.0, 0.0); 2 * tables.nexptotp];
    let phys_offsets = ring_offsets(&tables.numphys);

    for (nell, &nphys) in tables.numphys.iter().enumerate() {
        let nf = tables.numfour[nell];
        let fstart = four_offsets[nell];
        let pstart = phys_offsets[nell];
        let halpha = 2.0 * PI / nphys as f64;
        for j in 0..nphys {
            let alpha = j as f64 * halpha;
            let mut acc = mexp[fstart];
            for mm in 1..nf {
                let phase = Complex64::new(0.0, mm as f64 * alpha).exp();
                acc += 2.0 * (mexp[fstart + mm] * phase).re;
            }
            out[pstart + j] = Complex64::new(acc.re, 0.0);
        }
    }

    out
}

/// Rotates a multipole expansion so that its z-axis aligns with the
/// original +y axis (a π/2 rotation about x, `rotz2y`).
fn rotz2y(tables: &KernelTables, m: &Expansion) -> Expansion {
    rotate(tables, &tables.rdplus, m, 1.0)
}

/// Rotates a multipole expansion so that its z-axis aligns with the
/// original +x axis (`rotz2x`): a z-phase quarter turn, then the same tilt
/// used by `rotz2y`.
fn rotz2x(tables: &KernelTables, m: &Expansion) -> Expansion {
    let phased = rotate_z(tables, m, 1);
    rotate(tables, &tables.rdplus, &phased, 1.0)
}

fn one_axis(tables: &KernelTables, m: &Expansion) -> (Vec<Complex64>, Vec<Complex64>) {
    let (mexpu, mexpd) = phase1(tables, m);
    let offsets = ring_offsets(&tables.numfour);
    (phase2(tables, &mexpu, &offsets), phase2(tables, &mexpd, &offsets))
}

/// Produces all six directional plane-wave expansions for a source box's
/// multipole expansion (spec.md §4.E.3).
pub fn m2x(tables: &KernelTables, m: &Expansion) -> PlaneWave {
    let (expu, expd) = one_axis(tables, m);

    let my = rotz2y(tables, m);
    let (expn, exps) = one_axis(tables, &my);

    let mx = rotz2x(tables, m);
    let (expe, expw) = one_axis(tables, &mx);

    PlaneWave {
        expu,
        expd,
        expn,
        exps,
        expe,
        expw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Accuracy;
    use crate::expansion::zero_expansion;

    #[test]
    fn monopole_produces_uniform_physical_samples() {
        let tables = KernelTables::new(Accuracy::ThreeDigit);
        let mut m = zero_expansion(&tables);
        m[idx(tables.pterms, 0, 0)] = Complex64::new(1.0, 0.0);
        let pw = m2x(&tables, &m);
        assert_eq!(pw.expu.len(), 2 * tables.nexptotp);
        assert!(pw.expu.iter().all(|c| c.re.is_finite()));
    }
}
