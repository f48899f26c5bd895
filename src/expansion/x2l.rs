//! Exponential→local (spec.md §4.E.4).
//!
//! Consumes the twenty-eight merged lists of spec.md §4.F
//! ([`crate::merge::MergedLists`]): each named list is first collapsed into
//! one physical plane-wave buffer per direction (`MakeUList`/`MakeDList` in
//! `fmm-laplace.c`), then, per target child, the relevant up to four lists
//! per axis are combined with that child's own octant-dependent phase
//! factors (`processudexp`/`processnsexp`/`processewexp`) into a local
//! contribution — one pass along z, one along y (after rotating into the
//! z-frame), one along x.

use num_complex::Complex64;
use std::f64::consts::PI;

use crate::geometry::{XOFF, YOFF, ZOFF};
use crate::merge::MergedLists;
use crate::tables::{idx, KernelTables};

use super::{rotate, rotate_z, zero_expansion, Expansion, PlaneWave};

/// Which of a source box's six plane-wave buffers a merged list is built
/// from, and which rotated frame its contribution lands in before the
/// un-rotate back to the box's native axes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Z,
    Y,
    X,
}

/// Which per-ring lateral phase table (`xs_`/`ys_` in the original) a
/// merged-list entry's own child-offset contributes through.
#[derive(Clone, Copy)]
enum Table {
    Xs,
    Ys,
}

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

/// Up/down sense of a merged list's colleague-child offset conjugation
/// (`MakeUList` applies `xs`/`ys` directly for a positive offset and
/// conjugated for a negative one; `MakeDList` inverts that).
#[derive(Clone, Copy)]
enum Direction {
    Up,
    Down,
}

fn lateral_factor(tables: &KernelTables, nell: usize, j: usize, nphys: usize, power: i32, conj: bool) -> Complex64 {
    let rlam = tables.rlams[nell];
    let angle = j as f64 * (2.0 * PI / nphys as f64);
    let base = Complex64::new(0.0, power as f64 * rlam * angle.cos()).exp();
    if conj {
        base.conj()
    } else {
        base
    }
}

fn lateral_factor_sin(tables: &KernelTables, nell: usize, j: usize, nphys: usize, power: i32, conj: bool) -> Complex64 {
    let rlam = tables.rlams[nell];
    let angle = j as f64 * (2.0 * PI / nphys as f64);
    let base = Complex64::new(0.0, power as f64 * rlam * angle.sin()).exp();
    if conj {
        base.conj()
    } else {
        base
    }
}

/// Collapses one named merged list into a single full-circle physical
/// buffer (`MakeUList`/`MakeDList`, `fmm-laplace.c`): each entry's source
/// directional buffer is folded in with the phase factor its own `(xoff,
/// yoff)` demands, direct or conjugated depending on sign and on whether
/// this is the "up" or "down" collapse.
fn make_list(
    tables: &KernelTables,
    entries: &[(usize, i32, i32)],
    component: impl Fn(&PlaneWave) -> &[Complex64],
    source_plane_waves: &dyn Fn(usize) -> Option<&PlaneWave>,
    direction: Direction,
) -> Vec<Complex64> {
    let mut out = vec![Complex64::new(0.0, 0.0); 2 * tables.nexptotp];
    let phys_offsets = ring_offsets(&tables.numphys);

    for &(child, xoff, yoff) in entries {
        let Some(pw) = source_plane_waves(child) else {
            continue;
        };
        let src = component(pw);

        for (nell, &nphys) in tables.numphys.iter().enumerate() {
            let pstart = phys_offsets[nell];
            for j in 0..nphys {
                let mut zmul = Complex64::new(1.0, 0.0);
                if xoff != 0 {
                    let (power, conj) = match direction {
                        Direction::Up => (xoff.abs(), xoff < 0),
                        Direction::Down => (xoff.abs(), xoff > 0),
                    };
                    zmul *= lateral_factor(tables, nell, j, nphys, power, conj);
                }
                if yoff != 0 {
                    let (power, conj) = match direction {
                        Direction::Up => (yoff.abs(), yoff < 0),
                        Direction::Down => (yoff.abs(), yoff > 0),
                    };
                    zmul *= lateral_factor_sin(tables, nell, j, nphys, power, conj);
                }
                out[pstart + j] += src[pstart + j] * zmul;
            }
        }
    }

    out
}

/// The twenty-eight merged lists, each already collapsed to one physical
/// buffer per direction (spec.md §4.F).
pub struct MergedExponentials {
    uall: Vec<Complex64>,
    u1234: Vec<Complex64>,
    dall: Vec<Complex64>,
    d5678: Vec<Complex64>,
    nall: Vec<Complex64>,
    n1256: Vec<Complex64>,
    n12: Vec<Complex64>,
    n56: Vec<Complex64>,
    sall: Vec<Complex64>,
    s3478: Vec<Complex64>,
    s34: Vec<Complex64>,
    s78: Vec<Complex64>,
    eall: Vec<Complex64>,
    e1357: Vec<Complex64>,
    e13: Vec<Complex64>,
    e57: Vec<Complex64>,
    e1: Vec<Complex64>,
    e3: Vec<Complex64>,
    e5: Vec<Complex64>,
    e7: Vec<Complex64>,
    wall: Vec<Complex64>,
    w2468: Vec<Complex64>,
    w24: Vec<Complex64>,
    w68: Vec<Complex64>,
    w2: Vec<Complex64>,
    w4: Vec<Complex64>,
    w6: Vec<Complex64>,
    w8: Vec<Complex64>,
}

impl MergedExponentials {
    pub fn build(tables: &KernelTables, lists: &MergedLists, source_plane_waves: &dyn Fn(usize) -> Option<&PlaneWave>) -> Self {
        let up = |entries: &[(usize, i32, i32)], component: fn(&PlaneWave) -> &[Complex64]| {
            make_list(tables, entries, component, source_plane_waves, Direction::Up)
        };
        let down = |entries: &[(usize, i32, i32)], component: fn(&PlaneWave) -> &[Complex64]| {
            make_list(tables, entries, component, source_plane_waves, Direction::Down)
        };

        Self {
            uall: up(&lists.uall, |p| &p.expd),
            u1234: up(&lists.u1234, |p| &p.expd),
            dall: down(&lists.dall, |p| &p.expu),
            d5678: down(&lists.d5678, |p| &p.expu),
            nall: up(&lists.nall, |p| &p.exps),
            n1256: up(&lists.n1256, |p| &p.exps),
            n12: up(&lists.n12, |p| &p.exps),
            n56: up(&lists.n56, |p| &p.exps),
            sall: down(&lists.sall, |p| &p.expn),
            s3478: down(&lists.s3478, |p| &p.expn),
            s34: down(&lists.s34, |p| &p.expn),
            s78: down(&lists.s78, |p| &p.expn),
            eall: up(&lists.eall, |p| &p.expw),
            e1357: up(&lists.e1357, |p| &p.expw),
            e13: up(&lists.e13, |p| &p.expw),
            e57: up(&lists.e57, |p| &p.expw),
            e1: up(&lists.e1, |p| &p.expw),
            e3: up(&lists.e3, |p| &p.expw),
            e5: up(&lists.e5, |p| &p.expw),
            e7: up(&lists.e7, |p| &p.expw),
            wall: down(&lists.wall, |p| &p.expe),
            w2468: down(&lists.w2468, |p| &p.expe),
            w24: down(&lists.w24, |p| &p.expe),
            w68: down(&lists.w68, |p| &p.expe),
            w2: down(&lists.w2, |p| &p.expe),
            w4: down(&lists.w4, |p| &p.expe),
            w6: down(&lists.w6, |p| &p.expe),
            w8: down(&lists.w8, |p| &p.expe),
        }
    }
}

/// Scales one merged-list buffer by its z-power decay and up to two lateral
/// phase factors (the child's own `xoff`/`yoff` position within its parent,
/// spec.md §4.E.4), adding the result into `dest`.
fn add_scaled(tables: &KernelTables, dest: &mut [Complex64], src: &[Complex64], zs_power: i32, lat: &[(Table, bool)]) {
    let phys_offsets = ring_offsets(&tables.numphys);
    for (nell, &nphys) in tables.numphys.iter().enumerate() {
        let rlam = tables.rlams[nell];
        let decay = (-rlam * zs_power as f64).exp();
        let pstart = phys_offsets[nell];
        for j in 0..nphys {
            let mut lateral = Complex64::new(1.0, 0.0);
            for &(table, conj) in lat {
                lateral *= match table {
                    Table::Xs => lateral_factor(tables, nell, j, nphys, 1, conj),
                    Table::Ys => lateral_factor_sin(tables, nell, j, nphys, 1, conj),
                };
            }
            dest[pstart + j] += src[pstart + j] * decay * lateral;
        }
    }
}

fn sum_group(tables: &KernelTables, entries: &[(&[Complex64], i32)], lat: &[(Table, bool)]) -> Vec<Complex64> {
    let mut out = vec![Complex64::new(0.0, 0.0); 2 * tables.nexptotp];
    for &(src, zs_power) in entries {
        add_scaled(tables, &mut out, src, zs_power, lat);
    }
    out
}

/// Per-target-child z-direction combination (`fmm-laplace.c` lines 493-760):
/// `uall`/`u1234` feed the up stream, `dall`/`d5678` the down stream, with
/// the richer (quarter-list) pair on whichever side is farther from the
/// colleague it draws from.
fn combine_z(tables: &KernelTables, mex: &MergedExponentials, child: usize) -> (Vec<Complex64>, Vec<Complex64>) {
    let lat_up: Vec<(Table, bool)> = [(Table::Xs, XOFF[child] == 1), (Table::Ys, YOFF[child] == 1)]
        .into_iter()
        .filter(|(_, bit)| *bit)
        .map(|(t, _)| (t, true))
        .collect();
    let lat_down: Vec<(Table, bool)> = lat_up.iter().map(|&(t, _)| (t, false)).collect();

    let (up_entries, down_entries): (Vec<(&[Complex64], i32)>, Vec<(&[Complex64], i32)>) = if ZOFF[child] == 0 {
        (vec![(&mex.uall[..], 2), (&mex.u1234[..], 1)], vec![(&mex.dall[..], 1)])
    } else {
        (vec![(&mex.uall[..], 1)], vec![(&mex.dall[..], 2), (&mex.d5678[..], 1)])
    };

    (
        sum_group(tables, &up_entries, &lat_up),
        sum_group(tables, &down_entries, &lat_down),
    )
}

/// Per-target-child y-direction combination (`fmm-laplace.c` lines 784-1170).
/// After rotation into the z-frame, the lateral phase roles swap: the
/// child's x-offset drives the `ys_` factor and its z-offset drives `xs_`.
fn combine_y(tables: &KernelTables, mex: &MergedExponentials, child: usize) -> (Vec<Complex64>, Vec<Complex64>) {
    let lat_up: Vec<(Table, bool)> = [(Table::Ys, XOFF[child] == 1), (Table::Xs, ZOFF[child] == 1)]
        .into_iter()
        .filter(|(_, bit)| *bit)
        .map(|(t, _)| (t, true))
        .collect();
    let lat_down: Vec<(Table, bool)> = lat_up.iter().map(|&(t, _)| (t, false)).collect();

    let (up_entries, down_entries): (Vec<(&[Complex64], i32)>, Vec<(&[Complex64], i32)>) = if YOFF[child] == 0 {
        let third = if ZOFF[child] == 0 { &mex.n12[..] } else { &mex.n56[..] };
        (
            vec![(&mex.nall[..], 2), (&mex.n1256[..], 1), (third, 1)],
            vec![(&mex.sall[..], 1)],
        )
    } else {
        let third = if ZOFF[child] == 0 { &mex.s34[..] } else { &mex.s78[..] };
        (
            vec![(&mex.nall[..], 1)],
            vec![(&mex.sall[..], 2), (&mex.s3478[..], 1), (third, 1)],
        )
    };

    (
        sum_group(tables, &up_entries, &lat_up),
        sum_group(tables, &down_entries, &lat_down),
    )
}

/// Per-target-child x-direction combination (`fmm-laplace.c` lines
/// 1170-1594). Unlike z and y, the two lateral roles are not conjugated in
/// the same sense: the child's y-offset conjugates on the "up" (east) side,
/// but its z-offset is applied directly there and conjugated on the "down"
/// (west) side instead.
fn combine_x(tables: &KernelTables, mex: &MergedExponentials, child: usize) -> (Vec<Complex64>, Vec<Complex64>) {
    let y_bit = YOFF[child] == 1;
    let z_bit = ZOFF[child] == 1;
    let mut lat_up = Vec::new();
    if y_bit {
        lat_up.push((Table::Ys, true));
    }
    if z_bit {
        lat_up.push((Table::Xs, false));
    }
    let mut lat_down = Vec::new();
    if y_bit {
        lat_down.push((Table::Ys, false));
    }
    if z_bit {
        lat_down.push((Table::Xs, true));
    }

    let e_single = |z: bool, y: bool| -> &[Complex64] {
        match (z, y) {
            (false, false) => &mex.e1,
            (false, true) => &mex.e3,
            (true, false) => &mex.e5,
            (true, true) => &mex.e7,
        }
    };
    let w_single = |z: bool, y: bool| -> &[Complex64] {
        match (z, y) {
            (false, false) => &mex.w2,
            (false, true) => &mex.w4,
            (true, false) => &mex.w6,
            (true, true) => &mex.w8,
        }
    };

    let (up_entries, down_entries): (Vec<(&[Complex64], i32)>, Vec<(&[Complex64], i32)>) = if XOFF[child] == 0 {
        let quarter = if !z_bit { &mex.e13[..] } else { &mex.e57[..] };
        (
            vec![(&mex.eall[..], 2), (&mex.e1357[..], 1), (quarter, 1), (e_single(z_bit, y_bit), 1)],
            vec![(&mex.wall[..], 1)],
        )
    } else {
        let quarter = if !z_bit { &mex.w24[..] } else { &mex.w68[..] };
        (
            vec![(&mex.eall[..], 1)],
            vec![(&mex.wall[..], 2), (&mex.w2468[..], 1), (quarter, 1), (w_single(z_bit, y_bit), 1)],
        )
    };

    (
        sum_group(tables, &up_entries, &lat_up),
        sum_group(tables, &down_entries, &lat_down),
    )
}

/// Physical → Fourier (inverse of `m2x::phase2`): reconstructs each ring's
/// discrete Fourier coefficients from its full-circle physical samples.
fn physical_to_fourier(tables: &KernelTables, physical: &[Complex64]) -> (Vec<Complex64>, Vec<usize>) {
    let phys_offsets = ring_offsets(&tables.numphys);
    let four_offsets = ring_offsets(&tables.numfour);
    let total = *four_offsets.last().unwrap();
    let mut mexpf = vec![Complex64::new(0.0, 0.0); total];

    for (nell, &nphys) in tables.numphys.iter().enumerate() {
        let nf = tables.numfour[nell];
        let pstart = phys_offsets[nell];
        let fstart = four_offsets[nell];
        let halpha = 2.0 * PI / nphys as f64;
        for mm in 0..nf {
            let mut acc = Complex64::new(0.0, 0.0);
            for j in 0..nphys {
                let alpha = j as f64 * halpha;
                acc += physical[pstart + j] * Complex64::new(0.0, -(mm as f64) * alpha).exp();
            }
            let scale = if mm == 0 { 1.0 } else { 2.0 };
            mexpf[fstart + mm] = acc * (scale / nphys as f64);
        }
    }

    (mexpf, four_offsets)
}

/// Fourier → local (spec.md §4.E.4 phase 2, `ExponentialToLocalPhase2`):
/// combines the up and down Fourier streams into `mexpplus = down + up` and
/// `mexpminus = down - up`, then picks `mexpplus` for even-degree local
/// coefficients and `mexpminus` for odd-degree ones — the z-reflection
/// parity of `Y_ell^m` depends only on `ell`. An absent side contributes a
/// zero buffer, which reduces to the same special case the original handles
/// explicitly (`mexpplus = mexpminus = ±mexpu`/`mexpd` alone).
fn fourier_combine_to_local(tables: &KernelTables, up: &[Complex64], down: &[Complex64], four_offsets: &[usize]) -> Expansion {
    let p = tables.pterms;
    let mut local = zero_expansion(tables);

    for (nell, &nf) in tables.numfour.iter().enumerate() {
        let fstart = four_offsets[nell];
        let rlam = tables.rlams[nell];
        let wht = tables.whts[nell];
        for mm in 0..nf.min(p + 1) {
            let plus = down[fstart + mm] + up[fstart + mm];
            let minus = down[fstart + mm] - up[fstart + mm];
            let i_pow = Complex64::new(0.0, 1.0).powi(mm as i32);
            let mut rlam_pow = rlam.powi(mm as i32);
            for ell in mm..=p {
                let coeff = if ell % 2 == 0 { plus } else { minus };
                local[idx(p, ell, mm)] += wht * rlam_pow * i_pow * tables.ytopcs[idx(p, ell, mm)] * coeff;
                rlam_pow *= rlam;
            }
        }
    }

    local
}

/// Rotates a z-axis-frame local contribution back into the box's native
/// frame for the given accumulation axis.
fn unrotate(tables: &KernelTables, axis: Axis, local_rotated: Expansion) -> Expansion {
    match axis {
        Axis::Z => local_rotated,
        Axis::Y => rotate(tables, &tables.rdminus, &local_rotated, 1.0),
        Axis::X => {
            let back = rotate(tables, &tables.rdminus, &local_rotated, 1.0);
            rotate_z(tables, &back, -1)
        }
    }
}

fn axis_contribution(tables: &KernelTables, axis: Axis, up_phys: &[Complex64], down_phys: &[Complex64]) -> Expansion {
    let (up_f, offsets) = physical_to_fourier(tables, up_phys);
    let (down_f, _) = physical_to_fourier(tables, down_phys);
    let local = fourier_combine_to_local(tables, &up_f, &down_f, &offsets);
    unrotate(tables, axis, local)
}

/// Converts one target child's merged-list contributions into its local
/// expansion (spec.md §4.E.4/§4.F): sums the z, y and x axis passes.
pub fn local_for_child(tables: &KernelTables, mex: &MergedExponentials, child: usize) -> Expansion {
    let mut total = zero_expansion(tables);

    let (uz, dz) = combine_z(tables, mex, child);
    let (uy, dy) = combine_y(tables, mex, child);
    let (ux, dx) = combine_x(tables, mex, child);

    for (axis, up, down) in [(Axis::Z, &uz, &dz), (Axis::Y, &uy, &dy), (Axis::X, &ux, &dx)] {
        let contribution = axis_contribution(tables, axis, up, down);
        for (t, c) in total.iter_mut().zip(contribution.iter()) {
            *t += c;
        }
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Accuracy;
    use crate::expansion::m2x::m2x;
    use crate::expansion::zero_expansion as zero_m;
    use crate::merge::MergedLists;

    #[test]
    fn single_colleague_child_produces_finite_local() {
        let tables = KernelTables::new(Accuracy::ThreeDigit);
        let mut m = zero_m(&tables);
        m[idx(tables.pterms, 0, 0)] = Complex64::new(1.0, 0.0);
        let pw = m2x(&tables, &m);

        let mut lists = MergedLists::default();
        lists.uall.push((0, 1, 1));
        lists.n1256.push((0, -1, 0));
        lists.e1357.push((0, 0, -1));

        let waves = |id: usize| if id == 0 { Some(&pw) } else { None };
        let mex = MergedExponentials::build(&tables, &lists, &waves);

        for child in 0..8 {
            let local = local_for_child(&tables, &mex, child);
            assert!(local.iter().all(|c| c.re.is_finite() && c.im.is_finite()));
        }
    }
}
