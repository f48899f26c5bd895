//! DAG scheduler (spec.md §4.G), run as a fork-join bulk-synchronous
//! pass per tree level — the coarser alternative spec.md §9 explicitly
//! accepts in place of a fine-grained futures graph. Within a level, every
//! box's numerical work (`S2M`/`M2M`/`M2X`/`X2L`/`L2L`/`L2T`/direct) is
//! independent of its siblings and is fanned out with `rayon`, matching how
//! the teacher parallelizes independent per-node work; only the short
//! "apply contributions to a child" step after each level is sequential,
//! since siblings can target the same child's local expansion.

use lin_alg::f64::Vec3;
use rayon::prelude::*;

use crate::expansion::{direct, l2l, l2t, m2m, m2x, s2m, zero_expansion, Expansion, PlaneWave};
use crate::geometry::BoundingCube;
use crate::merge;
use crate::points::PointSet;
use crate::tables::KernelTables;
use crate::tree::Box as TreeBox;

/// Finds which of `parent`'s eight child slots holds `child_boxid`.
fn octant_of(parent: &TreeBox, child_boxid: usize) -> usize {
    parent
        .child
        .iter()
        .position(|c| *c == Some(child_boxid))
        .expect("child_boxid must be a child of parent")
}

/// Runs `S2M`/`M2M` bottom-up over the source tree, then `M2X` over every
/// source box, producing one multipole and one plane-wave expansion per
/// source box (spec.md §4.G "Mult"/"Expo" tasks).
pub fn run_source_side(
    tables: &KernelTables,
    sources_tree: &crate::tree::Tree,
    source_points: &PointSet,
    cube: &BoundingCube,
    scales: &[f64],
) -> (Vec<Expansion>, Vec<PlaneWave>) {
    let mut multipoles: Vec<Expansion> = vec![zero_expansion(tables); sources_tree.boxes.len()];

    for level in (0..sources_tree.level_ranges.len()).rev() {
        let range = sources_tree.level_ranges[level].clone();
        let level_u32 = level as u32;
        let computed: Vec<(usize, Expansion)> = range
            .clone()
            .into_par_iter()
            .map(|b| {
                let bx = &sources_tree.boxes[b];
                let center = cube.box_center(level_u32, bx.idx, bx.idy, bx.idz);
                let scale = scales[level];
                if bx.is_leaf() {
                    let coords = &source_points.coords[bx.addr..bx.addr + bx.npts];
                    let charges = source_points
                        .charges
                        .as_ref()
                        .expect("sources must carry charges")
                        .get(bx.addr..bx.addr + bx.npts)
                        .unwrap();
                    (b, s2m::s2m(tables, center, scale, coords, charges))
                } else {
                    let mut acc = zero_expansion(tables);
                    let child_scale = if level + 1 < scales.len() { scales[level + 1] } else { scale * 2.0 };
                    for c in bx.children() {
                        let k = octant_of(bx, c);
                        let mut contrib = m2m::m2m(tables, &multipoles[c], k);
                        m2m::rescale(tables, &mut contrib, scale / child_scale);
                        for (a, v) in acc.iter_mut().zip(contrib.iter()) {
                            *a += v;
                        }
                    }
                    (b, acc)
                }
            })
            .collect();

        for (b, m) in computed {
            multipoles[b] = m;
        }
    }

    let plane_waves: Vec<PlaneWave> = (0..sources_tree.boxes.len())
        .into_par_iter()
        .map(|b| m2x::m2x(tables, &multipoles[b]))
        .collect();

    (multipoles, plane_waves)
}

/// Output of the target-side pass: local expansions per target box plus the
/// point-indexed potential and field arrays.
pub struct TargetResults {
    pub locals: Vec<Expansion>,
    pub potential: Vec<f64>,
    pub field: Vec<Vec3>,
}

/// Runs `X2L`/`L2L`/list-4-direct/`L2T`/list-1,3-direct top-down over the
/// target tree (spec.md §4.G "Loc" tasks).
pub fn run_target_side(
    tables: &KernelTables,
    sources_tree: &crate::tree::Tree,
    targets_tree: &crate::tree::Tree,
    source_points: &PointSet,
    target_points: &PointSet,
    plane_waves: &[PlaneWave],
    cube: &BoundingCube,
    scales: &[f64],
) -> TargetResults {
    let mut locals: Vec<Expansion> = vec![zero_expansion(tables); targets_tree.boxes.len()];
    let mut potential = vec![0.0f64; target_points.len()];
    let mut field = vec![Vec3::new(0.0, 0.0, 0.0); target_points.len()];

    let charges = source_points
        .charges
        .as_ref()
        .expect("sources must carry charges");

    for level in 0..targets_tree.level_ranges.len() {
        let range = targets_tree.level_ranges[level].clone();
        let level_u32 = level as u32;
        let scale = scales[level];

        struct LevelResult {
            boxid: usize,
            child_pushes: Vec<(usize, Expansion)>,
            direct_potential: Vec<f64>,
            direct_field: Vec<Vec3>,
            leaf_potential: Vec<f64>,
            leaf_field: Vec<Vec3>,
        }

        let results: Vec<LevelResult> = range
            .clone()
            .into_par_iter()
            .map(|b| {
                let bx = &targets_tree.boxes[b];
                let mut child_pushes = Vec::new();

                if bx.nchild > 0 {
                    let contributions = merge::x2l_for_children(
                        tables,
                        sources_tree,
                        targets_tree,
                        b,
                        &|sc| plane_waves.get(sc),
                    );
                    child_pushes.extend(contributions);

                    let child_scale = if level + 1 < scales.len() { scales[level + 1] } else { scale * 2.0 };
                    for c in bx.children() {
                        let k = octant_of(bx, c);
                        let mut contrib = l2l::l2l(tables, &locals[b], k);
                        l2l::rescale(tables, &mut contrib, child_scale / scale);
                        child_pushes.push((c, contrib));
                    }
                }

                let mut direct_potential = vec![0.0f64; bx.npts];
                let mut direct_field = vec![Vec3::new(0.0, 0.0, 0.0); bx.npts];
                let target_slice = &target_points.coords[bx.addr..bx.addr + bx.npts];
                for &s in &bx.list4 {
                    let sb = &sources_tree.boxes[s];
                    direct::evaluate(
                        &source_points.coords[sb.addr..sb.addr + sb.npts],
                        &charges[sb.addr..sb.addr + sb.npts],
                        target_slice,
                        &mut direct_potential,
                        &mut direct_field,
                    );
                }

                let mut leaf_potential = Vec::new();
                let mut leaf_field = Vec::new();
                if bx.is_leaf() {
                    leaf_potential = vec![0.0f64; bx.npts];
                    leaf_field = vec![Vec3::new(0.0, 0.0, 0.0); bx.npts];
                    let center = cube.box_center(level_u32, bx.idx, bx.idy, bx.idz);
                    for (i, &t) in target_slice.iter().enumerate() {
                        let (p, f) = l2t::l2t(tables, &locals[b], center, scale, t);
                        leaf_potential[i] = p;
                        leaf_field[i] = f;
                    }
                    for &s in bx.list1.iter().chain(bx.list3.iter()) {
                        let sb = &sources_tree.boxes[s];
                        direct::evaluate(
                            &source_points.coords[sb.addr..sb.addr + sb.npts],
                            &charges[sb.addr..sb.addr + sb.npts],
                            target_slice,
                            &mut leaf_potential,
                            &mut leaf_field,
                        );
                    }
                }

                LevelResult {
                    boxid: b,
                    child_pushes,
                    direct_potential,
                    direct_field,
                    leaf_potential,
                    leaf_field,
                }
            })
            .collect();

        for r in results {
            let bx = &targets_tree.boxes[r.boxid];
            for (c, contrib) in r.child_pushes {
                for (a, v) in locals[c].iter_mut().zip(contrib.iter()) {
                    *a += v;
                }
            }
            for (i, p) in r.direct_potential.into_iter().enumerate() {
                potential[bx.addr + i] += p;
            }
            for (i, f) in r.direct_field.into_iter().enumerate() {
                field[bx.addr + i].x += f.x;
                field[bx.addr + i].y += f.y;
                field[bx.addr + i].z += f.z;
            }
            if bx.is_leaf() {
                for (i, p) in r.leaf_potential.into_iter().enumerate() {
                    potential[bx.addr + i] += p;
                }
                for (i, f) in r.leaf_field.into_iter().enumerate() {
                    field[bx.addr + i].x += f.x;
                    field[bx.addr + i].y += f.y;
                    field[bx.addr + i].z += f.z;
                }
            }
        }
    }

    TargetResults { locals, potential, field }
}
