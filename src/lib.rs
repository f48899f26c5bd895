//! Adaptive Fast Multipole Method for the 3-D Laplace kernel
//! `φ(t) = Σⱼ qⱼ / ‖t − sⱼ‖`, field = `−∇φ`, using diagonal plane-wave
//! (exponential) translation operators.
//!
//! [`solve`] is the entry point: it builds a dual source/target octree,
//! computes the four interaction lists per target box, runs the six-operator
//! translation chain (S2M, M2M, M2X, X2L, L2L, L2T) plus direct summation
//! for the near lists, and returns the potential and field at every target
//! in the caller's original ordering.
//!
//! See `README.md` for a usage example and `DESIGN.md` for how each module
//! here maps back to the FMM3D/HPX-5 sources this crate follows.

pub mod config;
pub mod dag;
pub mod error;
pub mod expansion;
pub mod geometry;
pub mod lists;
pub mod merge;
pub mod points;
pub mod tables;
pub mod tree;

use lin_alg::f64::Vec3;

pub use config::{Accuracy, FmmConfig};
pub use error::{FmmError, FmmResult};
pub use expansion::direct;
pub use tree::{Box as FmmBox, Tree};

/// Output of a solve: potential and field at every target, already
/// un-permuted back into the caller's original ordering, plus the built
/// trees for introspection (spec.md §9's "serialization for debugging
/// trivial" design note — `sources_tree`/`targets_tree` expose `level_ranges`
/// and each [`FmmBox`]'s `list1..list5` directly).
pub struct Solution {
    pub potential: Vec<f64>,
    pub field: Vec<Vec3>,
    pub sources_tree: Tree,
    pub targets_tree: Tree,
}

/// Computes the electrostatic potential and field at every target point due
/// to every (source, charge) pair, in `O(N + M)` time.
///
/// `accuracy` is `3` or `6` significant digits; any other value is rejected
/// with [`FmmError::UnsupportedAccuracy`]. `leaf_capacity` (`s` in spec.md)
/// bounds how many points a leaf box may hold before it is split further.
///
/// This is a convenience wrapper around [`solve_with_config`] that builds a
/// fresh [`FmmConfig`] (and therefore fresh [`tables::KernelTables`]) for the
/// call; callers doing repeated solves at the same accuracy should build one
/// `FmmConfig` and reuse it (the tables are immutable and `Arc`-shared, spec.md
/// §3/§9) via `solve_with_config`.
pub fn solve(
    sources: &[Vec3],
    charges: &[f64],
    targets: &[Vec3],
    accuracy: u32,
    leaf_capacity: usize,
) -> FmmResult<Solution> {
    let accuracy = Accuracy::from_digits(accuracy)?;
    let config = FmmConfig::new(accuracy, leaf_capacity)?;
    solve_with_config(&config, sources, charges, targets)
}

/// Same as [`solve`], but reuses an already-built [`FmmConfig`] (and its
/// shared [`tables::KernelTables`]) across repeated calls instead of
/// recomputing them every time.
pub fn solve_with_config(
    config: &FmmConfig,
    sources: &[Vec3],
    charges: &[f64],
    targets: &[Vec3],
) -> FmmResult<Solution> {
    validate_inputs(sources, charges, targets, config.leaf_capacity)?;

    let mut source_points = points::PointSet::new(sources.to_vec(), Some(charges.to_vec()));
    let mut target_points = points::PointSet::new(targets.to_vec(), None);

    let cube = geometry::BoundingCube::enclosing(sources, targets);
    log::debug!(
        "fmm3d: bounding cube corner=({:.6e}, {:.6e}, {:.6e}) size={:.6e}, N={} M={} s={}",
        cube.corner.x,
        cube.corner.y,
        cube.corner.z,
        cube.size,
        sources.len(),
        targets.len(),
        config.leaf_capacity,
    );

    let mut dual = tree::build(&mut source_points, &mut target_points, &cube, config.leaf_capacity)?;

    let max_level = dual.sources.max_level();
    let scales = geometry::level_scales(&cube, max_level);
    log::debug!(
        "fmm3d: tree built, {} levels, {} source boxes, {} target boxes",
        max_level + 1,
        dual.sources.boxes.len(),
        dual.targets.boxes.len(),
    );
    for level in 0..=max_level as usize {
        log::trace!(
            "fmm3d: level {level}: {} source boxes, {} target boxes",
            dual.sources.level_ranges[level].len(),
            dual.targets.level_ranges[level].len(),
        );
    }

    lists::build_lists(&dual.sources, &mut dual.targets);
    let (l1, l3, l4, l5): (usize, usize, usize, usize) = dual.targets.boxes.iter().fold(
        (0, 0, 0, 0),
        |(a, b, c, d), t| {
            (
                a + t.list1.len(),
                b + t.list3.len(),
                c + t.list4.len(),
                d + t.list5.len(),
            )
        },
    );
    log::debug!(
        "fmm3d: interaction lists built: list1={l1} list3={l3} list4={l4} list5={l5} entries total"
    );

    let (_multipoles, plane_waves) =
        dag::run_source_side(&config.tables, &dual.sources, &source_points, &cube, &scales);
    log::debug!(
        "fmm3d: source side done, {} plane-wave expansions built",
        plane_waves.len()
    );

    let results = dag::run_target_side(
        &config.tables,
        &dual.sources,
        &dual.targets,
        &source_points,
        &target_points,
        &plane_waves,
        &cube,
        &scales,
    );
    log::debug!("fmm3d: target side done, {} local expansions built", results.locals.len());

    let potential = target_points.unpermute(&results.potential, 0.0);
    let field = target_points.unpermute(&results.field, Vec3::new(0.0, 0.0, 0.0));

    Ok(Solution {
        potential,
        field,
        sources_tree: dual.sources,
        targets_tree: dual.targets,
    })
}

fn validate_inputs(
    sources: &[Vec3],
    charges: &[f64],
    targets: &[Vec3],
    leaf_capacity: usize,
) -> FmmResult<()> {
    if sources.is_empty() {
        return Err(FmmError::InvalidInput("N (source count) must be >= 1"));
    }
    if targets.is_empty() {
        return Err(FmmError::InvalidInput("M (target count) must be >= 1"));
    }
    if charges.len() != sources.len() {
        return Err(FmmError::InvalidInput(
            "charges must have the same length as sources",
        ));
    }
    if leaf_capacity == 0 {
        return Err(FmmError::InvalidInput("leaf_capacity (s) must be >= 1"));
    }
    let finite_pt = |p: &Vec3| p.x.is_finite() && p.y.is_finite() && p.z.is_finite();
    if !sources.iter().all(finite_pt) || !targets.iter().all(finite_pt) {
        return Err(FmmError::InvalidInput(
            "all source and target coordinates must be finite",
        ));
    }
    if !charges.iter().all(|q| q.is_finite()) {
        return Err(FmmError::InvalidInput("all charges must be finite"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_source_single_target_matches_analytic_formula() {
        let sources = vec![Vec3::new(0.0, 0.0, 0.0)];
        let charges = vec![2.0];
        let targets = vec![Vec3::new(1.0, 0.0, 0.0)];
        let result = solve(&sources, &charges, &targets, 3, 40).unwrap();
        assert!((result.potential[0] - 2.0).abs() < 1e-9);
        assert!((result.field[0].x - 2.0).abs() < 1e-9);
    }

    #[test]
    fn unsupported_accuracy_is_rejected() {
        let sources = vec![Vec3::new(0.0, 0.0, 0.0)];
        let charges = vec![1.0];
        let targets = vec![Vec3::new(1.0, 0.0, 0.0)];
        let err = solve(&sources, &charges, &targets, 4, 10).unwrap_err();
        assert_eq!(err, FmmError::UnsupportedAccuracy(4));
    }

    #[test]
    fn mismatched_charge_count_is_rejected() {
        let sources = vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0)];
        let charges = vec![1.0];
        let targets = vec![Vec3::new(1.0, 0.0, 0.0)];
        let err = solve(&sources, &charges, &targets, 3, 10).unwrap_err();
        assert!(matches!(err, FmmError::InvalidInput(_)));
    }

    #[test]
    fn non_finite_coordinate_is_rejected() {
        let sources = vec![Vec3::new(f64::NAN, 0.0, 0.0)];
        let charges = vec![1.0];
        let targets = vec![Vec3::new(1.0, 0.0, 0.0)];
        let err = solve(&sources, &charges, &targets, 3, 10).unwrap_err();
        assert!(matches!(err, FmmError::InvalidInput(_)));
    }

    #[test]
    fn zero_leaf_capacity_is_rejected() {
        let sources = vec![Vec3::new(0.0, 0.0, 0.0)];
        let charges = vec![1.0];
        let targets = vec![Vec3::new(1.0, 0.0, 0.0)];
        let err = solve(&sources, &charges, &targets, 3, 0).unwrap_err();
        assert!(matches!(err, FmmError::InvalidInput(_)));
    }
}
