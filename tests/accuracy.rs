//! End-to-end accuracy scenarios (spec.md §8 "End-to-end scenarios").
//!
//! Source/target point clouds (uniform-in-cube, on-sphere, on-torus) are
//! named as *external collaborators* in spec.md §1 (out of scope as a CLI
//! surface); building them inline here to drive the library is standard
//! practice for this kind of numerical crate (see `green-kernels`'s own
//! synthetic test point clouds).

use fmm3d::direct;
use lin_alg::f64::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn uniform_cube(rng: &mut ChaCha8Rng, n: usize) -> Vec<Vec3> {
    (0..n)
        .map(|_| {
            Vec3::new(
                rng.gen_range(-0.5..0.5),
                rng.gen_range(-0.5..0.5),
                rng.gen_range(-0.5..0.5),
            )
        })
        .collect()
}

fn on_sphere(rng: &mut ChaCha8Rng, n: usize) -> Vec<Vec3> {
    (0..n)
        .map(|_| {
            // Uniform on the unit sphere via the Marsaglia method.
            loop {
                let x = rng.gen_range(-1.0..1.0);
                let y = rng.gen_range(-1.0..1.0);
                let s = x * x + y * y;
                if s < 1.0 {
                    let f = 2.0 * (1.0 - s).sqrt();
                    break Vec3::new(x * f, y * f, 1.0 - 2.0 * s);
                }
            }
        })
        .collect()
}

fn on_torus(rng: &mut ChaCha8Rng, n: usize) -> Vec<Vec3> {
    let two_pi = 2.0 * std::f64::consts::PI;
    (0..n)
        .map(|_| {
            let t = rng.gen_range(0.0..two_pi);
            let u = rng.gen_range(0.0..two_pi);
            Vec3::new(
                t.cos() * (2.0 + 0.5 * u.cos()),
                t.sin() * (2.0 + 0.5 * u.cos()),
                0.5 * u.sin(),
            )
        })
        .collect()
}

fn random_charges(rng: &mut ChaCha8Rng, n: usize) -> Vec<f64> {
    (0..n).map(|_| rng.gen_range(-0.5..0.5)).collect()
}

fn relative_l2(computed: &[f64], reference: &[f64]) -> f64 {
    let num: f64 = computed
        .iter()
        .zip(reference.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum();
    let den: f64 = reference.iter().map(|b| b.powi(2)).sum();
    (num / den).sqrt()
}

fn relative_l2_vec3(computed: &[Vec3], reference: &[Vec3]) -> f64 {
    let num: f64 = computed
        .iter()
        .zip(reference.iter())
        .map(|(a, b)| (a.x - b.x).powi(2) + (a.y - b.y).powi(2) + (a.z - b.z).powi(2))
        .sum();
    let den: f64 = reference
        .iter()
        .map(|b| b.x.powi(2) + b.y.powi(2) + b.z.powi(2))
        .sum();
    (num / den).sqrt()
}

fn direct_reference(sources: &[Vec3], charges: &[f64], targets: &[Vec3]) -> (Vec<f64>, Vec<Vec3>) {
    let mut potential = vec![0.0f64; targets.len()];
    let mut field = vec![Vec3::new(0.0, 0.0, 0.0); targets.len()];
    direct::evaluate(sources, charges, targets, &mut potential, &mut field);
    (potential, field)
}

/// Scenario 1: uniform-in-cube, accuracy=3.
#[test]
fn uniform_cube_three_digit_accuracy() {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let n = 3000;
    let sources = uniform_cube(&mut rng, n);
    let charges = random_charges(&mut rng, n);
    let targets = uniform_cube(&mut rng, n);

    let result = fmm3d::solve(&sources, &charges, &targets, 3, 40).unwrap();
    let (direct_pot, _) = direct_reference(&sources, &charges, &targets);

    let rel_l2 = relative_l2(&result.potential, &direct_pot);
    assert!(rel_l2 < 1e-3, "relative L2 error too large: {rel_l2}");

    let linf = result.potential[..200.min(n)]
        .iter()
        .zip(direct_pot[..200.min(n)].iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f64, f64::max);
    assert!(linf < 1e-2, "L-infinity error on first targets too large: {linf}");
}

/// Scenario 2: uniform on the unit sphere, accuracy=6.
#[test]
fn sphere_six_digit_accuracy() {
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let n = 2000;
    let sources = on_sphere(&mut rng, n);
    let charges = random_charges(&mut rng, n);
    let targets = on_sphere(&mut rng, n);

    let result = fmm3d::solve(&sources, &charges, &targets, 6, 40).unwrap();
    let (direct_pot, _) = direct_reference(&sources, &charges, &targets);

    let rel_l2 = relative_l2(&result.potential, &direct_pot);
    assert!(rel_l2 < 5e-5, "relative L2 error too large: {rel_l2}");
}

/// Scenario 3: torus distribution, accuracy=3.
#[test]
fn torus_three_digit_accuracy() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let n = 2000;
    let sources = on_torus(&mut rng, n);
    let charges = random_charges(&mut rng, n);
    let targets = on_torus(&mut rng, n);

    let result = fmm3d::solve(&sources, &charges, &targets, 3, 40).unwrap();
    let (direct_pot, direct_field) = direct_reference(&sources, &charges, &targets);

    let rel_l2_pot = relative_l2(&result.potential, &direct_pot);
    assert!(rel_l2_pot < 2e-3, "relative L2 potential error too large: {rel_l2_pot}");

    let rel_l2_field = relative_l2_vec3(&result.field, &direct_field);
    assert!(rel_l2_field < 5e-3, "relative L2 field error too large: {rel_l2_field}");
}

/// Scenario 4: two point charges, analytic potential/field to 14 digits.
#[test]
fn two_point_dipole_matches_analytic_exactly() {
    let sources = vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)];
    let charges = vec![1.0, -1.0];
    let targets = vec![Vec3::new(0.5, 0.0, 0.0), Vec3::new(0.5, 1.0, 0.0)];

    let result = fmm3d::solve(&sources, &charges, &targets, 6, 2).unwrap();

    // phi(0.5,0,0) = 1/0.5 - 1/0.5 = 0
    assert!(result.potential[0].abs() < 1e-10);
    // phi(0.5,1,0) = 1/sqrt(1.25) - 1/sqrt(1.25) = 0
    assert!(result.potential[1].abs() < 1e-10);

    // field at (0.5,0,0): from +1 at origin: (0.5,0,0)/0.5^3; from -1 at (1,0,0):
    // -(-0.5,0,0)/0.5^3 = (0.5,0,0)/0.5^3. Total = 2*(0.5,0,0)/0.125 = (8,0,0).
    assert!((result.field[0].x - 8.0).abs() < 1e-9);
    assert!(result.field[0].y.abs() < 1e-9);
    assert!(result.field[0].z.abs() < 1e-9);
}

/// Scenario 5 (determinism): identical inputs produce bit-identical outputs.
/// This crate's DAG is a per-level rayon fan-out with no data races (each
/// task writes a disjoint slice), so thread count cannot perturb rounding.
#[test]
fn repeated_solves_are_deterministic() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let n = 500;
    let sources = uniform_cube(&mut rng, n);
    let charges = random_charges(&mut rng, n);
    let targets = uniform_cube(&mut rng, n);

    let a = fmm3d::solve(&sources, &charges, &targets, 3, 20).unwrap();
    let b = fmm3d::solve(&sources, &charges, &targets, 3, 20).unwrap();

    for (pa, pb) in a.potential.iter().zip(b.potential.iter()) {
        assert_eq!(pa.to_bits(), pb.to_bits());
    }
    for (fa, fb) in a.field.iter().zip(b.field.iter()) {
        assert_eq!(fa.x.to_bits(), fb.x.to_bits());
        assert_eq!(fa.y.to_bits(), fb.y.to_bits());
        assert_eq!(fa.z.to_bits(), fb.z.to_bits());
    }
}

/// Scenario 6 (linearity law): doubling every charge doubles every output.
#[test]
fn doubling_charges_doubles_output() {
    let mut rng = ChaCha8Rng::seed_from_u64(6);
    let n = 500;
    let sources = uniform_cube(&mut rng, n);
    let charges = random_charges(&mut rng, n);
    let targets = uniform_cube(&mut rng, n);

    let base = fmm3d::solve(&sources, &charges, &targets, 3, 20).unwrap();
    let doubled_charges: Vec<f64> = charges.iter().map(|q| q * 2.0).collect();
    let doubled = fmm3d::solve(&sources, &doubled_charges, &targets, 3, 20).unwrap();

    for (p, p2) in base.potential.iter().zip(doubled.potential.iter()) {
        assert!((p2 - 2.0 * p).abs() < 1e-9 * (1.0 + p.abs()));
    }
    for (f, f2) in base.field.iter().zip(doubled.field.iter()) {
        assert!((f2.x - 2.0 * f.x).abs() < 1e-9 * (1.0 + f.x.abs()));
        assert!((f2.y - 2.0 * f.y).abs() < 1e-9 * (1.0 + f.y.abs()));
        assert!((f2.z - 2.0 * f.z).abs() < 1e-9 * (1.0 + f.z.abs()));
    }
}

/// Translation invariance law: shifting every source and target by the same
/// constant vector leaves potential and field unchanged.
#[test]
fn translation_invariance() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let n = 400;
    let sources = uniform_cube(&mut rng, n);
    let charges = random_charges(&mut rng, n);
    let targets = uniform_cube(&mut rng, n);

    let base = fmm3d::solve(&sources, &charges, &targets, 3, 20).unwrap();

    let shift = Vec3::new(10.0, -4.0, 2.5);
    let shifted_sources: Vec<Vec3> = sources.iter().map(|p| *p + shift).collect();
    let shifted_targets: Vec<Vec3> = targets.iter().map(|p| *p + shift).collect();
    let shifted = fmm3d::solve(&shifted_sources, &charges, &shifted_targets, 3, 20).unwrap();

    let rel_l2 = relative_l2(&base.potential, &shifted.potential);
    assert!(rel_l2 < 1e-3, "translation should not change potential: {rel_l2}");
}

/// Boundary behavior: N=1 source, M=1 target.
#[test]
fn single_source_single_target() {
    let sources = vec![Vec3::new(0.2, 0.3, 0.4)];
    let charges = vec![1.5];
    let targets = vec![Vec3::new(1.2, -0.3, 0.9)];

    let result = fmm3d::solve(&sources, &charges, &targets, 3, 10).unwrap();
    let d = sources[0] - targets[0];
    let r = (d.x * d.x + d.y * d.y + d.z * d.z).sqrt();
    let expected_phi = 1.5 / r;
    assert!((result.potential[0] - expected_phi).abs() < 1e-9);
}

/// Boundary behavior: coincident source and target does not produce NaN.
#[test]
fn coincident_source_and_target_does_not_panic_or_nan() {
    let sources = vec![Vec3::new(0.5, 0.5, 0.5), Vec3::new(0.1, 0.1, 0.1)];
    let charges = vec![1.0, -1.0];
    let targets = vec![Vec3::new(0.5, 0.5, 0.5)];

    let result = fmm3d::solve(&sources, &charges, &targets, 3, 10).unwrap();
    assert!(result.potential[0].is_finite());
    assert!(result.field[0].x.is_finite());
}

/// Boundary behavior: all points collinear degenerate gracefully (no
/// `TooDeep` unless duplicates exceed leaf capacity).
#[test]
fn collinear_points_do_not_trigger_too_deep() {
    let sources: Vec<Vec3> = (0..50).map(|i| Vec3::new(i as f64 * 0.1, 0.0, 0.0)).collect();
    let charges = vec![1.0; 50];
    let targets: Vec<Vec3> = (0..50).map(|i| Vec3::new(i as f64 * 0.1, 0.0, 0.0)).collect();

    let result = fmm3d::solve(&sources, &charges, &targets, 3, 4);
    assert!(result.is_ok());
}
