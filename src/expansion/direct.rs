//! Direct 1/r evaluation for lists 1, 3 and 4 (spec.md §4.E.7).
//!
//! Also exported as the crate's public brute-force O(N*M) reference, used
//! by the accuracy checks in the integration tests and available to callers
//! who want to validate a solve (original_source's `fmm_direct`).

use lin_alg::f64::Vec3;

const EPS: f64 = 1e-14;

/// Adds the potential and (negative-gradient) field contribution of every
/// `(source, charge)` pair in `sources` to every target in `targets`, into
/// `potential`/`field`. A source coincident with a target (`r < EPS`) is
/// skipped rather than producing a NaN.
pub fn evaluate(
    sources: &[Vec3],
    charges: &[f64],
    targets: &[Vec3],
    potential: &mut [f64],
    field: &mut [Vec3],
) {
    for (t, (pot, fld)) in targets.iter().zip(potential.iter_mut().zip(field.iter_mut())) {
        for (&s, &q) in sources.iter().zip(charges.iter()) {
            let dx = t.x - s.x;
            let dy = t.y - s.y;
            let dz = t.z - s.z;
            let r2 = dx * dx + dy * dy + dz * dz;
            let r = r2.sqrt();
            if r < EPS {
                continue;
            }
            let rinv = 1.0 / r;
            *pot += q * rinv;
            let rinv3 = rinv * rinv * rinv;
            fld.x += q * rinv3 * dx;
            fld.y += q * rinv3 * dy;
            fld.z += q * rinv3 * dz;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_pair_matches_analytic_formula() {
        let sources = [Vec3::new(0.0, 0.0, 0.0)];
        let charges = [2.0];
        let targets = [Vec3::new(1.0, 0.0, 0.0)];
        let mut potential = vec![0.0];
        let mut field = vec![Vec3::new(0.0, 0.0, 0.0)];
        evaluate(&sources, &charges, &targets, &mut potential, &mut field);
        assert!((potential[0] - 2.0).abs() < 1e-12);
        assert!((field[0].x - 2.0).abs() < 1e-12);
    }

    #[test]
    fn coincident_source_and_target_is_skipped() {
        let sources = [Vec3::new(0.5, 0.5, 0.5)];
        let charges = [1.0];
        let targets = [Vec3::new(0.5, 0.5, 0.5)];
        let mut potential = vec![0.0];
        let mut field = vec![Vec3::new(0.0, 0.0, 0.0)];
        evaluate(&sources, &charges, &targets, &mut potential, &mut field);
        assert_eq!(potential[0], 0.0);
        assert!(!field[0].x.is_nan());
    }
}
