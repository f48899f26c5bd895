//! Geometry and per-level index tables (spec.md §4.A).
//!
//! The smallest cube enclosing sources and targets anchors the whole tree:
//! every box's centre and scale factor derive from it, so a solve computes
//! this once and shares it through [`crate::config::FmmConfig`]-adjacent
//! state in the solver context.

use lin_alg::f64::Vec3;

/// Child octant `k`'s offset along x, matching the bit layout used
/// throughout: bit 0 = x, bit 1 = y, bit 2 = z.
pub const XOFF: [i32; 8] = [0, 1, 0, 1, 0, 1, 0, 1];
pub const YOFF: [i32; 8] = [0, 0, 1, 1, 0, 0, 1, 1];
pub const ZOFF: [i32; 8] = [0, 0, 0, 0, 1, 1, 1, 1];

/// Eighth-turn phase index used by M2M's upward rotation, keyed by child
/// octant: `n` in the per-octant azimuthal rotation `e^{i*n*m*pi/4}`, derived
/// from `MultipoleToMultipole`'s `var[5]`/`iflu_` pair (`fmm-laplace.c`,
/// `fmm.h`). See spec.md Glossary ("iflu, ifld").
pub const IFLU: [i32; 8] = [-1, -3, 1, 3, -1, -3, 1, 3];
/// The dual table used by L2L's downward rotation, derived the same way from
/// `LocalToLocal`'s `var[5]`/`ifld_` pair; numerically identical to `IFLU`.
pub const IFLD: [i32; 8] = [-1, -3, 1, 3, -1, -3, 1, 3];

/// The smallest axis-aligned cube enclosing the union of sources and
/// targets (spec.md §4.A).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingCube {
    pub corner: Vec3,
    pub size: f64,
}

impl BoundingCube {
    /// Computes the minimal enclosing cube for two point clouds. Both slices
    /// must be non-empty (checked by the caller at the API boundary).
    pub fn enclosing(sources: &[Vec3], targets: &[Vec3]) -> Self {
        let mut lo = sources[0];
        let mut hi = sources[0];

        for p in sources.iter().chain(targets.iter()) {
            lo.x = lo.x.min(p.x);
            lo.y = lo.y.min(p.y);
            lo.z = lo.z.min(p.z);
            hi.x = hi.x.max(p.x);
            hi.y = hi.y.max(p.y);
            hi.z = hi.z.max(p.z);
        }

        let size = (hi.x - lo.x).max(hi.y - lo.y).max(hi.z - lo.z);
        // Guard against a degenerate (single-point, or all-coincident) cloud:
        // a zero-width cube would make every box adjacent to every other box
        // forever and the tree would never separate anything.
        let size = if size <= 0.0 { 1.0 } else { size };
        let corner = Vec3::new(
            (hi.x + lo.x - size) * 0.5,
            (hi.y + lo.y - size) * 0.5,
            (hi.z + lo.z - size) * 0.5,
        );

        Self { corner, size }
    }

    /// Centre of the box with grid index `(ix, iy, iz)` at `level`.
    pub fn box_center(&self, level: u32, ix: i32, iy: i32, iz: i32) -> Vec3 {
        let h = self.size / 2f64.powi(level as i32 + 1);
        Vec3::new(
            self.corner.x + (2 * ix + 1) as f64 * h,
            self.corner.y + (2 * iy + 1) as f64 * h,
            self.corner.z + (2 * iz + 1) as f64 * h,
        )
    }
}

/// Per-level scale factor `2^L / size`, used to make expansions
/// dimensionless (spec.md §4.A). Index 0 is the root.
pub fn level_scales(cube: &BoundingCube, max_level: u32) -> Vec<f64> {
    (0..=max_level)
        .map(|l| 2f64.powi(l as i32) / cube.size)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enclosing_cube_contains_all_points() {
        let sources = vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 2.0, 0.5)];
        let targets = vec![Vec3::new(-1.0, 0.5, 3.0)];
        let cube = BoundingCube::enclosing(&sources, &targets);
        for p in sources.iter().chain(targets.iter()) {
            assert!(p.x >= cube.corner.x - 1e-9 && p.x <= cube.corner.x + cube.size + 1e-9);
            assert!(p.y >= cube.corner.y - 1e-9 && p.y <= cube.corner.y + cube.size + 1e-9);
            assert!(p.z >= cube.corner.z - 1e-9 && p.z <= cube.corner.z + cube.size + 1e-9);
        }
    }

    #[test]
    fn box_center_matches_root() {
        let cube = BoundingCube {
            corner: Vec3::new(0.0, 0.0, 0.0),
            size: 8.0,
        };
        let c = cube.box_center(0, 0, 0, 0);
        assert!((c.x - 4.0).abs() < 1e-12);
    }

    #[test]
    fn scales_double_each_level() {
        let cube = BoundingCube {
            corner: Vec3::new(0.0, 0.0, 0.0),
            size: 2.0,
        };
        let scales = level_scales(&cube, 4);
        for l in 1..scales.len() {
            assert!((scales[l] / scales[l - 1] - 2.0).abs() < 1e-12);
        }
    }
}
