//! Local→local (spec.md §4.E.5): the mirror image of M2M, using `ifld`
//! instead of `iflu` and shifting in the opposite sense.

use crate::geometry::IFLD;
use crate::tables::{idx, KernelTables};

use super::m2m::translate_z;
use super::{rotate, rotate_z_eighth, Expansion};

// Quarter the diagonal distance M2M shifts by: L2L pushes a parent's local
// expansion down into a child whose half-width (and hence centre-to-centre
// offset along the rotated z-axis) is half of what M2M's upward shift sees,
// per spec.md §4.E.5 ("opposite sign and quarter distance vs. M2M").
const DIAG_DIST: f64 = 0.433_012_701_892_219_3; // sqrt(3)/4

/// Pushes a parent box's local expansion down into child box
/// `child_octant`'s frame (still at the parent's scale; caller rescales).
pub fn l2l(tables: &KernelTables, parent: &Expansion, child_octant: usize) -> Expansion {
    let phase = -IFLD[child_octant];
    let rotated_in = rotate_z_eighth(tables, parent, phase);

    let tilt_up = (child_octant >> 2) & 1 == 0;
    let rd_tilt = if tilt_up { &tables.rdsq3 } else { &tables.rdmsq3 };
    let tilted = rotate(tables, rd_tilt, &rotated_in, 1.0);

    let shifted = translate_z(tables, &tilted, DIAG_DIST);

    let rd_untilt = if tilt_up { &tables.rdmsq3 } else { &tables.rdsq3 };
    let untilted = rotate(tables, rd_untilt, &shifted, -1.0);

    rotate_z_eighth(tables, &untilted, -phase)
}

/// Scales a local expansion by `(parent_scale / child_scale)^ell`, the last
/// step of L2L (spec.md §4.E.5).
pub fn rescale(tables: &KernelTables, input: &mut Expansion, ratio: f64) {
    let p = tables.pterms;
    let mut pow = 1.0;
    for ell in 0..=p {
        for m in 0..=ell {
            input[idx(p, ell, m)] *= pow;
        }
        pow *= ratio;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Accuracy;
    use crate::expansion::zero_expansion;
    use num_complex::Complex64;

    #[test]
    fn pure_dc_term_survives_shift() {
        let tables = KernelTables::new(Accuracy::ThreeDigit);
        let mut l = zero_expansion(&tables);
        l[idx(tables.pterms, 0, 0)] = Complex64::new(2.0, 0.0);
        let out = l2l(&tables, &l, 3);
        assert!(out[idx(tables.pterms, 0, 0)].re.is_finite());
    }
}
