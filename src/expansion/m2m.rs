//! Multipole→multipole (spec.md §4.E.2).

use num_complex::Complex64;

use crate::geometry::IFLU;
use crate::tables::{idx, KernelTables};

use super::{rotate, rotate_z_eighth, zero_expansion, Expansion};

/// Dimensionless distance between a parent box centre and any of its
/// children's centres, expressed along the body diagonal once rotated onto
/// the z-axis. The octree is self-similar across levels, so this constant
/// (not an absolute length) is what the z-shift step actually needs; the
/// caller's scale factors account for the rest.
const DIAG_DIST: f64 = 0.866_025_403_784_438_6; // sqrt(3)/2

/// Folds child box `child_octant`'s multipole expansion into its parent's,
/// already scaled so both expansions share the parent's scale convention.
pub fn m2m(tables: &KernelTables, child: &Expansion, child_octant: usize) -> Expansion {
    let phase = -IFLU[child_octant];
    let rotated_in = rotate_z_eighth(tables, child, phase);

    let tilt_up = (child_octant >> 2) & 1 == 0;
    let rd_tilt = if tilt_up { &tables.rdsq3 } else { &tables.rdmsq3 };
    let tilted = rotate(tables, rd_tilt, &rotated_in, 1.0);

    let shifted = translate_z(tables, &tilted, -DIAG_DIST);

    let rd_untilt = if tilt_up { &tables.rdmsq3 } else { &tables.rdsq3 };
    let untilted = rotate(tables, rd_untilt, &shifted, -1.0);

    rotate_z_eighth(tables, &untilted, -phase)
}

/// Scales a multipole expansion by `(child_scale / parent_scale)^ell`
/// (child finer ⇒ factor < 1), the last step of M2M.
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

/// Shifts a multipole expansion by `dist` along the z-axis using the
/// `dc` binomial-square-root table (spec.md §4.E.2 step 2).
pub(super) fn translate_z(tables: &KernelTables, input: &Expansion, dist: f64) -> Expansion {
    let p = tables.pterms;
    let two_p1 = 2 * p + 1;
    let dc_at = |n: usize, k: usize| -> f64 { tables.dc[n + k * two_p1] };

    let mut distpow = vec![1.0f64; p + 1];
    for i in 1..=p {
        distpow[i] = distpow[i - 1] * dist;
    }

    let mut out = zero_expansion(tables);
    for n in 0..=p {
        for m in 0..=n {
            let mut acc = Complex64::new(0.0, 0.0);
            for k in m..=n {
                let w = distpow[n - k] * dc_at(n - m, n - k) * dc_at(n + m, n - k);
                acc += input[idx(p, k, m)] * w;
            }
            out[idx(p, n, m)] = acc;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Accuracy;

    #[test]
    fn pure_monopole_translates_without_growing_unreasonably() {
        let tables = KernelTables::new(Accuracy::ThreeDigit);
        let mut m = zero_expansion(&tables);
        m[idx(tables.pterms, 0, 0)] = Complex64::new(5.0, 0.0);
        let out = m2m(&tables, &m, 0);
        // the DC term of a z-axis shift of a pure monopole is unchanged
        assert!((out[idx(tables.pterms, 0, 0)].re - 5.0).abs() < 1e-6);
    }
}
