//! Local→target (spec.md §4.E.6): evaluates a target box's local expansion
//! (and its gradient, for the field) at each contained target point.

use lin_alg::f64::Vec3;
use num_complex::Complex64;

use crate::tables::{idx, lgndr, KernelTables};

use super::Expansion;

const EPS: f64 = 1e-14;

/// Evaluates potential and field (`-∇φ`) of a local expansion at one point.
pub fn l2t(tables: &KernelTables, local: &Expansion, center: Vec3, scale: f64, target: Vec3) -> (f64, Vec3) {
    let p = tables.pterms;
    let dx = target.x - center.x;
    let dy = target.y - center.y;
    let dz = target.z - center.z;
    let r = (dx * dx + dy * dy + dz * dz).sqrt();

    if r < EPS {
        // Only the ell=0 term survives at the expansion centre; its
        // gradient is the dipole (ell=1) term evaluated in the m2m limit,
        // which for a target coincident with the box centre we take as
        // zero rather than chase a removable singularity in spherical
        // coordinates.
        return (local[idx(p, 0, 0)].re, Vec3::new(0.0, 0.0, 0.0));
    }

    let ctheta = dz / r;
    let stheta = (1.0 - ctheta * ctheta).max(0.0).sqrt();
    let proj = (dx * dx + dy * dy).sqrt();
    let (cphi, sphi) = if proj < EPS { (1.0, 0.0) } else { (dx / proj, dy / proj) };

    let legendre = lgndr(p, ctheta);
    let rscaled = r * scale;

    let mut phi = 0.0f64;
    let mut dphi_dr = 0.0f64;
    let mut dphi_dtheta = 0.0f64;
    let mut dphi_dphi = 0.0f64;

    let mut rpow = vec![0.0f64; p + 1];
    rpow[0] = 1.0;
    for i in 1..=p {
        rpow[i] = rpow[i - 1] * rscaled;
    }

    for m in 0..=p {
        let ephi = Complex64::new(cphi, sphi).powi(m as i32);
        let mut am = Complex64::new(0.0, 0.0);
        let mut dam_dr = Complex64::new(0.0, 0.0);
        let mut dam_dtheta = Complex64::new(0.0, 0.0);

        for ell in m..=p {
            let coeff = local[idx(p, ell, m)] * tables.ytopc[idx(p, ell, m)];
            let pl = legendre[ell + m * (p + 1)];
            am += coeff * rpow[ell] * pl;
            if ell >= 1 {
                dam_dr += coeff * (ell as f64) * rpow[ell - 1] * pl;
            }

            // sinθ·dP/dθ = ell·cosθ·P_ell^m − (ell+m)·P_{ell−1}^m
            let p_prev = if ell >= 1 { legendre[(ell - 1) + m * (p + 1)] } else { 0.0 };
            let dpl_dtheta_times_sin = ell as f64 * ctheta * pl - (ell + m) as f64 * p_prev;
            let dpl_dtheta = if stheta > EPS {
                dpl_dtheta_times_sin / stheta
            } else {
                0.0
            };
            dam_dtheta += coeff * rpow[ell] * dpl_dtheta;
        }

        let contrib = (am * ephi).re;
        let contrib_r = (dam_dr * ephi).re;
        let contrib_theta = (dam_dtheta * ephi).re;
        let contrib_phi = (am * ephi * Complex64::new(0.0, m as f64)).re;

        if m == 0 {
            phi += contrib;
            dphi_dr += contrib_r * scale;
            dphi_dtheta += contrib_theta;
            dphi_dphi += contrib_phi;
        } else {
            phi += 2.0 * contrib;
            dphi_dr += 2.0 * contrib_r * scale;
            dphi_dtheta += 2.0 * contrib_theta;
            dphi_dphi += 2.0 * contrib_phi;
        }
    }

    let rhat = Vec3::new(stheta * cphi, stheta * sphi, ctheta);
    let thetahat = Vec3::new(ctheta * cphi, ctheta * sphi, -stheta);
    let phihat = Vec3::new(-sphi, cphi, 0.0);

    let inv_r = 1.0 / r;
    let inv_rsin = if stheta > EPS { 1.0 / (r * stheta) } else { 0.0 };

    let grad = Vec3::new(
        dphi_dr * rhat.x + dphi_dtheta * inv_r * thetahat.x + dphi_dphi * inv_rsin * phihat.x,
        dphi_dr * rhat.y + dphi_dtheta * inv_r * thetahat.y + dphi_dphi * inv_rsin * phihat.y,
        dphi_dr * rhat.z + dphi_dtheta * inv_r * thetahat.z + dphi_dphi * inv_rsin * phihat.z,
    );

    (phi, Vec3::new(-grad.x, -grad.y, -grad.z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Accuracy;
    use crate::expansion::zero_expansion;

    #[test]
    fn monopole_local_term_gives_constant_potential_no_field() {
        let tables = KernelTables::new(Accuracy::ThreeDigit);
        let mut l = zero_expansion(&tables);
        l[idx(tables.pterms, 0, 0)] = Complex64::new(7.0, 0.0);
        let (phi, field) = l2t(&tables, &l, Vec3::new(0.0, 0.0, 0.0), 1.0, Vec3::new(0.3, 0.1, 0.2));
        assert!((phi - 7.0).abs() < 1e-9);
        assert!(field.x.abs() < 1e-9 && field.y.abs() < 1e-9 && field.z.abs() < 1e-9);
    }
}
