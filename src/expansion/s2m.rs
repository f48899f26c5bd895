//! Source→multipole (spec.md §4.E.1).

use lin_alg::f64::Vec3;
use num_complex::Complex64;

use crate::tables::{idx, lgndr, KernelTables};

use super::{zero_expansion, Expansion};

const EPS: f64 = 1e-14;

/// Builds the multipole expansion of a leaf source box centred at `center`
/// with dimensionless scale `scale`, from its contained `(point, charge)`
/// pairs.
pub fn s2m(
    tables: &KernelTables,
    center: Vec3,
    scale: f64,
    coords: &[Vec3],
    charges: &[f64],
) -> Expansion {
    let p = tables.pterms;
    let mut m = zero_expansion(tables);

    for (&pt, &q) in coords.iter().zip(charges.iter()) {
        let dx = pt.x - center.x;
        let dy = pt.y - center.y;
        let dz = pt.z - center.z;
        let r = (dx * dx + dy * dy + dz * dz).sqrt();
        let ctheta = if r < EPS { 1.0 } else { dz / r };

        let proj = (dx * dx + dy * dy).sqrt();
        let (cphi, sphi) = if proj < EPS {
            (1.0, 0.0)
        } else {
            (dx / proj, dy / proj)
        };
        let ephi = Complex64::new(cphi, sphi);

        let legendre = lgndr(p, ctheta);
        let rscaled = r * scale;

        let ephi_conj = ephi.conj();
        let mut rpow = 1.0;

        for ell in 0..=p {
            for mm in 0..=ell {
                let pl = legendre[ell + mm * (p + 1)];
                let contribution = q * rpow * pl * tables.ytopc[idx(p, ell, mm)];
                m[idx(p, ell, mm)] += contribution * ephi_conj.powi(mm as i32);
            }
            rpow *= rscaled;
        }
    }

    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Accuracy;

    #[test]
    fn single_charge_at_center_has_only_dc_term() {
        let tables = KernelTables::new(Accuracy::ThreeDigit);
        let center = Vec3::new(0.0, 0.0, 0.0);
        let coords = [Vec3::new(0.0, 0.0, 0.0)];
        let charges = [3.0];
        let m = s2m(&tables, center, 1.0, &coords, &charges);
        assert!((m[idx(tables.pterms, 0, 0)].re - 3.0).abs() < 1e-9);
        for ell in 1..=tables.pterms {
            assert!(m[idx(tables.pterms, ell, 0)].norm() < 1e-9);
        }
    }
}
