//! Precomputation tables (spec.md §4.D).
//!
//! Every table here is a deterministic, pure function of `accuracy` alone
//! (via `pterms`/`nlambs`), so a [`KernelTables`] is built once and shared
//! (`Arc`) by [`crate::config::FmmConfig`] across solves. The derivations
//! mirror `frmini`/`rotgen`/`bnlcft`/`fstrtn`/`rlscini`/`mkfexp`/`mkexps` in
//! `apps/fmm/futures/fmm-laplace.c` of the original HPX-5 source; the
//! quadrature constants (`rlams`, `whts`, `numfour`, `numphys`) are carried
//! over verbatim since they are the product of an offline nonlinear
//! optimization spec.md says must not be re-derived.

use num_complex::Complex64;

use crate::config::Accuracy;

/// Packed triangular index `idx(ell, m) = ell + m * (p + 1)`, used for every
/// multipole/local coefficient array (spec.md §4.E).
#[inline]
pub fn idx(pterms: usize, ell: usize, m: usize) -> usize {
    ell + m * (pterms + 1)
}

pub struct KernelTables {
    pub pterms: usize,
    pub nlambs: usize,
    pub pgsz: usize,

    /// spherical-harmonic normalization √((ℓ−m)!/(ℓ+m)!), packed by `idx`.
    pub ytopc: Vec<f64>,
    pub ytopcs: Vec<f64>,
    pub ytopcsinv: Vec<f64>,

    /// Binomial-coefficient square roots, flat array of length
    /// `(2p+1) * (2p+1)`, indexed `dc[n + m*(2p+1)]`.
    pub dc: Vec<f64>,

    /// Wigner small-d rotation matrices for θ = π/2, −π/2, acos(√3/3),
    /// acos(−√3/3). Each is a flat array of length `pgsz * (2p+1)`, indexed
    /// `rd[ell + mp*(p+1) + (m+p)*pgsz]`.
    pub rdplus: Vec<f64>,
    pub rdminus: Vec<f64>,
    pub rdsq3: Vec<f64>,
    pub rdmsq3: Vec<f64>,

    /// Plane-wave quadrature nodes/weights, one per λ-ring.
    pub rlams: Vec<f64>,
    pub whts: Vec<f64>,
    /// Fourier / physical mode counts per λ-ring.
    pub numfour: Vec<usize>,
    pub numphys: Vec<usize>,

    pub nexptot: usize,
    pub nthmax: usize,
    pub nexptotp: usize,
    pub nexpmax: usize,

    /// `rlams[nell]^ell / sqrt((ell-m)!(ell+m)!)`, flat length
    /// `pgsz * nlambs`, indexed `rlsc[ell + m*(p+1) + nell*pgsz]`.
    pub rlsc: Vec<f64>,

    /// Fourier/physical merge tables used by the M2X/X2L phase-2 steps.
    pub fexpe: Vec<Complex64>,
    pub fexpo: Vec<Complex64>,
    pub fexpback: Vec<Complex64>,

    /// Per-(λ-ring, physical angle) plane-wave shifts and their squares/cubes.
    pub xs: Vec<Complex64>,
    pub ys: Vec<Complex64>,
    pub zs: Vec<f64>,
}

impl KernelTables {
    pub fn new(accuracy: Accuracy) -> Self {
        let pterms = accuracy.pterms();
        let nlambs = accuracy.nlambs();
        let pgsz = accuracy.pgsz();

        let (ytopc, ytopcs, ytopcsinv) = frmini(pterms);
        let dc = bnlcft(2 * pterms);
        let rdplus = fstrtn(pterms, &dc, (0f64).acos());
        let rdminus = fstrtn(pterms, &dc, -(0f64).acos());
        let rdsq3 = fstrtn(pterms, &dc, (3f64.sqrt() / 3.0).acos());
        let rdmsq3 = fstrtn(pterms, &dc, (-(3f64.sqrt()) / 3.0).acos());

        let (rlams, whts) = vwts(nlambs);
        let numfour = numthetahalf(nlambs);
        let numphys = numthetafour(nlambs);

        let nexptot: usize = numfour.iter().sum();
        let nthmax = numfour.iter().copied().max().unwrap_or(0);
        let nexptotp: usize = numphys.iter().sum::<usize>() / 2;
        let nexpmax = nexptot.max(nexptotp) + 1;

        let rlsc = rlscini(pterms, nlambs, &rlams);
        let (fexpe, fexpo, fexpback) = mkfexp(nlambs, &numfour, &numphys);
        let (xs, ys, zs) = mkexps(nlambs, &numphys, &rlams, nexpmax);

        Self {
            pterms,
            nlambs,
            pgsz,
            ytopc,
            ytopcs,
            ytopcsinv,
            dc,
            rdplus,
            rdminus,
            rdsq3,
            rdmsq3,
            rlams,
            whts,
            numfour,
            numphys,
            nexptot,
            nthmax,
            nexptotp,
            nexpmax,
            rlsc,
            fexpe,
            fexpo,
            fexpback,
            xs,
            ys,
            zs,
        }
    }

    #[inline]
    pub fn idx(&self, ell: usize, m: usize) -> usize {
        idx(self.pterms, ell, m)
    }
}

/// `ytopc`/`ytopcs`/`ytopcsinv`: factorial-ratio normalizations (`frmini`).
fn frmini(pterms: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let pgsz = (pterms + 1) * (pterms + 1);
    let mut factorial = vec![0.0f64; 2 * pterms + 1];
    let mut d = 1.0;
    factorial[0] = d;
    for ell in 1..=2 * pterms {
        d *= (ell as f64).sqrt();
        factorial[ell] = d;
    }

    let mut ytopc = vec![0.0f64; pgsz];
    let mut ytopcs = vec![0.0f64; pgsz];
    let mut ytopcsinv = vec![0.0f64; pgsz];
    ytopcs[0] = 1.0;
    ytopcsinv[0] = 1.0;

    for m in 0..=pterms {
        for ell in m..=pterms {
            let i = idx(pterms, ell, m);
            ytopc[i] = factorial[ell - m] / factorial[ell + m];
            ytopcsinv[i] = factorial[ell - m] * factorial[ell + m];
            ytopcs[i] = 1.0 / ytopcsinv[i];
        }
    }

    (ytopc, ytopcs, ytopcsinv)
}

/// Square roots of binomial coefficients, flattened `c[n + m*(p+1)]` for
/// `0 <= m <= n <= p` (`bnlcft`, called with `p = 2*pterms`).
fn bnlcft(p: usize) -> Vec<f64> {
    let mut c = vec![0.0f64; (p + 1) * (p + 1)];
    for n in 0..=p {
        c[n] = 1.0;
    }

    for m in 1..=p {
        let offset = m * (p + 1);
        let offset1 = offset as isize - (p as isize) - 1;
        c[m + offset] = 1.0;
        for n in (m + 1)..=p {
            let prev = c[n - 1 + offset];
            let prev1 = c[(n as isize - 1 + offset1) as usize];
            c[n + offset] = prev + prev1;
        }
    }

    for m in 1..=p {
        let offset = m * (p + 1);
        for n in (m + 1)..=p {
            c[n + offset] = c[n + offset].sqrt();
        }
    }

    c
}

/// Wigner small-d rotation matrix for rotation angle `theta`, built from the
/// binomial table `dc` (`fstrtn`, with its own `p = pterms`; `dc` was built
/// with `bnlcft(2 * pterms)` so the `2p+1`-wide rows it reads are already
/// populated).
fn fstrtn(p: usize, dc: &[f64], theta: f64) -> Vec<f64> {
    let precision = 1.0e-19;
    let ww = 2f64.sqrt() / 2.0;
    let pgsz = (p + 1) * (p + 1);
    let two_p1 = 2 * p + 1;

    let mut ctheta = theta.cos();
    if ctheta.abs() <= precision {
        ctheta = 0.0;
    }
    let mut stheta = (-theta).sin();
    if stheta.abs() <= precision {
        stheta = 0.0;
    }
    let hsthta = ww * stheta;
    let cthtap = ww * (1.0 + ctheta);
    let cthtan = -ww * (1.0 - ctheta);

    // d[ell + mp*(p+1) + (m+p)*pgsz], m in [-p, p], mp in [0, p], ell in [0, p]
    let mut d = vec![0.0f64; pgsz * two_p1];
    let at = |ell: isize, mp: isize, m: isize| -> usize {
        (ell + mp * (p as isize + 1) + (m + p as isize) * pgsz as isize) as usize
    };
    // dc[n + m*(2p+1)] with m in {1, 2} as read by this routine.
    let dc_at = |n: isize, m: isize| -> f64 { dc[(n + m * two_p1 as isize) as usize] };

    d[at(p as isize, 0, 0)] = 1.0;

    for ij in 1..=p as isize {
        for im in -ij..=-1 {
            let index = at(ij, 0, im);
            let mut v = -dc_at(ij - im, 2) * d[at(ij - 1, 0, im + 1)];
            if im > 1 - ij {
                v += dc_at(ij + im, 2) * d[at(ij - 1, 0, im - 1)];
            }
            v *= hsthta;
            if im > -ij {
                v += d[at(ij - 1, 0, im)] * ctheta * dc_at(ij + im, 1) * dc_at(ij - im, 1);
            }
            d[index] = v / ij as f64;
        }

        d[at(ij, 0, 0)] = d[at(ij - 1, 0, 0)] * ctheta;
        if ij > 1 {
            d[at(ij, 0, 0)] += hsthta * dc_at(ij, 2)
                * (d[at(ij - 1, 0, -1)] + d[at(ij - 1, 0, 1)])
                / ij as f64;
        }

        for im in 1..=ij {
            let index = at(ij, 0, im);
            let mut v = -dc_at(ij + im, 2) * d[at(ij - 1, 0, im - 1)];
            if im < ij - 1 {
                v += dc_at(ij - im, 2) * d[at(ij - 1, 0, im + 1)];
            }
            v *= hsthta;
            if im < ij {
                v += d[at(ij - 1, 0, im)] * ctheta * dc_at(ij + im, 1) * dc_at(ij - im, 1);
            }
            d[index] = v / ij as f64;
        }

        for imp in 1..=ij {
            for im in -ij..=-1 {
                let index1 = at(ij, imp, im);
                let index2 = at(ij - 1, imp - 1, im);
                let mut v =
                    d[index2 + pgsz] * cthtan * dc_at(ij - im, 2);
                if im > 1 - ij {
                    v -= d[index2 - pgsz] * cthtap * dc_at(ij + im, 2);
                }
                if im > -ij {
                    v += d[index2] * stheta * dc_at(ij + im, 1) * dc_at(ij - im, 1);
                }
                d[index1] = v * ww / dc_at(ij + imp, 2);
            }

            let index3 = at(ij, imp, 0);
            let index4 = at(ij - 1, imp - 1, 0);
            let mut v3 = ij as f64 * stheta * d[index4];
            if ij > 1 {
                v3 -= dc_at(ij, 2) * (d[index4 - pgsz] * cthtap + d[index4 + pgsz] * cthtan);
            }
            d[index3] = v3 * ww / dc_at(ij + imp, 2);

            for im in 1..=ij {
                let index5 = at(ij, imp, im);
                let index6 = at(ij - 1, imp - 1, im);
                let mut v = d[index6 - pgsz] * cthtap * dc_at(ij + im, 2);
                if im < ij - 1 {
                    v -= d[index6 + pgsz] * cthtan * dc_at(ij - im, 2);
                }
                if im < ij {
                    v += d[index6] * stheta * dc_at(ij + im, 1) * dc_at(ij - im, 1);
                }
                d[index5] = v * ww / dc_at(ij + imp, 2);
            }
        }
    }

    d
}

/// Plane-wave quadrature nodes and weights, hardcoded for nλ ∈ {9, 18}
/// (`vwts`). Values are the nonlinear-optimization constants from the
/// original FMM3D-derived source and must be reproduced verbatim.
fn vwts(nlambs: usize) -> (Vec<f64>, Vec<f64>) {
    if nlambs == 9 {
        (
            vec![
                0.99273996739714473469540223504736787e-01,
                0.47725674637049431137114652301534079e+00,
                0.10553366138218296388373573790886439e+01,
                0.17675934335400844688024335482623428e+01,
                0.25734262935147067530294862081063911e+01,
                0.34482433920158257478760788217186928e+01,
                0.43768098355472631055818055756390095e+01,
                0.53489575720546005399569367000367492e+01,
                0.63576578531337464283978988532908261e+01,
            ],
            vec![
                0.24776441819008371281185532097879332e+00,
                0.49188566500464336872511239562300034e+00,
                0.65378749137677805158830324216978624e+00,
                0.76433038408784093054038066838984378e+00,
                0.84376180565628111640563702167128213e+00,
                0.90445883985098263213586733400006779e+00,
                0.95378613136833456653818075210438110e+00,
                0.99670261613218547047665651916759089e+00,
                0.10429422730252668749528766056755558e+01,
            ],
        )
    } else if nlambs == 18 {
        (
            vec![
                0.52788527661177607475107009804560221e-01,
                0.26949859838931256028615734976483509e+00,
                0.63220353174689392083962502510985360e+00,
                0.11130756427760852833586113774799742e+01,
                0.16893949614021379623807206371566281e+01,
                0.23437620046953044905535534780938178e+01,
                0.30626998290780611533534738555317745e+01,
                0.38356294126529686394633245072327554e+01,
                0.46542473432156272750148673367220908e+01,
                0.55120938659358147404532246582675725e+01,
                0.64042126837727888499784967279992998e+01,
                0.73268800190617540124549122992902994e+01,
                0.82774009925823861522076185792684555e+01,
                0.92539718060248947750778825138695538e+01,
                0.10255602723746401139237605093512684e+02,
                0.11282088297877740146191172243561596e+02,
                0.12334067909676926788620221486780792e+02,
                0.13414920240172401477707353478763252e+02,
            ],
            vec![
                0.13438265914335215112096477696468355e+00,
                0.29457752727395436487256574764614925e+00,
                0.42607819361148618897416895379137713e+00,
                0.53189220776549905878027857397682965e+00,
                0.61787306245538586857435348065337166e+00,
                0.68863156078905074508611505734734237e+00,
                0.74749099381426187260757387775811367e+00,
                0.79699192718599998208617307682288811e+00,
                0.83917454386997591964103548889397644e+00,
                0.87570092283745315508980411323136650e+00,
                0.90792943590067498593754180546966381e+00,
                0.93698393742461816291466902839601971e+00,
                0.96382546688788062194674921556725167e+00,
                0.98932985769673820186653756536543369e+00,
                0.10143828459791703888726033255807124e+01,
                0.10400365437416452252250564924906939e+01,
                0.10681548926956736522697610780596733e+01,
                0.11090758097553685690428437737864442e+01,
            ],
        )
    } else {
        unreachable!("nlambs must be 9 or 18")
    }
}

fn numthetahalf(nlambs: usize) -> Vec<usize> {
    if nlambs == 9 {
        vec![2, 4, 4, 6, 6, 4, 6, 4, 2]
    } else {
        vec![4, 6, 6, 8, 8, 8, 10, 10, 10, 10, 12, 12, 12, 12, 12, 12, 8, 2]
    }
}

fn numthetafour(nlambs: usize) -> Vec<usize> {
    if nlambs == 9 {
        vec![4, 8, 12, 16, 20, 20, 24, 8, 2]
    } else {
        vec![
            6, 8, 12, 16, 20, 26, 30, 34, 38, 44, 48, 52, 56, 60, 60, 52, 4, 2,
        ]
    }
}

/// `rlams[nell]^ell / sqrt((ell-m)!(ell+m)!)` (`rlscini`).
fn rlscini(pterms: usize, nlambs: usize, rlams: &[f64]) -> Vec<f64> {
    let pgsz = (pterms + 1) * (pterms + 1);
    let mut factorial = vec![0.0f64; 2 * pterms + 1];
    factorial[0] = 1.0;
    for i in 1..=2 * pterms {
        factorial[i] = factorial[i - 1] * (i as f64).sqrt();
    }

    let mut rlsc = vec![0.0f64; pgsz * nlambs];
    let mut rlampow = vec![0.0f64; pterms + 1];
    for nell in 0..nlambs {
        rlampow[0] = 1.0;
        for j in 1..=pterms {
            rlampow[j] = rlampow[j - 1] * rlams[nell];
        }
        for j in 0..=pterms {
            for k in 0..=j {
                rlsc[idx(pterms, j, k) + nell * pgsz] =
                    rlampow[j] / factorial[j - k] / factorial[j + k];
            }
        }
    }
    rlsc
}

/// Fourier/physical merge tables (`mkfexp`). Sized exactly from
/// `numfour`/`numphys` rather than the original's hardcoded 15000-element
/// buffers (spec.md §9 open question).
fn mkfexp(
    nlambs: usize,
    numfour: &[usize],
    numphys: &[usize],
) -> (Vec<Complex64>, Vec<Complex64>, Vec<Complex64>) {
    let pi = std::f64::consts::PI;

    let nexte_total: usize = (0..nlambs)
        .map(|i| (numphys[i] / 2) * ((numfour[i] - 1) / 2))
        .sum();
    let nexto_total: usize = (0..nlambs)
        .map(|i| (numphys[i] / 2) * (numfour[i].saturating_sub(1) / 2))
        .sum();

    let mut fexpe = Vec::with_capacity(nexte_total.max(1));
    let mut fexpo = Vec::with_capacity(nexto_total.max(1));

    for i in 0..nlambs {
        let nalpha = numphys[i];
        let nalpha2 = nalpha / 2;
        let halpha = 2.0 * pi / nalpha as f64;
        for j in 1..=nalpha2 {
            let alpha = (j - 1) as f64 * halpha;
            let mut nm = 2;
            while nm <= numfour[i] {
                fexpe.push(Complex64::new(0.0, (nm - 1) as f64 * alpha).exp());
                nm += 2;
            }
            let mut nm = 3;
            while nm <= numfour[i] {
                fexpo.push(Complex64::new(0.0, (nm - 1) as f64 * alpha).exp());
                nm += 2;
            }
        }
    }

    let mut fexpback = Vec::new();
    for i in 0..nlambs {
        let nalpha = numphys[i];
        let nalpha2 = nalpha / 2;
        let halpha = 2.0 * pi / nalpha as f64;
        let mut nm = 3;
        while nm <= numfour[i] {
            for j in 1..=nalpha2 {
                let alpha = (j - 1) as f64 * halpha;
                fexpback.push(Complex64::new(0.0, -((nm - 1) as f64) * alpha).exp());
            }
            nm += 2;
        }
        let mut nm = 2;
        while nm <= numfour[i] {
            for j in 1..=nalpha2 {
                let alpha = (j - 1) as f64 * halpha;
                fexpback.push(Complex64::new(0.0, -((nm - 1) as f64) * alpha).exp());
            }
            nm += 2;
        }
    }

    (fexpe, fexpo, fexpback)
}

/// Per-(λ-ring, physical angle) plane-wave shift factors and their squares
/// and cubes (`mkexps`).
fn mkexps(
    nlambs: usize,
    numphys: &[usize],
    rlams: &[f64],
    nexpmax: usize,
) -> (Vec<Complex64>, Vec<Complex64>, Vec<f64>) {
    let pi = std::f64::consts::PI;
    let mut xs = vec![Complex64::new(0.0, 0.0); 3 * nexpmax];
    let mut ys = vec![Complex64::new(0.0, 0.0); 3 * nexpmax];
    let mut zs = vec![0.0f64; 3 * nexpmax];

    let mut ntot = 0usize;
    for nell in 0..nlambs {
        let hu = 2.0 * pi / numphys[nell] as f64;
        for mth in 0..numphys[nell] / 2 {
            let u = mth as f64 * hu;
            let n = 3 * (ntot + mth);
            zs[n] = (-rlams[nell]).exp();
            zs[n + 1] = zs[n] * zs[n];
            zs[n + 2] = zs[n] * zs[n + 1];
            xs[n] = Complex64::new(0.0, u.cos() * rlams[nell]).exp();
            xs[n + 1] = xs[n] * xs[n];
            xs[n + 2] = xs[n + 1] * xs[n];
            ys[n] = Complex64::new(0.0, u.sin() * rlams[nell]).exp();
            ys[n + 1] = ys[n] * ys[n];
            ys[n + 2] = ys[n + 1] * ys[n];
        }
        ntot += numphys[nell] / 2;
    }

    (xs, ys, zs)
}

/// Associated Legendre functions via the standard three-term recursion
/// (`lgndr`), packed the same way as the multipole/local coefficients:
/// `y[idx(nmax, ell, m)]`.
pub fn lgndr(nmax: usize, x: f64) -> Vec<f64> {
    let mut y = vec![0.0f64; (nmax + 1) * (nmax + 1)];
    let u = -(1.0 - x * x).sqrt();
    y[0] = 1.0;
    if nmax == 0 {
        return y;
    }
    y[1] = x * y[0];
    for n in 2..=nmax {
        y[n] = ((2 * n - 1) as f64 * x * y[n - 1] - (n - 1) as f64 * y[n - 2]) / n as f64;
    }

    let offset1 = nmax + 2;
    for m in 1..nmax {
        let offset2 = m * offset1;
        y[offset2] = y[offset2 - offset1] * u * (2 * m - 1) as f64;
        y[offset2 + 1] = y[offset2] * x * (2 * m + 1) as f64;
        for n in (m + 2)..=nmax {
            let offset3 = n + m * (nmax + 1);
            y[offset3] = ((2 * n - 1) as f64 * x * y[offset3 - 1]
                - (n + m - 1) as f64 * y[offset3 - 2])
                / (n - m) as f64;
        }
    }

    y[nmax + nmax * (nmax + 1)] = y[nmax - 1 + (nmax - 1) * (nmax + 1)] * u * (2 * nmax - 1) as f64;
    y
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legendre_p0_p1_identities() {
        let y = lgndr(4, 0.5);
        assert!((y[0] - 1.0).abs() < 1e-12); // P_0^0 = 1
        assert!((y[1] - 0.5).abs() < 1e-12); // P_1^0 = x
    }

    #[test]
    fn tables_build_for_both_accuracies() {
        let t3 = KernelTables::new(Accuracy::ThreeDigit);
        assert_eq!(t3.pterms, 9);
        assert_eq!(t3.pgsz, 100);
        assert_eq!(t3.rlams.len(), 9);

        let t6 = KernelTables::new(Accuracy::SixDigit);
        assert_eq!(t6.pterms, 18);
        assert_eq!(t6.pgsz, 361);
        assert_eq!(t6.rlams.len(), 18);
    }

    #[test]
    fn ytopc_diagonal_is_one() {
        let t = KernelTables::new(Accuracy::ThreeDigit);
        // ytopc[idx(ell, 0)] = (ell)!/(ell)! = 1
        for ell in 0..=t.pterms {
            let i = t.idx(ell, 0);
            assert!((t.ytopc[i] - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn rotation_matrix_root_entry_is_one() {
        let t = KernelTables::new(Accuracy::ThreeDigit);
        // d[0 + 0*(p+1) + (0+p)*pgsz] = 1.0 always (see fstrtn's seed value).
        let at0 = t.pgsz * t.pterms; // ell=0, mp=0, m=0 -> 0 + 0 + p*pgsz
        assert!((t.rdplus[at0] - 1.0).abs() < 1e-9);
    }
}
