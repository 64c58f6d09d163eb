use faer::prelude::*;
use log::{debug, info, warn};
use ndarray::{s, Array2, Array3, Array4};
use rayon::prelude::*;

use crate::config::StateSpaceParameters;
use crate::error::{BemError, BemResult};
use crate::hydro::HydrodynamicData;
use crate::irf::RadiationIrf;
use crate::progress::Progress;
use crate::util::{expm, hankel, mean, norm, norm_diff};

// Kernels whose mean-removed norm is below this fraction of their peak are
// treated as identically zero
const DEGENERATE_RTOL: f64 = 1e-12;

// Largest entry of `M M^-1 - I` accepted from the bilinear inversion
const SINGULAR_RESIDUAL: f64 = 1e-6;

/// Outcome of the order search for one (i, j) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealizationStatus {
    /// Kernel is zero after removing its mean; no realization computed
    DegenerateZero,
    /// R² threshold met
    Converged,
    /// Maximum order reached without meeting the threshold
    OrderLimitReached,
    /// Bilinear transform hit a singular matrix
    SingularMatrix,
    /// Hankel SVD failed
    DecompositionFailed,
}

/// Continuous-time realization of exactly `order` states
#[derive(Debug, Clone)]
pub struct ContinuousRealization {
    /// `[order][order]`
    pub a: Mat<f64>,
    /// `[order][1]`
    pub b: Mat<f64>,
    /// `[1][order]`
    pub c: Mat<f64>,
    pub d: f64,
}

impl ContinuousRealization {
    pub fn order(&self) -> usize {
        self.a.nrows()
    }

    /// `k[n] = C exp(A dt n) B` for `n` in `0..n_samples`
    pub fn impulse_response(&self, dt: f64, n_samples: usize) -> Vec<f64> {
        let ss = self.order();
        let a_dt = Mat::<f64>::from_fn(ss, ss, |i, j| self.a[(i, j)] * dt);
        let step = expm(a_dt.as_ref());
        let mut x = self.b.clone();
        (0..n_samples)
            .map(|_| {
                let y = (0..ss).map(|i| self.c[(0, i)] * x[(i, 0)]).sum::<f64>();
                x = &step * &x;
                y
            })
            .collect()
    }
}

/// Realization at one candidate order with its fit to the kernel
#[derive(Debug, Clone)]
pub struct Fit {
    pub realization: ContinuousRealization,
    pub k_est: Vec<f64>,
    pub r2: f64,
}

/// Singular value decomposition of the Hankel matrix of one kernel.
/// Independent of the candidate order so it is computed once per kernel.
pub struct HankelSvd {
    dt: f64,
    y0: f64,
    u: Mat<f64>,
    v: Mat<f64>,
    s: Vec<f64>,
}

impl HankelSvd {
    pub fn new(kernel: &[f64], dt: f64) -> BemResult<Self> {
        let n = kernel.len();
        if n < 4 {
            return Err(BemError::InsufficientData { needed: 4, got: n });
        }
        let y = kernel.iter().map(|&k| dt * k).collect::<Vec<_>>();
        let h = hankel(&y[1..]);
        let svd = h
            .thin_svd()
            .map_err(|e| BemError::Decomposition(format!("{:?}", e)))?;
        let s = svd.S().column_vector();
        Ok(Self {
            dt,
            y0: y[0],
            u: svd.U().to_owned(),
            v: svd.V().to_owned(),
            s: (0..s.nrows()).map(|i| s[i]).collect(),
        })
    }

    /// Largest order the shifted singular vector blocks support
    pub fn max_order(&self) -> usize {
        self.u.nrows() - 1
    }

    /// Discrete balanced realization `(a, b, c, d)` from the leading `ss`
    /// singular triplets.
    fn discrete(&self, ss: usize) -> (Mat<f64>, Mat<f64>, Mat<f64>, f64) {
        let m = self.u.nrows() - 1;
        let u1 = self.u.as_ref().submatrix(0, 0, m, ss);
        let u2 = self.u.as_ref().submatrix(1, 0, m, ss);
        let v1 = self.v.as_ref().submatrix(0, 0, m, ss);
        let sqs = self.s[..ss].iter().map(|s| s.sqrt()).collect::<Vec<_>>();

        let ubar = u1.transpose() * u2;
        let a = Mat::<f64>::from_fn(ss, ss, |i, j| ubar[(i, j)] * sqs[j] / sqs[i]);
        let b = Mat::<f64>::from_fn(ss, 1, |i, _| v1[(0, i)] * sqs[i]);
        let c = Mat::<f64>::from_fn(1, ss, |_, j| u1[(0, j)] * sqs[j]);
        (a, b, c, self.y0)
    }

    /// Continuous realization of order `ss` via the bilinear transform with
    /// coefficients `(dt/2, 1, -dt/2, 1)`.
    pub fn realization(&self, ss: usize) -> BemResult<ContinuousRealization> {
        let (a, b, c, d) = self.discrete(ss);
        let dt = self.dt;
        let (coe_a, coe_b, coe_c, coe_d) = (dt / 2., 1., -dt / 2., 1.);
        let eye = |i: usize, j: usize| if i == j { 1. } else { 0. };

        // (dt/2 I + dt/2 a)^-1
        let m = Mat::<f64>::from_fn(ss, ss, |i, j| coe_a * eye(i, j) - coe_c * a[(i, j)]);
        let iidd = invert(m.as_ref()).ok_or(BemError::SingularMatrix { order: ss })?;

        let a_shift = Mat::<f64>::from_fn(ss, ss, |i, j| coe_b * a[(i, j)] - coe_d * eye(i, j));
        let ac = &a_shift * &iidd;
        let iidd_b = &iidd * &b;
        let coe_bc = coe_a * coe_b - coe_c * coe_d;
        let bc = Mat::<f64>::from_fn(ss, 1, |i, _| coe_bc * iidd_b[(i, 0)]);
        let cc = &c * &iidd;
        let c_iidd_b = (0..ss).map(|i| cc[(0, i)] * b[(i, 0)]).sum::<f64>();
        let dc = d + coe_c * c_iidd_b;

        Ok(ContinuousRealization {
            a: ac,
            b: bc,
            c: cc,
            d: dc,
        })
    }

    /// Realization of order `ss` with its reconstructed kernel and
    /// `R² = 1 - (||K - k_est|| / r2bt)²`.
    pub fn fit(&self, ss: usize, kernel: &[f64], r2bt: f64) -> BemResult<Fit> {
        let realization = self.realization(ss)?;
        let k_est = realization.impulse_response(self.dt, kernel.len());
        let r2tt = norm_diff(kernel, &k_est);
        let r2 = 1. - (r2tt / r2bt).powi(2);
        Ok(Fit {
            realization,
            k_est,
            r2,
        })
    }
}

/// Inverse of a small square matrix, `None` if it is numerically singular.
fn invert(m: MatRef<f64>) -> Option<Mat<f64>> {
    let n = m.nrows();
    let eye = Mat::<f64>::from_fn(n, n, |i, j| if i == j { 1. } else { 0. });
    let inv = m.partial_piv_lu().solve(eye.as_ref());
    if !(0..n).all(|i| (0..n).all(|j| inv[(i, j)].is_finite())) {
        return None;
    }
    let r = m * inv.as_ref();
    let residual = (0..n)
        .flat_map(|i| (0..n).map(move |j| (i, j)))
        .fold(0., |acc: f64, (i, j)| acc.max((r[(i, j)] - eye[(i, j)]).abs()));
    if !(residual <= SINGULAR_RESIDUAL) {
        return None;
    }
    Some(inv)
}

/// `||K - mean(K)||`, the R² reference norm
pub fn reference_norm(kernel: &[f64]) -> f64 {
    let m = mean(kernel);
    norm(&kernel.iter().map(|&k| k - m).collect::<Vec<_>>())
}

fn is_degenerate(kernel: &[f64], r2bt: f64) -> bool {
    let peak = kernel.iter().fold(0., |acc: f64, &k| acc.max(k.abs()));
    r2bt == 0. || r2bt <= DEGENERATE_RTOL * peak
}

/// Realization of one (i, j) pair stored at the global maximum order.
/// Only the leading `order` block of `a`, `b` and `c` is populated.
#[derive(Debug, Clone)]
pub struct PairRealization {
    /// `[max_order][max_order]`
    pub a: Mat<f64>,
    /// `[max_order][1]`
    pub b: Mat<f64>,
    /// `[1][max_order]`
    pub c: Mat<f64>,
    pub d: f64,
    /// Selected state dimension, 0 when no realization was computed
    pub order: usize,
    /// Coefficient of determination of `k_est` against the kernel
    pub r2: f64,
    pub status: RealizationStatus,
    /// Impulse response reconstructed from the realization
    pub k_est: Vec<f64>,
}

impl PairRealization {
    fn empty(max_order: usize, n_samples: usize, status: RealizationStatus) -> Self {
        Self {
            a: Mat::zeros(max_order, max_order),
            b: Mat::zeros(max_order, 1),
            c: Mat::zeros(1, max_order),
            d: 0.,
            order: 0,
            r2: 0.,
            status,
            k_est: vec![0.; n_samples],
        }
    }

    fn from_fit(max_order: usize, fit: Fit, status: RealizationStatus) -> Self {
        let rz = &fit.realization;
        let ss = rz.order();
        let mut p = Self::empty(max_order, 0, status);
        p.a.as_mut().submatrix_mut(0, 0, ss, ss).copy_from(&rz.a);
        p.b.as_mut().submatrix_mut(0, 0, ss, 1).copy_from(&rz.b);
        p.c.as_mut().submatrix_mut(0, 0, 1, ss).copy_from(&rz.c);
        p.d = rz.d;
        p.order = ss;
        p.r2 = fit.r2;
        p.k_est = fit.k_est;
        p
    }
}

/// Fits a single kernel at a fixed order. Fails on degenerate kernels,
/// which have no meaningful R².
pub fn reduce_kernel_at_order(kernel: &[f64], dt: f64, order: usize) -> BemResult<Fit> {
    let r2bt = reference_norm(kernel);
    if is_degenerate(kernel, r2bt) {
        return Err(BemError::DegenerateCoefficient);
    }
    let svd = HankelSvd::new(kernel, dt)?;
    if order < 2 || order > svd.max_order() {
        return Err(BemError::InvalidOrder {
            order,
            max: svd.max_order(),
        });
    }
    svd.fit(order, kernel, r2bt)
}

/// Searches orders `2, 3, ...` until the R² threshold is met or the maximum
/// order is reached. Numerical failures are recorded in the status; only
/// structural problems (too few samples, bad parameters) are returned as
/// errors.
pub fn reduce_kernel(
    kernel: &[f64],
    dt: f64,
    p: &StateSpaceParameters,
) -> BemResult<PairRealization> {
    p.validate()?;
    let n = kernel.len();
    if n < 4 {
        return Err(BemError::InsufficientData { needed: 4, got: n });
    }

    let r2bt = reference_norm(kernel);
    if is_degenerate(kernel, r2bt) {
        return Ok(PairRealization::empty(
            p.max_order,
            n,
            RealizationStatus::DegenerateZero,
        ));
    }

    let svd = match HankelSvd::new(kernel, dt) {
        Ok(svd) => svd,
        Err(e) => {
            warn!("Hankel SVD failed: {}", e);
            return Ok(PairRealization::empty(
                p.max_order,
                n,
                RealizationStatus::DecompositionFailed,
            ));
        }
    };
    let max_order = p.max_order.min(svd.max_order());

    let mut best: Option<Fit> = None;
    let mut ss = 2;
    loop {
        let fit = match svd.fit(ss, kernel, r2bt) {
            Ok(fit) => fit,
            Err(e) => {
                warn!("{}", e);
                let status = RealizationStatus::SingularMatrix;
                return Ok(match best {
                    Some(fit) => PairRealization::from_fit(p.max_order, fit, status),
                    None => PairRealization::empty(p.max_order, n, status),
                });
            }
        };
        debug!("order {}: R2 = {:.6}", ss, fit.r2);

        if fit.r2 >= p.r2_threshold {
            return Ok(PairRealization::from_fit(
                p.max_order,
                fit,
                RealizationStatus::Converged,
            ));
        }
        if ss == max_order {
            return Ok(PairRealization::from_fit(
                p.max_order,
                fit,
                RealizationStatus::OrderLimitReached,
            ));
        }
        best = Some(fit);
        ss += 1;
    }
}

/// Flat `[i][j]`-major arrays of a realization bank, the layout consumed by
/// time-domain simulators.
#[derive(Debug, Clone)]
pub struct StateSpaceArrays {
    /// `[i][j][max_order][max_order]`
    pub a: Array4<f64>,
    /// `[i][j][max_order]`
    pub b: Array3<f64>,
    /// `[i][j][max_order]`
    pub c: Array3<f64>,
    /// `[i][j]`
    pub d: Array2<f64>,
    /// `[i][j]`
    pub order: Array2<usize>,
    /// `[i][j]`
    pub r2: Array2<f64>,
    /// `[i][j][t]`
    pub k_est: Array3<f64>,
}

/// State-space realizations of every radiation damping IRF entry
#[derive(Debug, Clone)]
pub struct StateSpaceRealization {
    pub max_order: usize,
    pub r2_threshold: f64,
    /// Sampling interval of the kernels (s)
    pub dt: f64,
    pub n_rows: usize,
    pub n_cols: usize,
    /// Row-major over (i, j)
    pub pairs: Vec<PairRealization>,
}

impl StateSpaceRealization {
    /// Reduces every K(i, j, :) of `irf` in parallel.
    pub fn from_irf(irf: &RadiationIrf, p: &StateSpaceParameters) -> BemResult<Self> {
        p.validate()?;
        let dt = irf.dt()?;
        let (n_rows, n_cols, n_t) = irf.k.dim();
        if n_t < 4 {
            return Err(BemError::InsufficientData {
                needed: 4,
                got: n_t,
            });
        }

        let progress = Progress::new(
            "radiation damping state space coefficients",
            n_rows * n_cols,
        );
        let pairs = (0..n_rows * n_cols)
            .into_par_iter()
            .map(|idx| {
                let (i, j) = (idx / n_cols, idx % n_cols);
                let kernel = irf.k.slice(s![i, j, ..]).to_vec();
                let pair = reduce_kernel(&kernel, dt, p);
                if let Ok(pr) = &pair {
                    match pr.status {
                        RealizationStatus::Converged | RealizationStatus::DegenerateZero => {
                            debug!("({}, {}): {:?}, order {}", i, j, pr.status, pr.order)
                        }
                        _ => warn!(
                            "({}, {}): {:?}, order {}, R2 = {:.4}",
                            i, j, pr.status, pr.order, pr.r2
                        ),
                    }
                }
                progress.tick();
                pair
            })
            .collect::<BemResult<Vec<_>>>()?;
        progress.finish();

        Ok(Self {
            max_order: p.max_order,
            r2_threshold: p.r2_threshold,
            dt,
            n_rows,
            n_cols,
            pairs,
        })
    }

    pub fn pair(&self, i: usize, j: usize) -> Option<&PairRealization> {
        if i < self.n_rows && j < self.n_cols {
            self.pairs.get(i * self.n_cols + j)
        } else {
            None
        }
    }

    /// Number of pairs with the given status
    pub fn count(&self, status: RealizationStatus) -> usize {
        self.pairs.iter().filter(|p| p.status == status).count()
    }

    fn at(&self, i: usize, j: usize) -> &PairRealization {
        &self.pairs[i * self.n_cols + j]
    }

    pub fn to_arrays(&self) -> StateSpaceArrays {
        let (ni, nj, mo) = (self.n_rows, self.n_cols, self.max_order);
        let n_t = self.pairs.first().map_or(0, |p| p.k_est.len());
        StateSpaceArrays {
            a: Array4::from_shape_fn((ni, nj, mo, mo), |(i, j, r, c)| self.at(i, j).a[(r, c)]),
            b: Array3::from_shape_fn((ni, nj, mo), |(i, j, r)| self.at(i, j).b[(r, 0)]),
            c: Array3::from_shape_fn((ni, nj, mo), |(i, j, r)| self.at(i, j).c[(0, r)]),
            d: Array2::from_shape_fn((ni, nj), |(i, j)| self.at(i, j).d),
            order: Array2::from_shape_fn((ni, nj), |(i, j)| self.at(i, j).order),
            r2: Array2::from_shape_fn((ni, nj), |(i, j)| self.at(i, j).r2),
            k_est: Array3::from_shape_fn((ni, nj, n_t), |(i, j, t)| {
                self.at(i, j).k_est.get(t).copied().unwrap_or(0.)
            }),
        }
    }
}

impl HydrodynamicData {
    /// Populates `rd.ss` from `rd.irf`.
    pub fn calc_ss_radiation(&mut self, p: &StateSpaceParameters) -> BemResult<()> {
        info!(
            "Calculating radiation damping state space coefficients for {}",
            self.name()
        );
        let ss = StateSpaceRealization::from_irf(self.rd.irf()?, p)?;
        info!(
            "{}: {} converged, {} at order limit, {} zero, {} failed",
            self.name(),
            ss.count(RealizationStatus::Converged),
            ss.count(RealizationStatus::OrderLimitReached),
            ss.count(RealizationStatus::DegenerateZero),
            ss.count(RealizationStatus::SingularMatrix)
                + ss.count(RealizationStatus::DecompositionFailed),
        );
        self.rd.ss = Some(ss);
        Ok(())
    }

    /// State-space realization of the excitation force is not available.
    pub fn calc_ss_excitation(&mut self, _p: &StateSpaceParameters) -> BemResult<()> {
        Err(BemError::Unimplemented(
            "state space realization of the excitation force",
        ))
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use approx::assert_relative_eq;
    use faer::mat;

    fn damped_cosine(dt: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|k| {
                let t = dt * (k as f64);
                (-t).exp() * (2. * t).cos()
            })
            .collect()
    }

    #[test]
    fn test_reference_norm() {
        assert_relative_eq!(reference_norm(&[1., 3.]), 2f64.sqrt());
        assert_eq!(reference_norm(&[0.; 5]), 0.);
    }

    #[test]
    fn test_degenerate_constant_kernel() {
        let p = StateSpaceParameters::default();
        let pr = reduce_kernel(&[0.3; 50], 0.1, &p).unwrap();
        assert_eq!(pr.status, RealizationStatus::DegenerateZero);
        assert_eq!(pr.order, 0);
        assert_eq!(pr.a.nrows(), p.max_order);
        assert!((0..p.max_order).all(|i| {
            pr.b[(i, 0)] == 0. && pr.c[(0, i)] == 0. && (0..p.max_order).all(|j| pr.a[(i, j)] == 0.)
        }));
        assert_eq!(pr.d, 0.);

        let pr = reduce_kernel(&[0.; 50], 0.1, &p).unwrap();
        assert_eq!(pr.status, RealizationStatus::DegenerateZero);

        assert!(matches!(
            reduce_kernel_at_order(&[0.; 50], 0.1, 2),
            Err(BemError::DegenerateCoefficient)
        ));
    }

    #[test]
    fn test_short_kernel() {
        let p = StateSpaceParameters::default();
        assert!(matches!(
            reduce_kernel(&[1., 0.5, 0.2], 0.1, &p),
            Err(BemError::InsufficientData { needed: 4, got: 3 })
        ));
    }

    #[test]
    fn test_invalid_order() {
        let k = damped_cosine(0.1, 20);
        assert!(matches!(
            reduce_kernel_at_order(&k, 0.1, 1),
            Err(BemError::InvalidOrder { order: 1, .. })
        ));
        assert!(matches!(
            reduce_kernel_at_order(&k, 0.1, 19),
            Err(BemError::InvalidOrder { order: 19, max: 18 })
        ));
    }

    #[test]
    fn test_realization_shapes() {
        let k = damped_cosine(0.1, 60);
        let svd = HankelSvd::new(&k, 0.1).unwrap();
        assert_eq!(svd.max_order(), 58);
        assert!(svd.s.windows(2).all(|w| w[0] >= w[1]));

        let rz = svd.realization(4).unwrap();
        assert_eq!(rz.order(), 4);
        assert_eq!((rz.b.nrows(), rz.b.ncols()), (4, 1));
        assert_eq!((rz.c.nrows(), rz.c.ncols()), (1, 4));
    }

    #[test]
    fn test_order_bounds_and_storage() {
        let k = damped_cosine(0.1, 100);
        let p = StateSpaceParameters {
            max_order: 6,
            r2_threshold: 1.,
        };
        let pr = reduce_kernel(&k, 0.1, &p).unwrap();
        assert!(pr.order >= 2 && pr.order <= 6);
        assert_eq!((pr.a.nrows(), pr.a.ncols()), (6, 6));
        assert_eq!(pr.k_est.len(), 100);
        // Entries outside the leading block stay zero
        for i in pr.order..6 {
            assert_eq!(pr.b[(i, 0)], 0.);
            assert_eq!(pr.c[(0, i)], 0.);
            for j in 0..6 {
                assert_eq!(pr.a[(i, j)], 0.);
                assert_eq!(pr.a[(j, i)], 0.);
            }
        }
    }

    #[test]
    fn test_excitation_ss_unimplemented() {
        let mut hd = HydrodynamicData::default();
        assert!(matches!(
            hd.calc_ss_excitation(&StateSpaceParameters::default()),
            Err(BemError::Unimplemented(_))
        ));
    }

    #[test]
    fn test_ss_radiation_requires_irf() {
        let mut hd = HydrodynamicData::default();
        assert!(matches!(
            hd.calc_ss_radiation(&StateSpaceParameters::default()),
            Err(BemError::UninitializedField("rd.irf"))
        ));
    }

    #[test]
    fn test_invert_singular() {
        let m = mat![[1., 2.], [2., 4.]];
        assert!(invert(m.as_ref()).is_none());

        let m = mat![[2., 0.], [0., 4.]];
        let inv = invert(m.as_ref()).unwrap();
        assert_relative_eq!(inv[(0, 0)], 0.5);
        assert_relative_eq!(inv[(1, 1)], 0.25);
        assert_relative_eq!(inv[(1, 0)], 0.);
    }
}
