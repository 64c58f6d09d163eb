use std::f64::consts::PI;

use log::info;
use ndarray::{Array1, Array2, Array3, ArrayView3, Axis, Zip};

use crate::config::{ExcitationIrfParameters, RadiationIrfParameters};
use crate::error::{BemError, BemResult};
use crate::hydro::HydrodynamicData;
use crate::interp::{interpolate_coefficients, uniform_grid};
use crate::progress::Progress;
use crate::quadrature::Quadrature;
use crate::util::linspace;

/// Radiation damping impulse response functions
#[derive(Debug, Clone)]
pub struct RadiationIrf {
    /// Time (s), `[0, t_end]`
    pub t: Vec<f64>,
    /// Uniform frequency grid used for the reconstruction (rad/s)
    pub w: Vec<f64>,
    /// `K(t) = 2/π ∫ B(ω) cos(ωt) dω`, `[i][j][t]`
    pub k: Array3<f64>,
    /// `L(t) = 2/π ∫ B(ω) sin(ωt) dω`, `[i][j][t]`
    pub l: Array3<f64>,
}

impl RadiationIrf {
    /// Time step of the uniform time grid
    pub fn dt(&self) -> BemResult<f64> {
        if self.t.len() < 2 {
            return Err(BemError::InsufficientData {
                needed: 2,
                got: self.t.len(),
            });
        }
        Ok(self.t[1] - self.t[0])
    }
}

/// Excitation force impulse response function
#[derive(Debug, Clone)]
pub struct ExcitationIrf {
    /// Time (s), `[-t_length, t_length]`
    pub t: Vec<f64>,
    /// Uniform frequency grid used for the reconstruction (rad/s)
    pub w: Vec<f64>,
    /// `f(t) = 1/π ∫ [Re(ω) cos(ωt) - Im(ω) sin(ωt)] dω`, `[i][j][t]`
    pub f: Array3<f64>,
}

/// Cosine and sine transform matrices `[t][w]`, with quadrature weights and
/// the leading factor folded in so each kernel is a matrix-vector product.
struct TransformTables {
    cos: Array2<f64>,
    sin: Array2<f64>,
}

impl TransformTables {
    fn new(t: &[f64], quad: &Quadrature, factor: f64) -> Self {
        let shape = (t.len(), quad.points.len());
        let mut cos = Array2::<f64>::zeros(shape);
        let mut sin = Array2::<f64>::zeros(shape);
        Zip::from(cos.rows_mut())
            .and(sin.rows_mut())
            .and(t)
            .for_each(|mut cos_t, mut sin_t, &ti| {
                cos_t.assign(&Array1::from(quad.weighted_by(|w| factor * (w * ti).cos())));
                sin_t.assign(&Array1::from(quad.weighted_by(|w| factor * (w * ti).sin())));
            });
        Self { cos, sin }
    }
}

/// Computes K and L for every (i, j) radiation damping entry.
///
/// `rd` is sampled on `w` (either direction) and is resampled onto `n_w`
/// uniform frequencies before integrating.
pub fn radiation_irf(
    w: &[f64],
    rd: ArrayView3<f64>,
    t_end: f64,
    n_t: usize,
    n_w: usize,
) -> BemResult<RadiationIrf> {
    let t = linspace(0., t_end, n_t);
    let w_u = uniform_grid(w, n_w)?;
    let rd_u = interpolate_coefficients(w, rd, &w_u)?;
    let quad = Quadrature::trapezoidal(&w_u)?;
    let tables = TransformTables::new(&t, &quad, 2. / PI);

    let (ni, nj, _) = rd_u.dim();
    let mut k = Array3::<f64>::zeros((ni, nj, n_t));
    let mut l = Array3::<f64>::zeros((ni, nj, n_t));

    let progress = Progress::new("radiation damping impulse response function", n_t * ni * nj);
    Zip::from(k.lanes_mut(Axis(2)))
        .and(l.lanes_mut(Axis(2)))
        .and(rd_u.lanes(Axis(2)))
        .par_for_each(|mut k_ij, mut l_ij, rd_ij| {
            k_ij.assign(&tables.cos.dot(&rd_ij));
            l_ij.assign(&tables.sin.dot(&rd_ij));
            progress.add(n_t);
        });
    progress.finish();

    Ok(RadiationIrf { t, w: w_u, k, l })
}

/// Computes the two-sided excitation force kernel for every (i, j) entry.
pub fn excitation_irf(
    w: &[f64],
    re: ArrayView3<f64>,
    im: ArrayView3<f64>,
    t_length: f64,
    n_t: usize,
    n_w: usize,
) -> BemResult<ExcitationIrf> {
    if re.shape() != im.shape() {
        return Err(BemError::ShapeMismatch {
            what: "excitation imaginary part",
            expected: re.shape().to_vec(),
            got: im.shape().to_vec(),
        });
    }
    let t = linspace(-t_length, t_length, n_t);
    let w_u = uniform_grid(w, n_w)?;
    let re_u = interpolate_coefficients(w, re, &w_u)?;
    let im_u = interpolate_coefficients(w, im, &w_u)?;
    let quad = Quadrature::trapezoidal(&w_u)?;
    let tables = TransformTables::new(&t, &quad, 1. / PI);

    let (ni, nj, _) = re_u.dim();
    let mut f = Array3::<f64>::zeros((ni, nj, n_t));

    let progress = Progress::new("excitation force impulse response function", n_t * ni * nj);
    Zip::from(f.lanes_mut(Axis(2)))
        .and(re_u.lanes(Axis(2)))
        .and(im_u.lanes(Axis(2)))
        .par_for_each(|mut f_ij, re_ij, im_ij| {
            f_ij.assign(&(tables.cos.dot(&re_ij) - tables.sin.dot(&im_ij)));
            progress.add(n_t);
        });
    progress.finish();

    Ok(ExcitationIrf { t, w: w_u, f })
}

impl HydrodynamicData {
    /// Populates `rd.irf` from `rd.all`.
    pub fn calc_irf_radiation(&mut self, p: &RadiationIrfParameters) -> BemResult<()> {
        p.validate()?;
        let rd = self.rd.all()?;
        self.check_radiation_shape("rd.all", rd)?;
        info!(
            "Calculating the radiation damping impulse response function for {}",
            self.name()
        );
        let irf = radiation_irf(self.w()?, rd.view(), p.t_end, p.n_t, p.n_w)?;
        self.rd.irf = Some(irf);
        Ok(())
    }

    /// Populates `ex.irf` from the excitation coefficients.
    pub fn calc_irf_excitation(&mut self, p: &ExcitationIrfParameters) -> BemResult<()> {
        p.validate()?;
        info!(
            "Calculating the excitation force impulse response function for {}",
            self.name()
        );
        let irf = {
            let (re, im) = self.ex.re_im()?;
            excitation_irf(
                self.w()?,
                re.view(),
                im.view(),
                p.t_length,
                p.n_t,
                p.n_w,
            )?
        };
        self.ex.irf = Some(irf);
        Ok(())
    }
}
