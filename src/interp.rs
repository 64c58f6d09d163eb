use ndarray::{s, Array3, ArrayView1, ArrayView3, ArrayViewMut1, Axis, Zip};

use crate::error::{BemError, BemResult};
use crate::util::linspace;

/// Returns the grid in strictly ascending order and whether it was reversed.
pub fn normalize_grid(w: &[f64]) -> BemResult<(Vec<f64>, bool)> {
    if w.len() < 2 {
        return Err(BemError::InsufficientData {
            needed: 2,
            got: w.len(),
        });
    }
    let reversed = w[0] > w[1];
    let ascending = if reversed {
        w.iter().rev().copied().collect::<Vec<_>>()
    } else {
        w.to_vec()
    };
    if let Some(i) = ascending.windows(2).position(|p| !(p[1] > p[0])) {
        let index = if reversed { w.len() - 2 - i } else { i + 1 };
        return Err(BemError::NonMonotonicGrid { index });
    }
    Ok((ascending, reversed))
}

/// Uniform grid of `n` points spanning exactly `[min(w), max(w)]`.
pub fn uniform_grid(w: &[f64], n: usize) -> BemResult<Vec<f64>> {
    let (w_asc, _) = normalize_grid(w)?;
    Ok(linspace(w_asc[0], w_asc[w_asc.len() - 1], n))
}

//------------------------------------------------------------------------------
// Piecewise-linear interpolation
//------------------------------------------------------------------------------

/// Bracketing indices and weights for resampling an ascending grid onto a
/// set of target points. Built once and applied to every (i, j) lane.
#[derive(Debug, Clone)]
pub struct LinearInterp {
    n_src: usize,
    lower: Vec<usize>,
    frac: Vec<f64>,
}

impl LinearInterp {
    /// `x` must be strictly ascending; every target must lie in `[x[0], x[n-1]]`.
    pub fn new(x: &[f64], x_new: &[f64]) -> BemResult<Self> {
        let n = x.len();
        if n < 2 {
            return Err(BemError::InsufficientData { needed: 2, got: n });
        }
        let (min, max) = (x[0], x[n - 1]);
        let mut lower = Vec::with_capacity(x_new.len());
        let mut frac = Vec::with_capacity(x_new.len());
        for &v in x_new {
            if !(v >= min && v <= max) {
                return Err(BemError::OutOfBounds { value: v, min, max });
            }
            // First index with x > v; v >= x[0] so it is at least 1
            let k = x.partition_point(|&xi| xi <= v);
            if k == n {
                lower.push(n - 1);
                frac.push(0.);
            } else {
                let l = k - 1;
                lower.push(l);
                frac.push((v - x[l]) / (x[k] - x[l]));
            }
        }
        Ok(Self {
            n_src: n,
            lower,
            frac,
        })
    }

    /// Interpolates samples `y` into `out`.
    ///
    /// # Panics
    /// Panics if `y.len()` differs from the source grid length or
    /// `out.len()` from the number of targets.
    pub fn apply_into(&self, y: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) {
        assert_eq!(y.len(), self.n_src);
        assert_eq!(out.len(), self.lower.len());
        self.lower
            .iter()
            .zip(self.frac.iter())
            .zip(out.iter_mut())
            .for_each(|((&l, &f), o)| {
                *o = if f == 0. {
                    y[l]
                } else {
                    y[l] + f * (y[l + 1] - y[l])
                };
            });
    }

    pub fn apply(&self, y: &[f64]) -> Vec<f64> {
        let mut out = ndarray::Array1::<f64>::zeros(self.lower.len());
        self.apply_into(ArrayView1::from(y), out.view_mut());
        out.to_vec()
    }
}

/// Piecewise-linear interpolation of `y(x)` at `x_new`, `x` ascending.
pub fn interp1d(x: &[f64], y: &[f64], x_new: &[f64]) -> BemResult<Vec<f64>> {
    if x.len() != y.len() {
        return Err(BemError::ShapeMismatch {
            what: "interpolation samples",
            expected: vec![x.len()],
            got: vec![y.len()],
        });
    }
    Ok(LinearInterp::new(x, x_new)?.apply(y))
}

/// Resamples a `[i, j, frequency]` coefficient array from grid `w` (either
/// direction) onto the ascending grid `w_new`.
pub fn interpolate_coefficients(
    w: &[f64],
    coeffs: ArrayView3<f64>,
    w_new: &[f64],
) -> BemResult<Array3<f64>> {
    let (ni, nj, nw) = coeffs.dim();
    if nw != w.len() {
        return Err(BemError::ShapeMismatch {
            what: "coefficient frequency axis",
            expected: vec![ni, nj, w.len()],
            got: vec![ni, nj, nw],
        });
    }

    let (w_asc, reversed) = normalize_grid(w)?;
    let interp = LinearInterp::new(&w_asc, w_new)?;

    // Reverse coefficients along frequency to match the ascending grid
    let src = if reversed {
        coeffs.slice_move(s![.., .., ..;-1])
    } else {
        coeffs
    };

    let mut out = Array3::<f64>::zeros((ni, nj, w_new.len()));
    Zip::from(out.lanes_mut(Axis(2)))
        .and(src.lanes(Axis(2)))
        .par_for_each(|o, y| interp.apply_into(y, o));
    Ok(out)
}

#[cfg(test)]
mod tests {

    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr1, Array1};

    fn sample_coeffs(w: &[f64]) -> Array3<f64> {
        Array3::from_shape_fn((2, 3, w.len()), |(i, j, k)| {
            (i as f64 + 1.) * w[k].sin() + (j as f64) * w[k] * w[k]
        })
    }

    #[test]
    fn test_normalize_grid() {
        let (w, rev) = normalize_grid(&[0.1, 0.2, 0.4]).unwrap();
        assert_eq!(w, vec![0.1, 0.2, 0.4]);
        assert!(!rev);

        let (w, rev) = normalize_grid(&[0.4, 0.2, 0.1]).unwrap();
        assert_eq!(w, vec![0.1, 0.2, 0.4]);
        assert!(rev);
    }

    #[test]
    fn test_normalize_grid_errors() {
        assert!(matches!(
            normalize_grid(&[1.]),
            Err(BemError::InsufficientData { needed: 2, got: 1 })
        ));
        assert!(matches!(
            normalize_grid(&[0.1, 0.2, 0.2, 0.3]),
            Err(BemError::NonMonotonicGrid { index: 2 })
        ));
        assert!(matches!(
            normalize_grid(&[0.3, 0.2, 0.25]),
            Err(BemError::NonMonotonicGrid { .. })
        ));
    }

    #[test]
    fn test_uniform_grid_bounds() {
        let w = [2.3, 1.7, 0.9, 0.35];
        let g = uniform_grid(&w, 101).unwrap();
        assert_eq!(g.len(), 101);
        assert_eq!(g[0], 0.35);
        assert_eq!(g[100], 2.3);
    }

    #[test]
    fn test_interp1d() {
        let x = [0., 1., 3.];
        let y = [1., 3., -1.];
        let v = interp1d(&x, &y, &[0., 0.5, 1., 2., 3.]).unwrap();
        assert_relative_eq!(arr1(&v), arr1(&[1., 2., 3., 1., -1.]), epsilon = 1e-15);
    }

    #[test]
    fn test_interp1d_errors() {
        assert!(matches!(
            interp1d(&[0.], &[1.], &[0.]),
            Err(BemError::InsufficientData { .. })
        ));
        assert!(matches!(
            interp1d(&[0., 1.], &[1., 2.], &[1.5]),
            Err(BemError::OutOfBounds { .. })
        ));
        assert!(matches!(
            interp1d(&[0., 1.], &[1.], &[0.5]),
            Err(BemError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_round_trip() {
        let w = [0.05, 0.2, 0.31, 0.8, 1.1, 2.5];
        let c = sample_coeffs(&w);
        let r = interpolate_coefficients(&w, c.view(), &w).unwrap();
        assert_eq!(r, c);
    }

    #[test]
    fn test_descending_matches_ascending() {
        let w_asc = Array1::linspace(0.1, 3., 40).to_vec();
        let w_desc = w_asc.iter().rev().copied().collect::<Vec<_>>();
        let c_asc = sample_coeffs(&w_asc);
        let mut c_desc = c_asc.clone();
        c_desc.invert_axis(Axis(2));

        let w_new = uniform_grid(&w_desc, 97).unwrap();
        let r_asc = interpolate_coefficients(&w_asc, c_asc.view(), &w_new).unwrap();
        let r_desc = interpolate_coefficients(&w_desc, c_desc.view(), &w_new).unwrap();
        assert_relative_eq!(r_asc, r_desc, epsilon = 1e-15);
    }

    #[test]
    fn test_linear_data_is_exact() {
        let w = [0.5, 0.25, 0.1];
        let c = Array3::from_shape_fn((1, 1, 3), |(_, _, k)| 2. * w[k] - 1.);
        let w_new = uniform_grid(&w, 9).unwrap();
        let r = interpolate_coefficients(&w, c.view(), &w_new).unwrap();
        w_new.iter().enumerate().for_each(|(k, &wk)| {
            assert_relative_eq!(r[[0, 0, k]], 2. * wk - 1., epsilon = 1e-14);
        });
    }

    #[test]
    fn test_shape_mismatch() {
        let c = Array3::<f64>::zeros((1, 1, 4));
        assert!(matches!(
            interpolate_coefficients(&[0., 1., 2.], c.view(), &[0.5]),
            Err(BemError::ShapeMismatch { .. })
        ));
    }
}
