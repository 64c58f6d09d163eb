use itertools::Itertools;

use crate::error::{BemError, BemResult};

/// Quadrature rule over a physical grid: `∫ f dx ≈ Σ weights[k] · f(points[k])`.
#[derive(Clone, Debug)]
pub struct Quadrature {
    pub points: Vec<f64>,
    pub weights: Vec<f64>,
}

impl Quadrature {
    /// Composite trapezoidal rule on the (possibly non-uniform) grid `s`.
    ///
    /// Weights carry the sign of the grid direction, matching the
    /// orientation of the integral.
    pub fn trapezoidal(s: &[f64]) -> BemResult<Self> {
        let n = s.len();
        if n < 2 {
            return Err(BemError::InsufficientData { needed: 2, got: n });
        }

        // Calculate weights
        let mut weights = vec![0.; n];
        weights[0] = (s[1] - s[0]) / 2.;
        for i in 1..n - 1 {
            weights[i] = (s[i + 1] - s[i - 1]) / 2.;
        }
        weights[n - 1] = (s[n - 1] - s[n - 2]) / 2.;

        Ok(Self {
            points: s.to_vec(),
            weights,
        })
    }

    /// Integrates `f` evaluated at the quadrature points.
    pub fn integrate<F: Fn(f64) -> f64>(&self, f: F) -> f64 {
        self.points
            .iter()
            .zip(self.weights.iter())
            .map(|(&x, &w)| w * f(x))
            .sum()
    }

    /// Weights pre-multiplied by `g(point)`, for reusing one kernel factor
    /// across many integrands.
    pub fn weighted_by<F: Fn(f64) -> f64>(&self, g: F) -> Vec<f64> {
        self.points
            .iter()
            .zip(self.weights.iter())
            .map(|(&x, &w)| w * g(x))
            .collect_vec()
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::util::linspace;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_trapezoidal_weights() {
        let q = Quadrature::trapezoidal(&[0., 1., 3.]).unwrap();
        assert_eq!(q.weights, vec![0.5, 1.5, 1.]);
        assert_eq!(q.points, vec![0., 1., 3.]);
    }

    #[test]
    fn test_trapezoidal_linear_exact() {
        let q = Quadrature::trapezoidal(&[0., 0.3, 1.1, 2.]).unwrap();
        assert_relative_eq!(q.integrate(|x| 3. * x + 1.), 8., epsilon = 1e-14);
    }

    #[test]
    fn test_trapezoidal_sine() {
        let q = Quadrature::trapezoidal(&linspace(0., PI, 2001)).unwrap();
        assert_relative_eq!(q.integrate(f64::sin), 2., epsilon = 1e-6);
    }

    #[test]
    fn test_weighted_by() {
        let q = Quadrature::trapezoidal(&[0., 1., 3.]).unwrap();
        let w = q.weighted_by(|x| x + 1.);
        assert_eq!(w, vec![0.5, 3., 4.]);

        // Dotting the weighted row with samples integrates their product
        let y = [2., -1., 0.5];
        let s = w.iter().zip(y.iter()).map(|(a, b)| a * b).sum::<f64>();
        assert_relative_eq!(s, 0.5 * 2. - 3. + 2.);
    }

    #[test]
    fn test_descending_grid_flips_sign() {
        let q = Quadrature::trapezoidal(&[2., 1., 0.]).unwrap();
        assert_relative_eq!(q.integrate(|x| x), -2.);
    }

    #[test]
    fn test_insufficient_points() {
        assert!(matches!(
            Quadrature::trapezoidal(&[1.]),
            Err(BemError::InsufficientData { needed: 2, got: 1 })
        ));
    }
}
