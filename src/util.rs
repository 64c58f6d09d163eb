use faer::prelude::*;

// Returns the L2-norm of a vector
#[inline]
pub fn norm(v: &[f64]) -> f64 {
    v.iter().map(|&f| f * f).sum::<f64>().sqrt()
}

// Returns the arithmetic mean of a vector, zero if empty
#[inline]
pub fn mean(v: &[f64]) -> f64 {
    if v.is_empty() {
        0.
    } else {
        v.iter().sum::<f64>() / (v.len() as f64)
    }
}

// Returns the L2-norm of the difference of two vectors
#[inline]
pub fn norm_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Returns `n` evenly spaced samples over `[start, end]`.
///
/// The last sample is exactly `end` so grids built from the extrema of
/// another grid never step outside it.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (end - start) / ((n - 1) as f64);
            let mut v = (0..n).map(|i| start + step * (i as f64)).collect::<Vec<_>>();
            v[n - 1] = end;
            v
        }
    }
}

/// Square Hankel matrix whose first column is `c` and whose entries below
/// the anti-diagonal are zero, `h[(i, j)] = c[i + j]`.
pub fn hankel(c: &[f64]) -> Mat<f64> {
    let n = c.len();
    Mat::<f64>::from_fn(n, n, |i, j| if i + j < n { c[i + j] } else { 0. })
}

/// Maximum absolute row sum
#[inline]
pub fn norm_inf(m: MatRef<f64>) -> f64 {
    (0..m.nrows())
        .map(|i| (0..m.ncols()).map(|j| m[(i, j)].abs()).sum::<f64>())
        .fold(0., f64::max)
}

/// Matrix exponential by scaling and squaring with a diagonal Padé
/// approximant of degree 6 (Golub & Van Loan, Algorithm 11.3.1).
///
/// # Panics
/// Panics if `a` is not square.
pub fn expm(a: MatRef<f64>) -> Mat<f64> {
    assert_eq!(a.nrows(), a.ncols(), "expm requires a square matrix");
    const Q: usize = 6;
    let n = a.nrows();

    // Scale so that ||A / 2^s|| < 1/2
    let nrm = norm_inf(a);
    let s = if nrm > 0. {
        (nrm.log2().floor() as i32 + 2).max(0)
    } else {
        0
    };
    let scale = 0.5_f64.powi(s);
    let a = Mat::<f64>::from_fn(n, n, |i, j| a[(i, j)] * scale);

    let eye = |i: usize, j: usize| if i == j { 1. } else { 0. };
    let mut c = 0.5;
    let mut x = a.clone();
    let mut num = Mat::<f64>::from_fn(n, n, |i, j| eye(i, j) + c * a[(i, j)]);
    let mut den = Mat::<f64>::from_fn(n, n, |i, j| eye(i, j) - c * a[(i, j)]);
    for k in 2..=Q {
        c *= ((Q - k + 1) as f64) / ((k * (2 * Q - k + 1)) as f64);
        x = &a * &x;
        let sign = if k % 2 == 0 { 1. } else { -1. };
        num = Mat::<f64>::from_fn(n, n, |i, j| num[(i, j)] + c * x[(i, j)]);
        den = Mat::<f64>::from_fn(n, n, |i, j| den[(i, j)] + sign * c * x[(i, j)]);
    }

    // F = D^-1 N, then undo the scaling by repeated squaring
    let lu = den.partial_piv_lu();
    let mut f = lu.solve(num.as_ref());
    for _ in 0..s {
        f = &f * &f;
    }
    f
}
