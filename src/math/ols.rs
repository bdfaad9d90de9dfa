//! Least squares helpers.
//!
//! Two kinds of problems are solved here:
//!
//! - small dense linear systems `X β ≈ y` (the global line behind the
//!   starting values, damped normal equations that Cholesky could not factor)
//! - closed-form simple regressions `y = a + b·t` over sliding windows
//!
//! Implementation choices:
//! - Dense solves go through SVD so tall or rank-deficient matrices are handled
//!   without panicking. (Nalgebra's `QR::solve` is intended for square systems.)
//! - Parameter dimensions are tiny (2–4 columns), so SVD cost is irrelevant.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Ordinary least squares line `y = intercept + slope·t`, solved by SVD on the
/// design matrix `[1, t]`.
///
/// Returns `None` for fewer than two points or zero time variance.
pub fn ols_line(t: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = t.len().min(y.len());
    if n < 2 || t[..n].iter().all(|&v| v == t[0]) {
        return None;
    }
    let x = DMatrix::from_fn(n, 2, |i, j| if j == 0 { 1.0 } else { t[i] });
    let beta = solve_least_squares(&x, &DVector::from_column_slice(&y[..n]))?;
    Some((beta[0], beta[1]))
}

/// Closed-form ordinary least squares line `y = intercept + slope·t`.
///
/// Returns `None` for fewer than two points or zero time variance.
pub fn simple_regression(t: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = t.len().min(y.len());
    if n < 2 {
        return None;
    }
    let n_f = n as f64;
    let t_bar = t[..n].iter().sum::<f64>() / n_f;
    let y_bar = y[..n].iter().sum::<f64>() / n_f;

    let mut cov = 0.0;
    let mut var = 0.0;
    for i in 0..n {
        let dt = t[i] - t_bar;
        cov += dt * (y[i] - y_bar);
        var += dt * dt;
    }
    if var <= 1e-18 || !cov.is_finite() {
        return None;
    }
    let slope = cov / var;
    Some((y_bar - slope * t_bar, slope))
}

/// Slopes of ordinary least squares lines over consecutive windows of `width`
/// observations (a sliding local rate-of-change estimate).
///
/// Windows with no time variance (all-duplicate times) are skipped.
pub fn sliding_slopes(t: &[f64], y: &[f64], width: usize) -> Vec<f64> {
    let n = t.len().min(y.len());
    if width < 2 || n < width {
        return Vec::new();
    }
    (0..=n - width)
        .filter_map(|i| simple_regression(&t[i..i + width], &y[i..i + width]))
        .map(|(_, slope)| slope)
        .collect()
}

/// Coefficient of determination `1 − SS_res / SS_tot` of `pred` against `obs`.
///
/// Returns NaN when the inputs are empty, differ in length, or `obs` is
/// constant (`SS_tot = 0`). Callers treat NaN as "undefined", not as an error.
pub fn r_squared(pred: &[f64], obs: &[f64]) -> f64 {
    if obs.is_empty() || pred.len() != obs.len() {
        return f64::NAN;
    }
    let mean = obs.iter().sum::<f64>() / obs.len() as f64;
    let ss_tot: f64 = obs.iter().map(|y| (y - mean) * (y - mean)).sum();
    if ss_tot == 0.0 {
        return f64::NAN;
    }
    let ss_res: f64 = pred
        .iter()
        .zip(obs.iter())
        .map(|(p, y)| (y - p) * (y - p))
        .sum();
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn ols_line_matches_closed_form() {
        let t = [0.0, 1.0, 1.0, 3.0, 7.0];
        let y = [0.9, 2.1, 1.8, 4.2, 8.1];
        let (a, b) = ols_line(&t, &y).unwrap();
        let (a2, b2) = simple_regression(&t, &y).unwrap();
        assert!((a - a2).abs() < 1e-10);
        assert!((b - b2).abs() < 1e-10);
        assert!(ols_line(&[2.0, 2.0], &[1.0, 3.0]).is_none());
        assert!(ols_line(&[2.0], &[1.0]).is_none());
    }

    #[test]
    fn simple_regression_recovers_line() {
        let t = [0.0, 1.0, 2.0, 3.0];
        let y: Vec<f64> = t.iter().map(|v| 1.5 - 0.25 * v).collect();
        let (a, b) = simple_regression(&t, &y).unwrap();
        assert!((a - 1.5).abs() < 1e-12);
        assert!((b + 0.25).abs() < 1e-12);
        assert!(simple_regression(&[2.0, 2.0], &[1.0, 3.0]).is_none());
    }

    #[test]
    fn sliding_slopes_skip_flat_windows() {
        let t = [0.0, 0.0, 0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 1.0, 1.0, 2.0, 4.0, 6.0];
        let slopes = sliding_slopes(&t, &y, 3);
        // First window has all-equal times and is skipped.
        assert_eq!(slopes.len(), 3);
        let max = slopes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert!((max - 2.0).abs() < 1e-12);
    }

    #[test]
    fn r_squared_handles_degenerate_cases() {
        assert_eq!(r_squared(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]), 1.0);
        assert!(r_squared(&[1.0, 1.0], &[2.0, 2.0]).is_nan());
        assert!(r_squared(&[], &[]).is_nan());
        assert!(r_squared(&[1.0], &[1.0, 2.0]).is_nan());
        let r2 = r_squared(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]);
        assert!(r2.abs() < 1e-12);
    }
}
