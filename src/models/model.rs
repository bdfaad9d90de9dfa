//! Closed-form evaluation of the growth shapes.
//!
//! The fitter relies on two primitive operations:
//! - predict `y(t)` given shape parameters (for residuals/plots)
//! - fill a gradient row `∂y/∂θ` at one time (for the Jacobian)
//!
//! With `r(z, b, s) ≈ b·max(z, 0)` the smoothed ramp from [`crate::math`]:
//!
//! | shape    | curve                                   |
//! |----------|-----------------------------------------|
//! | linear   | `a + b·t`                               |
//! | lag      | `a + r(t − B1, b)`                      |
//! | sat      | `a + b·t − r(t − B2, b)`                |
//! | flr      | `a + b·t − r(t − B2, b)` with `b < 0`   |
//! | lagsat   | `a + r(t − B1, b) − r(t − B2, b)`       |

use crate::domain::ShapeParams;
use crate::math::{ramp, ramp_db, ramp_dz};

/// Predict `y(t)` for the given parameters and smoothness constant.
pub fn predict(params: &ShapeParams, t: f64, s: f64) -> f64 {
    match *params {
        ShapeParams::Linear(p) => p.a + p.b * t,
        ShapeParams::Lag(p) => p.a + ramp(t - p.b1, p.b, s),
        ShapeParams::Saturating(p) => p.a + p.b * t - ramp(t - p.b2, p.b, s),
        ShapeParams::Floor(p) => p.a + p.b * t - ramp(t - p.b2, p.b, s),
        ShapeParams::LagSaturating(p) => p.a + ramp(t - p.b1, p.b, s) - ramp(t - p.b2, p.b, s),
    }
}

/// Predict at every time in `times`.
pub fn predict_all(params: &ShapeParams, times: &[f64], s: f64) -> Vec<f64> {
    times.iter().map(|&t| predict(params, t, s)).collect()
}

/// Fill the gradient row `∂y(t)/∂θ` in parameter-vector order.
///
/// # Panics
/// Panics if `out` is shorter than the shape's parameter count.
pub fn fill_gradient_row(params: &ShapeParams, t: f64, s: f64, out: &mut [f64]) {
    match *params {
        ShapeParams::Linear(_) => {
            out[0] = 1.0;
            out[1] = t;
        }
        ShapeParams::Lag(p) => {
            let z = t - p.b1;
            out[0] = 1.0;
            out[1] = ramp_db(z, p.b, s);
            out[2] = -ramp_dz(z, p.b, s);
        }
        ShapeParams::Saturating(p) => {
            let z = t - p.b2;
            out[0] = 1.0;
            out[1] = t - ramp_db(z, p.b, s);
            out[2] = ramp_dz(z, p.b, s);
        }
        ShapeParams::Floor(p) => {
            let z = t - p.b2;
            out[0] = 1.0;
            out[1] = t - ramp_db(z, p.b, s);
            out[2] = ramp_dz(z, p.b, s);
        }
        ShapeParams::LagSaturating(p) => {
            let z1 = t - p.b1;
            let z2 = t - p.b2;
            out[0] = 1.0;
            out[1] = ramp_db(z1, p.b, s) - ramp_db(z2, p.b, s);
            out[2] = -ramp_dz(z1, p.b, s);
            out[3] = ramp_dz(z2, p.b, s);
        }
    }
}
