//! Smoothed hinge primitives for the piecewise growth shapes.
//!
//! The primitive is
//!
//! - `h(z, b, s) = ½·sqrt(b·(4s + b·z²))` for `b ≥ 0`
//!
//! which behaves like `½·b·|z|` away from `z = 0` but is differentiable at the
//! corner. From it we build a signed ramp
//!
//! - `r(z, b, s) = b·z/2 + sign(b)·h(z, |b|, s) ≈ b·max(z, 0)`
//!
//! Numerical notes:
//! - As `s → 0⁺` the ramp converges to the exact corner; the width of the
//!   rounded region is of order `sqrt(s/|b|)`.
//! - Derivatives are analytic. `G = sqrt(|b|·(4s + |b|·z²))` is strictly
//!   positive for `s > 0` and `b ≠ 0`, which the fitter guarantees through the
//!   slope bounds.

/// Smoothed hinge `½·sqrt(b·(4s + b·z²))`, defined for `b ≥ 0` and `s > 0`.
pub fn hinge(z: f64, b: f64, s: f64) -> f64 {
    0.5 * (b * (4.0 * s + b * z * z)).sqrt()
}

/// Smooth approximation of `b·max(z, 0)` for either sign of `b`.
pub fn ramp(z: f64, b: f64, s: f64) -> f64 {
    let q = b.abs();
    0.5 * b * z + b.signum() * hinge(z, q, s)
}

/// `∂r/∂z`.
pub fn ramp_dz(z: f64, b: f64, s: f64) -> f64 {
    let q = b.abs();
    let g = (q * (4.0 * s + q * z * z)).sqrt();
    if g <= 0.0 {
        return 0.5 * b;
    }
    0.5 * b + b.signum() * q * q * z / (2.0 * g)
}

/// `∂r/∂b` (identical for both signs of `b`).
pub fn ramp_db(z: f64, b: f64, s: f64) -> f64 {
    let q = b.abs();
    let g = (q * (4.0 * s + q * z * z)).sqrt();
    if g <= 0.0 {
        return 0.5 * z;
    }
    0.5 * z + (2.0 * s + q * z * z) / (2.0 * g)
}
