//! Mathematical utilities: smoothed hinge primitives and least squares helpers.

pub mod hinge;
pub mod ols;

pub use hinge::*;
pub use ols::*;
