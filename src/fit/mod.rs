//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - bounded Levenberg–Marquardt solver (`nls`)
//! - starting strategies per shape (`start`)
//! - fit one shape with retries (`fitter`)
//! - demote fits without exponential support (`qualify`)
//! - rank survivors by information criterion (`selection`)
//! - run the whole estimation for one series (`estimate`)

pub mod estimate;
pub mod fitter;
pub mod nls;
pub mod qualify;
pub mod selection;
pub mod start;

pub use estimate::*;
pub use fitter::*;
pub use qualify::*;
pub use selection::*;
