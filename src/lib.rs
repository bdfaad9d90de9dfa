//! `growth-curves` library crate.
//!
//! Estimates exponential growth rates from log-abundance time series by
//! fitting segmented (lag / growth / saturation) curves and selecting the best
//! shape by information criterion.
//!
//! The binary (`gcurve`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the estimator can be embedded in other pipelines

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;

pub use domain::{Criterion, GrowthOptions, GrowthShape, parse_shape_names};
pub use error::GrowthError;
pub use fit::{estimate_growth_rate, estimate_growth_rate_named};
pub use report::GrowthReport;
