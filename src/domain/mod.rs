//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - growth shapes and their parameter structs (`GrowthShape`, `ShapeParams`)
//! - cleaned input series (`TimeSeries`)
//! - fit outcomes (`FittedModel`, `FitFailure`, `FitOutcome`, `ModelSet`)
//! - run options (`GrowthOptions`, `NlsControl`)
//! - the diagnostic channel (`DiagnosticLog`)

pub mod diagnostics;
pub mod types;

pub use diagnostics::*;
pub use types::*;
