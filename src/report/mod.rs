//! Growth-rate report: the winning fit plus everything that was attempted.

pub mod format;

use serde::Serialize;

use crate::domain::{
    Criterion, Diagnostic, FitOutcome, FittedModel, GrowthShape, ModelSet, SegmentDiagnostics,
    ShapeParams, TimeSeries,
};
use crate::error::GrowthError;
use crate::fit::selection::{ModelScore, Selection};
use crate::math::r_squared;

pub use format::*;

/// Result of one growth-rate estimation.
///
/// A *missing* report (no shape chosen, NaN slope) is returned for degenerate
/// input; its diagnostics say why.
#[derive(Debug, Clone, Serialize)]
pub struct GrowthReport {
    pub label: Option<String>,
    pub criterion: Criterion,
    /// Winning shape, `None` for a missing report.
    pub shape: Option<GrowthShape>,
    pub params: Option<ShapeParams>,
    /// Exponential growth rate (slope of the log-abundance).
    pub slope: f64,
    pub slope_se: f64,
    /// Overall R² of the winning fit.
    pub r2: f64,
    pub segments: Option<SegmentDiagnostics>,
    /// Surviving fits, best first.
    pub ranking: Vec<ModelScore>,
    /// Every attempted shape with its outcome.
    pub outcomes: ModelSet,
    pub diagnostics: Vec<Diagnostic>,
    /// The cleaned series the fits were computed on.
    pub series: TimeSeries,
}

impl GrowthReport {
    pub fn missing(
        label: Option<String>,
        criterion: Criterion,
        series: TimeSeries,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        Self {
            label,
            criterion,
            shape: None,
            params: None,
            slope: f64::NAN,
            slope_se: f64::NAN,
            r2: f64::NAN,
            segments: None,
            ranking: Vec::new(),
            outcomes: ModelSet::new(),
            diagnostics,
            series,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.shape.is_none()
    }

    /// The winning fit, if any.
    pub fn best_fit(&self) -> Option<&FittedModel> {
        self.shape
            .and_then(|shape| self.outcomes.get(&shape))
            .and_then(FitOutcome::fit)
    }

    pub fn n_obs(&self) -> usize {
        self.series.len()
    }
}

/// Outcome of one group in a batch run.
#[derive(Debug)]
pub struct GroupResult {
    pub name: Option<String>,
    pub result: Result<GrowthReport, GrowthError>,
}

/// Assemble the report for the selected shape.
pub fn build_report(
    label: Option<String>,
    series: TimeSeries,
    outcomes: ModelSet,
    selection: Selection,
    diagnostics: Vec<Diagnostic>,
) -> GrowthReport {
    let best = selection.best();
    let (params, slope, slope_se, r2, segments) = match outcomes.get(&best) {
        Some(FitOutcome::Success { fit, segments }) => (
            Some(fit.params),
            fit.params.slope(),
            fit.slope_se(),
            r_squared(&fit.fitted, &series.values),
            Some(*segments),
        ),
        _ => (None, f64::NAN, f64::NAN, f64::NAN, None),
    };

    GrowthReport {
        label,
        criterion: selection.criterion,
        shape: params.map(|p| p.shape()),
        params,
        slope,
        slope_se,
        r2,
        segments,
        ranking: selection.ranking,
        outcomes,
        diagnostics,
        series,
    }
}
