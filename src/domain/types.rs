//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - inspected after the fact (every attempted fit is kept for auditing)

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::ValueEnum;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::GrowthError;

/// Smoothness constant used by the hinge approximation unless overridden.
pub const DEFAULT_SMOOTHNESS: f64 = 1e-10;

/// Minimum number of observations inside the exponential segment.
pub const DEFAULT_MIN_EXP_OBS: usize = 3;

/// Time margin added on each side of the exponential segment so that
/// observations sitting on a breakpoint are counted.
pub const DEFAULT_INCLUSION_MARGIN: f64 = 0.1;

/// Breakpoint used by the second starting strategy of `lag` and `sat`.
pub const DEFAULT_FALLBACK_BREAKPOINT: f64 = 10.0;

/// Slopes of the constrained shapes are kept at least this far from zero.
pub const SLOPE_EPS: f64 = 1e-10;

/// Growth curve shape.
///
/// The derived ordering is the canonical shape order; model tables are built in
/// this order, which makes ties resolve the same way regardless of how the
/// shapes were requested.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
pub enum GrowthShape {
    /// Straight line across the whole series.
    #[serde(rename = "linear")]
    #[value(name = "linear")]
    Linear,
    /// Flat lag phase, then exponential growth.
    #[serde(rename = "lag")]
    #[value(name = "lag")]
    Lag,
    /// Exponential growth, then saturation.
    #[serde(rename = "sat")]
    #[value(name = "sat", alias = "saturating")]
    Saturating,
    /// Exponential decline, then a floor.
    #[serde(rename = "flr")]
    #[value(name = "flr", alias = "floor")]
    Floor,
    /// Lag, growth, then saturation.
    #[serde(rename = "lagsat")]
    #[value(name = "lagsat", alias = "lag-sat")]
    LagSaturating,
}

impl GrowthShape {
    pub const ALL: [GrowthShape; 5] = [
        GrowthShape::Linear,
        GrowthShape::Lag,
        GrowthShape::Saturating,
        GrowthShape::Floor,
        GrowthShape::LagSaturating,
    ];

    /// Short machine name (matches CLI/serde spelling).
    pub fn name(self) -> &'static str {
        match self {
            GrowthShape::Linear => "linear",
            GrowthShape::Lag => "lag",
            GrowthShape::Saturating => "sat",
            GrowthShape::Floor => "flr",
            GrowthShape::LagSaturating => "lagsat",
        }
    }

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            GrowthShape::Linear => "Linear",
            GrowthShape::Lag => "Lag",
            GrowthShape::Saturating => "Saturating",
            GrowthShape::Floor => "Floor",
            GrowthShape::LagSaturating => "Lag+Saturating",
        }
    }

    /// Parameter names in vector order. The slope is always at index 1.
    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            GrowthShape::Linear => &["a", "b"],
            GrowthShape::Lag => &["a", "b", "B1"],
            GrowthShape::Saturating | GrowthShape::Floor => &["a", "b", "B2"],
            GrowthShape::LagSaturating => &["a", "b", "B1", "B2"],
        }
    }

    /// Number of estimated curve parameters.
    pub fn param_count(self) -> usize {
        self.param_names().len()
    }

    /// Box bounds `(lower, upper)` for each parameter, in vector order.
    pub fn bounds(self) -> Vec<(f64, f64)> {
        let free = (f64::NEG_INFINITY, f64::INFINITY);
        let growing = (SLOPE_EPS, f64::INFINITY);
        let declining = (f64::NEG_INFINITY, -SLOPE_EPS);
        match self {
            GrowthShape::Linear => vec![free, free],
            GrowthShape::Lag | GrowthShape::Saturating => vec![free, growing, free],
            GrowthShape::Floor => vec![free, declining, free],
            GrowthShape::LagSaturating => vec![free, growing, free, free],
        }
    }
}

impl fmt::Display for GrowthShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GrowthShape {
    type Err = GrowthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" | "lin" => Ok(GrowthShape::Linear),
            "lag" => Ok(GrowthShape::Lag),
            "sat" | "saturating" => Ok(GrowthShape::Saturating),
            "flr" | "floor" => Ok(GrowthShape::Floor),
            "lagsat" | "lag-sat" | "lag_sat" | "lagsaturating" => Ok(GrowthShape::LagSaturating),
            other => Err(GrowthError::InvalidInput(format!(
                "Unknown growth shape '{other}'."
            ))),
        }
    }
}

/// Information criterion used to rank candidate shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    /// Small-sample corrected AIC.
    Aicc,
    Aic,
    Bic,
}

impl Criterion {
    pub fn display_name(self) -> &'static str {
        match self {
            Criterion::Aicc => "AICc",
            Criterion::Aic => "AIC",
            Criterion::Bic => "BIC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearParams {
    pub a: f64,
    pub b: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LagParams {
    /// Pre-lag level.
    pub a: f64,
    /// Post-lag slope.
    pub b: f64,
    /// End of the lag phase.
    pub b1: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SaturatingParams {
    /// Intercept at `t = 0`.
    pub a: f64,
    pub b: f64,
    /// Onset of saturation.
    pub b2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloorParams {
    /// Intercept at `t = 0`.
    pub a: f64,
    /// Decline rate (negative).
    pub b: f64,
    /// Onset of the floor.
    pub b2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LagSaturatingParams {
    pub a: f64,
    pub b: f64,
    pub b1: f64,
    pub b2: f64,
}

/// Shape-tagged curve parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape")]
pub enum ShapeParams {
    #[serde(rename = "linear")]
    Linear(LinearParams),
    #[serde(rename = "lag")]
    Lag(LagParams),
    #[serde(rename = "sat")]
    Saturating(SaturatingParams),
    #[serde(rename = "flr")]
    Floor(FloorParams),
    #[serde(rename = "lagsat")]
    LagSaturating(LagSaturatingParams),
}

impl ShapeParams {
    pub fn shape(&self) -> GrowthShape {
        match self {
            ShapeParams::Linear(_) => GrowthShape::Linear,
            ShapeParams::Lag(_) => GrowthShape::Lag,
            ShapeParams::Saturating(_) => GrowthShape::Saturating,
            ShapeParams::Floor(_) => GrowthShape::Floor,
            ShapeParams::LagSaturating(_) => GrowthShape::LagSaturating,
        }
    }

    /// Rebuild parameters from a vector in `GrowthShape::param_names` order.
    ///
    /// # Panics
    /// Panics if `values` is shorter than `shape.param_count()`.
    pub fn from_slice(shape: GrowthShape, values: &[f64]) -> Self {
        match shape {
            GrowthShape::Linear => ShapeParams::Linear(LinearParams {
                a: values[0],
                b: values[1],
            }),
            GrowthShape::Lag => ShapeParams::Lag(LagParams {
                a: values[0],
                b: values[1],
                b1: values[2],
            }),
            GrowthShape::Saturating => ShapeParams::Saturating(SaturatingParams {
                a: values[0],
                b: values[1],
                b2: values[2],
            }),
            GrowthShape::Floor => ShapeParams::Floor(FloorParams {
                a: values[0],
                b: values[1],
                b2: values[2],
            }),
            GrowthShape::LagSaturating => ShapeParams::LagSaturating(LagSaturatingParams {
                a: values[0],
                b: values[1],
                b1: values[2],
                b2: values[3],
            }),
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        match *self {
            ShapeParams::Linear(p) => vec![p.a, p.b],
            ShapeParams::Lag(p) => vec![p.a, p.b, p.b1],
            ShapeParams::Saturating(p) => vec![p.a, p.b, p.b2],
            ShapeParams::Floor(p) => vec![p.a, p.b, p.b2],
            ShapeParams::LagSaturating(p) => vec![p.a, p.b, p.b1, p.b2],
        }
    }

    /// Exponential growth (or decline) rate.
    pub fn slope(&self) -> f64 {
        match *self {
            ShapeParams::Linear(p) => p.b,
            ShapeParams::Lag(p) => p.b,
            ShapeParams::Saturating(p) => p.b,
            ShapeParams::Floor(p) => p.b,
            ShapeParams::LagSaturating(p) => p.b,
        }
    }

    /// Index of the slope in the parameter vector (and covariance matrix).
    pub fn slope_index(&self) -> usize {
        1
    }

    /// Breakpoint where the exponential segment starts, if the shape has one.
    pub fn lag_end(&self) -> Option<f64> {
        match *self {
            ShapeParams::Lag(p) => Some(p.b1),
            ShapeParams::LagSaturating(p) => Some(p.b1),
            _ => None,
        }
    }

    /// Breakpoint where the exponential segment ends, if the shape has one.
    pub fn growth_end(&self) -> Option<f64> {
        match *self {
            ShapeParams::Saturating(p) => Some(p.b2),
            ShapeParams::Floor(p) => Some(p.b2),
            ShapeParams::LagSaturating(p) => Some(p.b2),
            _ => None,
        }
    }
}

/// A cleaned time series ready for fitting.
///
/// Cleaning drops entries with a non-finite time or abundance, sorts by time
/// (stable, so duplicate times keep their input order) and optionally shifts
/// times so the earliest observation sits at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub times: Vec<f64>,
    pub values: Vec<f64>,
    /// Number of input entries dropped during cleaning.
    pub dropped: usize,
    /// Amount subtracted from every time (zero unless time-zeroing is on).
    pub time_offset: f64,
}

impl TimeSeries {
    pub fn clean(times: &[f64], values: &[f64], zero_time: bool) -> Result<Self, GrowthError> {
        if times.len() != values.len() {
            return Err(GrowthError::InvalidInput(format!(
                "Time vector has {} entries but abundance vector has {}.",
                times.len(),
                values.len()
            )));
        }

        let mut pairs: Vec<(f64, f64)> = times
            .iter()
            .zip(values.iter())
            .filter(|(t, y)| t.is_finite() && y.is_finite())
            .map(|(&t, &y)| (t, y))
            .collect();
        let dropped = times.len() - pairs.len();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let time_offset = match pairs.first() {
            Some(&(t0, _)) if zero_time => t0,
            _ => 0.0,
        };

        Ok(Self {
            times: pairs.iter().map(|&(t, _)| t - time_offset).collect(),
            values: pairs.iter().map(|&(_, y)| y).collect(),
            dropped,
            time_offset,
        })
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Number of distinct time values (times are sorted).
    pub fn distinct_times(&self) -> usize {
        let mut count = 0;
        let mut prev: Option<f64> = None;
        for &t in &self.times {
            if prev != Some(t) {
                count += 1;
                prev = Some(t);
            }
        }
        count
    }

    pub fn t_min(&self) -> f64 {
        self.times.first().copied().unwrap_or(f64::NAN)
    }

    pub fn t_max(&self) -> f64 {
        self.times.last().copied().unwrap_or(f64::NAN)
    }

    pub fn t_mean(&self) -> f64 {
        if self.times.is_empty() {
            return f64::NAN;
        }
        self.times.iter().sum::<f64>() / self.times.len() as f64
    }

    pub fn y_min(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }
}

/// Observation count and local R² for one region of a fitted series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentStats {
    pub n: usize,
    /// NaN when the region holds fewer than two observations or constant values.
    pub r2: f64,
}

/// Per-region diagnostics of a fit, as delimited by its breakpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentDiagnostics {
    /// Lag region (shapes with a lag breakpoint only).
    pub pre: Option<SegmentStats>,
    /// Exponential segment.
    pub exp: SegmentStats,
    /// Saturation/floor region (shapes with an end breakpoint only).
    pub post: Option<SegmentStats>,
}

/// How the starting values of an attempt were chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StartStrategy {
    /// Shape-specific data-driven heuristic.
    Heuristic,
    /// Heuristic values with the breakpoint replaced by a fixed constant.
    FallbackBreakpoint { breakpoint: f64 },
}

/// A structurally successful nonlinear fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub params: ShapeParams,
    /// Parameter covariance `σ² (JᵀJ)⁻¹`; NaN-filled when `n <= p`.
    pub covariance: DMatrix<f64>,
    /// Fitted values at each (cleaned) input time.
    pub fitted: Vec<f64>,
    pub sse: f64,
    pub n: usize,
    pub iterations: usize,
    pub evaluations: usize,
    pub strategy: StartStrategy,
}

impl FittedModel {
    pub fn shape(&self) -> GrowthShape {
        self.params.shape()
    }

    /// Standard error of the slope.
    pub fn slope_se(&self) -> f64 {
        let i = self.params.slope_index();
        let var = self.covariance[(i, i)];
        if var.is_finite() && var >= 0.0 {
            var.sqrt()
        } else {
            f64::NAN
        }
    }

    /// Standard error of every parameter, in vector order.
    pub fn std_errors(&self) -> Vec<f64> {
        (0..self.covariance.nrows())
            .map(|i| {
                let var = self.covariance[(i, i)];
                if var.is_finite() && var >= 0.0 { var.sqrt() } else { f64::NAN }
            })
            .collect()
    }
}

/// Why a shape produced no usable fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FitFailure {
    /// The solver exhausted its iteration/evaluation budget on every attempt.
    NonConvergence {
        attempts: usize,
        iterations: usize,
        evaluations: usize,
    },
    /// Parameters are not locally identifiable at the solution.
    SingularGradient { attempts: usize },
    /// The objective was not finite at the starting values.
    NonFinite { attempts: usize },
    /// A converged fit whose exponential segment lacks support.
    Disqualified {
        fit: Box<FittedModel>,
        segments: SegmentDiagnostics,
    },
}

impl FitFailure {
    pub fn describe(&self) -> String {
        match self {
            FitFailure::NonConvergence {
                attempts,
                iterations,
                evaluations,
            } => format!(
                "did not converge ({attempts} attempt(s), last: {iterations} iterations, {evaluations} evaluations)"
            ),
            FitFailure::SingularGradient { .. } => "singular gradient matrix".to_string(),
            FitFailure::NonFinite { .. } => "non-finite objective at starting values".to_string(),
            FitFailure::Disqualified { segments, .. } => format!(
                "insufficient exponential support (n={}, R2={:.3})",
                segments.exp.n, segments.exp.r2
            ),
        }
    }
}

/// Outcome of fitting one shape to one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FitOutcome {
    Success {
        fit: FittedModel,
        segments: SegmentDiagnostics,
    },
    Failure { failure: FitFailure },
}

impl FitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FitOutcome::Success { .. })
    }

    pub fn fit(&self) -> Option<&FittedModel> {
        match self {
            FitOutcome::Success { fit, .. } => Some(fit),
            FitOutcome::Failure { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&FitFailure> {
        match self {
            FitOutcome::Success { .. } => None,
            FitOutcome::Failure { failure } => Some(failure),
        }
    }
}

/// Outcome of every requested shape for one series.
pub type ModelSet = BTreeMap<GrowthShape, FitOutcome>;

/// Budget and tolerances for a single nonlinear least-squares attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NlsControl {
    pub max_iterations: usize,
    pub max_evaluations: usize,
    /// Relative SSE reduction below which an accepted step ends the solve.
    pub ftol: f64,
    /// Relative parameter step below which the solve ends.
    pub xtol: f64,
    /// Absolute SSE at or below which the fit is treated as exact.
    pub sse_floor: f64,
    /// Smallest/largest Jacobian singular value ratio treated as singular.
    pub singular_rtol: f64,
}

impl Default for NlsControl {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            max_evaluations: 1000,
            ftol: 1e-10,
            xtol: 1e-10,
            sse_floor: 1e-24,
            singular_rtol: 1e-7,
        }
    }
}

/// Options for one growth-rate estimation.
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthOptions {
    /// Optional series identifier carried into the report.
    pub label: Option<String>,
    /// Shapes to try. Duplicates are ignored; order does not matter.
    pub shapes: Vec<GrowthShape>,
    pub criterion: Criterion,
    pub min_exp_obs: usize,
    /// Local R² cutoff applied when the exponential segment has exactly
    /// `min_exp_obs` observations.
    pub r2_cutoff: f64,
    /// Shift times so the earliest observation is at zero.
    pub zero_time: bool,
    /// Render an SVG of the winning fit to this path.
    pub plot_path: Option<PathBuf>,
    /// Surface per-shape failures as warnings.
    pub verbose: bool,
    /// Include singular-gradient failures in the report diagnostics.
    pub report_singular: bool,
    pub smoothness: f64,
    pub inclusion_margin: f64,
    pub fallback_breakpoint: f64,
    pub control: NlsControl,
}

impl Default for GrowthOptions {
    fn default() -> Self {
        Self {
            label: None,
            shapes: GrowthShape::ALL.to_vec(),
            criterion: Criterion::Aicc,
            min_exp_obs: DEFAULT_MIN_EXP_OBS,
            r2_cutoff: 0.0,
            zero_time: true,
            plot_path: None,
            verbose: false,
            report_singular: false,
            smoothness: DEFAULT_SMOOTHNESS,
            inclusion_margin: DEFAULT_INCLUSION_MARGIN,
            fallback_breakpoint: DEFAULT_FALLBACK_BREAKPOINT,
            control: NlsControl::default(),
        }
    }
}

impl GrowthOptions {
    pub fn with_shapes(mut self, shapes: &[GrowthShape]) -> Self {
        self.shapes = shapes.to_vec();
        self
    }

    pub fn validate(&self) -> Result<(), GrowthError> {
        if !(self.smoothness.is_finite() && self.smoothness > 0.0) {
            return Err(GrowthError::InvalidInput(
                "Smoothness constant must be finite and > 0.".to_string(),
            ));
        }
        if !(self.inclusion_margin.is_finite() && self.inclusion_margin >= 0.0) {
            return Err(GrowthError::InvalidInput(
                "Inclusion margin must be finite and >= 0.".to_string(),
            ));
        }
        if self.min_exp_obs == 0 {
            return Err(GrowthError::InvalidInput(
                "Minimum exponential observations must be >= 1.".to_string(),
            ));
        }
        if self.r2_cutoff.is_nan() {
            return Err(GrowthError::InvalidInput("R2 cutoff must not be NaN.".to_string()));
        }
        if !self.fallback_breakpoint.is_finite() {
            return Err(GrowthError::InvalidInput(
                "Fallback breakpoint must be finite.".to_string(),
            ));
        }
        if self.control.max_iterations == 0 || self.control.max_evaluations == 0 {
            return Err(GrowthError::InvalidInput(
                "Solver iteration and evaluation budgets must be > 0.".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse shape names, skipping (and returning) the ones not recognised.
pub fn parse_shape_names<S: AsRef<str>>(names: &[S]) -> (Vec<GrowthShape>, Vec<String>) {
    let mut shapes = Vec::new();
    let mut unknown = Vec::new();
    for name in names {
        match name.as_ref().parse::<GrowthShape>() {
            Ok(shape) => shapes.push(shape),
            Err(_) => unknown.push(name.as_ref().to_string()),
        }
    }
    (shapes, unknown)
}
