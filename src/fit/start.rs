//! Starting values for the nonlinear fits.
//!
//! Each shape gets an ordered list of [`StartStrategy`] values. The fitter
//! walks the list until an attempt converges:
//!
//! - `lag`, `sat`: data heuristic, then the heuristic with the breakpoint
//!   replaced by a fixed fallback constant
//! - `linear`, `flr`, `lagsat`: data heuristic only
//!
//! Heuristics (times are already cleaned and sorted):
//!
//! - `linear`: the ordinary least squares line (SVD)
//! - `lag`: `B1` halfway between the first and the mean time, `a = min y`, `b = 1`
//! - `sat` / `flr`: `b` = largest (smallest) 3-point sliding-window slope,
//!   `a` = global regression intercept, breakpoint halfway between the mean and
//!   the last time
//! - `lagsat`: both breakpoints as above, `a = min y + 1e-3`, `b = 1`

use crate::domain::{
    FloorParams, GrowthShape, LagParams, LagSaturatingParams, LinearParams, SaturatingParams,
    ShapeParams, StartStrategy, TimeSeries,
};
use crate::math::{ols_line, sliding_slopes};

/// Width of the sliding regression window used for slope starts.
const SLOPE_WINDOW: usize = 3;

/// Offset added to the minimum observation for the `lagsat` level start.
const LAGSAT_LEVEL_OFFSET: f64 = 1e-3;

/// Ordered starting strategies for a shape.
pub fn start_strategies(shape: GrowthShape, fallback_breakpoint: f64) -> Vec<StartStrategy> {
    match shape {
        GrowthShape::Lag | GrowthShape::Saturating => vec![
            StartStrategy::Heuristic,
            StartStrategy::FallbackBreakpoint {
                breakpoint: fallback_breakpoint,
            },
        ],
        GrowthShape::Linear | GrowthShape::Floor | GrowthShape::LagSaturating => {
            vec![StartStrategy::Heuristic]
        }
    }
}

/// Starting parameters for `shape` under `strategy`.
///
/// Values are not projected onto the shape's bounds here; the solver does that.
pub fn starting_params(shape: GrowthShape, strategy: StartStrategy, series: &TimeSeries) -> ShapeParams {
    let t = &series.times;
    let y = &series.values;
    let (intercept, slope) = ols_line(t, y).unwrap_or_else(|| (mean(y), 0.0));

    let early = 0.5 * (series.t_min() + series.t_mean());
    let late = 0.5 * (series.t_mean() + series.t_max());
    let (b1, b2) = match strategy {
        StartStrategy::Heuristic => (early, late),
        StartStrategy::FallbackBreakpoint { breakpoint } => (breakpoint, breakpoint),
    };

    match shape {
        GrowthShape::Linear => ShapeParams::Linear(LinearParams {
            a: intercept,
            b: slope,
        }),
        GrowthShape::Lag => ShapeParams::Lag(LagParams {
            a: series.y_min(),
            b: 1.0,
            b1,
        }),
        GrowthShape::Saturating => {
            let local = sliding_slopes(t, y, SLOPE_WINDOW);
            let b = local.iter().copied().reduce(f64::max).unwrap_or(slope);
            ShapeParams::Saturating(SaturatingParams { a: intercept, b, b2 })
        }
        GrowthShape::Floor => {
            let local = sliding_slopes(t, y, SLOPE_WINDOW);
            let b = local.iter().copied().reduce(f64::min).unwrap_or(slope);
            ShapeParams::Floor(FloorParams { a: intercept, b, b2 })
        }
        GrowthShape::LagSaturating => ShapeParams::LagSaturating(LagSaturatingParams {
            a: series.y_min() + LAGSAT_LEVEL_OFFSET,
            b: 1.0,
            b1,
            b2,
        }),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
