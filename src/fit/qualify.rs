//! Post-fit qualification of breakpoint shapes.
//!
//! A converged fit is only useful if its exponential segment (the observations
//! between the fitted breakpoints) actually carries data. For each fit we
//! compute, with `m` the inclusion margin:
//!
//! - exponential segment: `B1 − m < t < B2 + m` (missing breakpoints are ±∞)
//! - pre-exponential region: `t < B1` (lag shapes only)
//! - post-exponential region: `t > B2` (saturation/floor shapes only)
//!
//! and the local R² of the fitted values in each region. A fit is demoted to
//! [`FitFailure::Disqualified`] when the segment has fewer than
//! `min_exp_obs` observations, or exactly `min_exp_obs` with a local R² below
//! the cutoff. Pre/post statistics are diagnostics only.
//!
//! The linear shape has no breakpoints: its segment is the whole series and
//! it is never disqualified.

use crate::domain::{
    FitFailure, FitOutcome, FittedModel, GrowthOptions, SegmentDiagnostics, SegmentStats,
    TimeSeries,
};
use crate::math::r_squared;

/// Thresholds applied by [`qualify`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualifierRules {
    pub min_exp_obs: usize,
    pub r2_cutoff: f64,
    pub margin: f64,
}

impl QualifierRules {
    pub fn from_options(opts: &GrowthOptions) -> Self {
        Self {
            min_exp_obs: opts.min_exp_obs,
            r2_cutoff: opts.r2_cutoff,
            margin: opts.inclusion_margin,
        }
    }
}

/// Region statistics of a fit.
pub fn segment_diagnostics(fit: &FittedModel, series: &TimeSeries, margin: f64) -> SegmentDiagnostics {
    let lag_end = fit.params.lag_end();
    let growth_end = fit.params.growth_end();
    let lo = lag_end.map_or(f64::NEG_INFINITY, |b1| b1 - margin);
    let hi = growth_end.map_or(f64::INFINITY, |b2| b2 + margin);

    let exp = region_stats(fit, series, |t| t > lo && t < hi);
    let pre = lag_end.map(|b1| region_stats(fit, series, |t| t < b1));
    let post = growth_end.map(|b2| region_stats(fit, series, |t| t > b2));

    SegmentDiagnostics { pre, exp, post }
}

/// Apply the exponential-support rules to a converged fit.
pub fn qualify(fit: FittedModel, series: &TimeSeries, rules: &QualifierRules) -> FitOutcome {
    let segments = segment_diagnostics(&fit, series, rules.margin);
    let has_breakpoints = fit.params.lag_end().is_some() || fit.params.growth_end().is_some();

    if has_breakpoints && lacks_support(&segments.exp, rules) {
        return FitOutcome::Failure {
            failure: FitFailure::Disqualified {
                fit: Box::new(fit),
                segments,
            },
        };
    }

    FitOutcome::Success { fit, segments }
}

fn lacks_support(exp: &SegmentStats, rules: &QualifierRules) -> bool {
    // A NaN R² (constant observations) never trips the cutoff.
    exp.n < rules.min_exp_obs || (exp.n == rules.min_exp_obs && exp.r2 < rules.r2_cutoff)
}

fn region_stats(fit: &FittedModel, series: &TimeSeries, inside: impl Fn(f64) -> bool) -> SegmentStats {
    let mut pred = Vec::new();
    let mut obs = Vec::new();
    for (i, &t) in series.times.iter().enumerate() {
        if inside(t) {
            pred.push(fit.fitted[i]);
            obs.push(series.values[i]);
        }
    }
    let r2 = if obs.len() < 2 { f64::NAN } else { r_squared(&pred, &obs) };
    SegmentStats { n: obs.len(), r2 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        LagParams, LagSaturatingParams, LinearParams, ShapeParams, StartStrategy,
    };
    use crate::models::predict_all;
    use assert_matches::assert_matches;
    use nalgebra::DMatrix;

    fn fitted(params: ShapeParams, series: &TimeSeries) -> FittedModel {
        let k = params.shape().param_count();
        FittedModel {
            params,
            covariance: DMatrix::zeros(k, k),
            fitted: predict_all(&params, &series.times, 1e-10),
            sse: 0.0,
            n: series.len(),
            iterations: 1,
            evaluations: 1,
            strategy: StartStrategy::Heuristic,
        }
    }

    fn rules() -> QualifierRules {
        QualifierRules {
            min_exp_obs: 3,
            r2_cutoff: 0.0,
            margin: 0.1,
        }
    }

    fn series() -> TimeSeries {
        let t: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y = vec![1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        TimeSeries::clean(&t, &y, true).unwrap()
    }

    #[test]
    fn counts_regions_with_margin() {
        let s = series();
        let fit = fitted(
            ShapeParams::LagSaturating(LagSaturatingParams {
                a: 1.0,
                b: 1.0,
                b1: 4.0,
                b2: 7.0,
            }),
            &s,
        );
        let seg = segment_diagnostics(&fit, &s, 0.1);
        // 3.9 < t < 7.1 → t = 4, 5, 6, 7.
        assert_eq!(seg.exp.n, 4);
        assert_eq!(seg.pre.map(|p| p.n), Some(4));
        assert_eq!(seg.post.map(|p| p.n), Some(2));
    }

    #[test]
    fn late_breakpoint_is_disqualified() {
        let s = series();
        let fit = fitted(
            ShapeParams::Lag(LagParams {
                a: 1.0,
                b: 1.0,
                b1: 8.5,
            }),
            &s,
        );
        let outcome = qualify(fit, &s, &rules());
        assert_matches!(
            outcome,
            FitOutcome::Failure { failure: FitFailure::Disqualified { segments, .. } } if segments.exp.n == 1
        );
    }

    #[test]
    fn boundary_count_uses_r2_cutoff() {
        let s = series();
        // Segment t in {7, 8, 9}: exactly the minimum, local R² = 0.9.
        let params = ShapeParams::Lag(LagParams {
            a: 4.0,
            b: 0.8,
            b1: 7.0,
        });
        let mut strict = rules();
        strict.r2_cutoff = 0.999;
        let fit = fitted(params, &s);
        let seg = segment_diagnostics(&fit, &s, strict.margin);
        assert_eq!(seg.exp.n, 3);
        assert!(seg.exp.r2 < 0.999);
        assert!(!qualify(fit.clone(), &s, &strict).is_success());
        assert!(qualify(fit, &s, &rules()).is_success());
    }

    #[test]
    fn linear_is_never_disqualified() {
        let s = TimeSeries::clean(&[0.0, 1.0], &[1.0, 2.0], true).unwrap();
        let fit = fitted(ShapeParams::Linear(LinearParams { a: 1.0, b: 1.0 }), &s);
        let outcome = qualify(fit, &s, &rules());
        assert_matches!(outcome, FitOutcome::Success { segments, .. } if segments.exp.n == 2 && segments.pre.is_none());
    }
}
