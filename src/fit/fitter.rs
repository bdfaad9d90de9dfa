//! Fitting routine for a single growth shape.
//!
//! Given:
//! - cleaned times `t_i` and log-abundances `y_i`
//! - a growth shape and its ordered starting strategies
//!
//! we run a bounded Levenberg–Marquardt solve per strategy until one
//! converges, and return either a [`FittedModel`] or a typed [`FitFailure`].
//!
//! Failure reporting:
//! - a singular gradient ends the strategy list and is only traced, unless
//!   `report_singular` is set
//! - non-convergence moves on to the next strategy; if none is left it is
//!   reported as a diagnostic
//! - a non-finite objective at the starting values is reported

use nalgebra::{DMatrix, DVector};

use crate::domain::{
    DiagnosticKind, DiagnosticLog, FitFailure, FittedModel, GrowthOptions, GrowthShape,
    ShapeParams, TimeSeries,
};
use crate::fit::nls::{LeastSquaresProblem, NlsError, solve_bounded};
use crate::fit::start::{start_strategies, starting_params};
use crate::models::{fill_gradient_row, predict, predict_all};

/// Least squares view of one shape over one series.
pub struct CurveProblem<'a> {
    pub shape: GrowthShape,
    pub times: &'a [f64],
    pub values: &'a [f64],
    pub smoothness: f64,
}

impl LeastSquaresProblem for CurveProblem<'_> {
    fn n_obs(&self) -> usize {
        self.times.len()
    }

    fn n_params(&self) -> usize {
        self.shape.param_count()
    }

    fn residuals(&self, params: &DVector<f64>) -> DVector<f64> {
        let p = ShapeParams::from_slice(self.shape, params.as_slice());
        DVector::from_iterator(
            self.times.len(),
            self.times
                .iter()
                .zip(self.values.iter())
                .map(|(&t, &y)| y - predict(&p, t, self.smoothness)),
        )
    }

    fn jacobian(&self, params: &DVector<f64>) -> DMatrix<f64> {
        let p = ShapeParams::from_slice(self.shape, params.as_slice());
        let k = self.shape.param_count();
        let mut jac = DMatrix::zeros(self.times.len(), k);
        let mut row = vec![0.0; k];
        for (i, &t) in self.times.iter().enumerate() {
            fill_gradient_row(&p, t, self.smoothness, &mut row);
            for (j, &v) in row.iter().enumerate() {
                jac[(i, j)] = v;
            }
        }
        jac
    }
}

/// Fit one shape to a cleaned series.
pub fn fit_shape(
    shape: GrowthShape,
    series: &TimeSeries,
    opts: &GrowthOptions,
    log: &mut DiagnosticLog,
) -> Result<FittedModel, FitFailure> {
    let problem = CurveProblem {
        shape,
        times: &series.times,
        values: &series.values,
        smoothness: opts.smoothness,
    };
    let bounds = shape.bounds();
    let strategies = start_strategies(shape, opts.fallback_breakpoint);

    let mut last_budget = (0usize, 0usize);
    for (attempt, &strategy) in strategies.iter().enumerate() {
        let attempts = attempt + 1;
        let start = starting_params(shape, strategy, series).to_vec();
        log.trace(
            Some(shape),
            &format!("attempt {attempts} from {strategy:?}: start={}", fmt_vec(&start)),
        );

        match solve_bounded(&problem, &start, &bounds, &opts.control) {
            Ok(sol) => {
                let params = ShapeParams::from_slice(shape, sol.params.as_slice());
                let fitted = predict_all(&params, &series.times, opts.smoothness);
                log.trace(
                    Some(shape),
                    &format!(
                        "converged after {} iterations ({} evaluations): params={} sse={:.6e}",
                        sol.iterations,
                        sol.evaluations,
                        fmt_vec(sol.params.as_slice()),
                        sol.sse
                    ),
                );
                return Ok(FittedModel {
                    params,
                    covariance: sol.covariance,
                    fitted,
                    sse: sol.sse,
                    n: series.len(),
                    iterations: sol.iterations,
                    evaluations: sol.evaluations,
                    strategy,
                });
            }
            Err(NlsError::NonConvergence {
                iterations,
                evaluations,
            }) => {
                last_budget = (iterations, evaluations);
                if attempts < strategies.len() {
                    log.push(
                        DiagnosticKind::Retry,
                        Some(shape),
                        format!(
                            "{} did not converge from {strategy:?}; retrying with the next starting values",
                            shape.display_name()
                        ),
                    );
                }
            }
            Err(NlsError::SingularGradient { .. }) => {
                let message = format!("{}: singular gradient matrix", shape.display_name());
                if opts.report_singular {
                    log.push(DiagnosticKind::SingularGradient, Some(shape), message);
                } else {
                    log.trace(Some(shape), &message);
                }
                return Err(FitFailure::SingularGradient { attempts });
            }
            Err(NlsError::NonFinite) => {
                log.push(
                    DiagnosticKind::NonFinite,
                    Some(shape),
                    format!("{}: non-finite objective at starting values", shape.display_name()),
                );
                return Err(FitFailure::NonFinite { attempts });
            }
        }
    }

    let failure = FitFailure::NonConvergence {
        attempts: strategies.len(),
        iterations: last_budget.0,
        evaluations: last_budget.1,
    };
    log.push(
        DiagnosticKind::NonConvergence,
        Some(shape),
        format!("{}: {}", shape.display_name(), failure.describe()),
    );
    Err(failure)
}

fn fmt_vec(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{v:.6}")).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NlsControl, StartStrategy};

    fn series(t: &[f64], y: &[f64]) -> TimeSeries {
        TimeSeries::clean(t, y, true).unwrap()
    }

    fn log() -> DiagnosticLog {
        DiagnosticLog::new(false, None)
    }

    #[test]
    fn linear_fit_recovers_exact_line() {
        let t: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = t.iter().map(|v| 0.5 * v + 2.0).collect();
        let s = series(&t, &y);
        let fit = fit_shape(GrowthShape::Linear, &s, &GrowthOptions::default(), &mut log()).unwrap();
        let v = fit.params.to_vec();
        assert!((v[0] - 2.0).abs() < 1e-9);
        assert!((v[1] - 0.5).abs() < 1e-9);
        assert!(fit.sse < 1e-18);
    }

    #[test]
    fn lag_fit_finds_breakpoint() {
        let t: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y = vec![1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let s = series(&t, &y);
        let fit = fit_shape(GrowthShape::Lag, &s, &GrowthOptions::default(), &mut log()).unwrap();
        let b1 = fit.params.lag_end().unwrap();
        assert!((4.0 - 1e-3..=5.0 + 1e-3).contains(&b1), "B1 = {b1}");
        assert!((fit.params.slope() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn fitted_values_match_closed_form() {
        let t: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let y = vec![0.1, 0.0, 0.2, 1.1, 2.0, 2.9, 4.1, 5.0, 5.2, 4.9, 5.1, 5.0];
        let s = series(&t, &y);
        let opts = GrowthOptions::default();
        for shape in GrowthShape::ALL {
            if let Ok(fit) = fit_shape(shape, &s, &opts, &mut log()) {
                let again = predict_all(&fit.params, &s.times, opts.smoothness);
                for (a, b) in again.iter().zip(fit.fitted.iter()) {
                    assert_eq!(a, b, "{shape:?}");
                }
            }
        }
    }

    #[test]
    fn exhausted_budget_tries_every_strategy() {
        let t: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y = vec![1.0, 1.1, 0.9, 1.0, 1.5, 2.4, 3.6, 4.4, 5.6, 6.5];
        let s = series(&t, &y);
        let opts = GrowthOptions {
            control: NlsControl {
                max_iterations: 1,
                max_evaluations: 1,
                ..NlsControl::default()
            },
            ..GrowthOptions::default()
        };
        let mut log = log();
        let err = fit_shape(GrowthShape::Lag, &s, &opts, &mut log).unwrap_err();
        assert!(matches!(err, FitFailure::NonConvergence { attempts: 2, .. }), "{err:?}");
        assert_eq!(log.entries()[0].kind, DiagnosticKind::Retry);
        assert_eq!(
            log.entries().last().map(|d| d.kind),
            Some(DiagnosticKind::NonConvergence)
        );
    }

    #[test]
    fn fallback_start_converges_after_heuristic_runs_out() {
        // Exact lag curve with its breakpoint at the fallback constant. One
        // iteration cannot move the heuristic breakpoint (t = 2.25) to 5, while
        // the fallback start is already at the solution.
        let truth = ShapeParams::Lag(crate::domain::LagParams { a: 1.0, b: 1.0, b1: 5.0 });
        let t: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let opts = GrowthOptions {
            fallback_breakpoint: 5.0,
            control: NlsControl {
                max_iterations: 1,
                ..NlsControl::default()
            },
            ..GrowthOptions::default()
        };
        let y = predict_all(&truth, &t, opts.smoothness);
        let s = series(&t, &y);

        let mut log = log();
        let fit = fit_shape(GrowthShape::Lag, &s, &opts, &mut log).unwrap();
        assert_eq!(fit.strategy, StartStrategy::FallbackBreakpoint { breakpoint: 5.0 });
        assert!((fit.params.lag_end().unwrap() - 5.0).abs() < 1e-6);
        assert!((fit.params.slope() - 1.0).abs() < 1e-6);
        let kinds: Vec<_> = log.entries().iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![DiagnosticKind::Retry]);
    }

    #[test]
    fn singular_failures_are_silent_by_default() {
        let t = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let y = [1.0, 1.1, 0.9, 2.0, 2.1, 1.9];
        let s = series(&t, &y);

        let mut quiet = log();
        let err = fit_shape(GrowthShape::Lag, &s, &GrowthOptions::default(), &mut quiet).unwrap_err();
        assert!(matches!(err, FitFailure::SingularGradient { .. }), "{err:?}");
        assert!(quiet.entries().is_empty());

        let opts = GrowthOptions {
            report_singular: true,
            ..GrowthOptions::default()
        };
        let mut loud = log();
        let _ = fit_shape(GrowthShape::Lag, &s, &opts, &mut loud);
        assert_eq!(loud.entries()[0].kind, DiagnosticKind::SingularGradient);
    }

    #[test]
    fn heuristic_strategy_is_recorded() {
        let t: Vec<f64> = (0..6).map(|i| i as f64).collect();
        let y: Vec<f64> = t.iter().map(|v| 3.0 - 0.2 * v).collect();
        let s = series(&t, &y);
        let fit = fit_shape(GrowthShape::Linear, &s, &GrowthOptions::default(), &mut log()).unwrap();
        assert_eq!(fit.strategy, StartStrategy::Heuristic);
    }
}
