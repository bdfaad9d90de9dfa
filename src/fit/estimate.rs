//! End-to-end growth-rate estimation for one series.
//!
//! Steps:
//! 1. validate options and clean the series (drop missing, sort, zero time)
//! 2. guard degenerate input (fewer than two distinct times, no shapes)
//! 3. fit every requested shape and qualify the converged fits
//! 4. rank the survivors and build the report
//! 5. hand the winner to the plot hook, if one was requested

use std::collections::BTreeSet;

use crate::domain::{
    DiagnosticKind, DiagnosticLog, FitOutcome, GrowthOptions, GrowthShape, ModelSet, TimeSeries,
};
use crate::error::GrowthError;
use crate::fit::fitter::fit_shape;
use crate::fit::qualify::{QualifierRules, qualify};
use crate::fit::selection::select_model;
use crate::report::{GrowthReport, build_report};

/// Estimate the exponential growth rate of `values` (log abundances) over `times`.
///
/// Degenerate input yields a missing report rather than an error. Fails when
/// the inputs or options are invalid, or when no requested shape survives.
pub fn estimate_growth_rate(
    times: &[f64],
    values: &[f64],
    opts: &GrowthOptions,
) -> Result<GrowthReport, GrowthError> {
    opts.validate()?;
    let series = TimeSeries::clean(times, values, opts.zero_time)?;
    let mut log = DiagnosticLog::new(opts.verbose, opts.label.clone());

    if series.dropped > 0 {
        log.trace(None, &format!("dropped {} missing observation(s)", series.dropped));
    }

    if series.distinct_times() < 2 {
        log.warn(
            DiagnosticKind::DegenerateInput,
            None,
            format!(
                "fewer than two distinct time points ({} usable observation(s)); no growth rate estimated",
                series.len()
            ),
        );
        return Ok(GrowthReport::missing(
            opts.label.clone(),
            opts.criterion,
            series,
            log.into_entries(),
        ));
    }

    let shapes: BTreeSet<GrowthShape> = opts.shapes.iter().copied().collect();
    if shapes.is_empty() {
        log.warn(
            DiagnosticKind::NoShapes,
            None,
            "no recognised growth shapes requested; no growth rate estimated",
        );
        return Ok(GrowthReport::missing(
            opts.label.clone(),
            opts.criterion,
            series,
            log.into_entries(),
        ));
    }

    let outcomes = fit_all(&shapes, &series, opts, &mut log);

    let selection = select_model(&outcomes, opts.criterion)?;
    let report = build_report(opts.label.clone(), series, outcomes, selection, Vec::new());
    tracing::info!(
        series = opts.label.as_deref().unwrap_or("-"),
        shape = report.shape.map(GrowthShape::name).unwrap_or("-"),
        slope = report.slope,
        "selected growth model"
    );

    if let (Some(path), Some(params)) = (&opts.plot_path, report.params) {
        if let Err(e) = crate::plot::render_svg(&report.series, &params, opts.smoothness, path) {
            log.warn(DiagnosticKind::Plot, None, format!("could not write plot: {e}"));
        }
    }

    Ok(GrowthReport {
        diagnostics: log.into_entries(),
        ..report
    })
}

/// Same as [`estimate_growth_rate`], with shapes given by name.
///
/// Unknown names are skipped with a diagnostic; if none is recognised the
/// report is missing.
pub fn estimate_growth_rate_named<S: AsRef<str>>(
    times: &[f64],
    values: &[f64],
    shape_names: &[S],
    opts: &GrowthOptions,
) -> Result<GrowthReport, GrowthError> {
    let (shapes, unknown) = crate::domain::parse_shape_names(shape_names);
    let opts = opts.clone().with_shapes(&shapes);
    let mut report = estimate_growth_rate(times, values, &opts)?;
    if !unknown.is_empty() {
        let mut log = DiagnosticLog::new(opts.verbose, opts.label.clone());
        log.warn(
            DiagnosticKind::UnknownShape,
            None,
            format!("ignoring unknown growth shape(s): {}", unknown.join(", ")),
        );
        let mut diagnostics = log.into_entries();
        diagnostics.append(&mut report.diagnostics);
        report.diagnostics = diagnostics;
    }
    Ok(report)
}

fn fit_all(
    shapes: &BTreeSet<GrowthShape>,
    series: &TimeSeries,
    opts: &GrowthOptions,
    log: &mut DiagnosticLog,
) -> ModelSet {
    let rules = QualifierRules::from_options(opts);
    let mut outcomes = ModelSet::new();
    for &shape in shapes {
        let outcome = match fit_shape(shape, series, opts, log) {
            Ok(fit) => {
                let outcome = qualify(fit, series, &rules);
                if let FitOutcome::Failure { failure } = &outcome {
                    log.push(
                        DiagnosticKind::Disqualified,
                        Some(shape),
                        format!("{}: {}", shape.display_name(), failure.describe()),
                    );
                }
                outcome
            }
            Err(failure) => FitOutcome::Failure { failure },
        };
        outcomes.insert(shape, outcome);
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Criterion, FitFailure};
    use assert_matches::assert_matches;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` under a WARN-level subscriber and return what it logged.
    fn warnings_from(f: impl FnOnce()) -> String {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = out.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn degenerate_input_warns_without_verbose() {
        let logged = warnings_from(|| {
            let report = estimate_growth_rate(&[1.0, 1.0], &[1.0, 2.0], &GrowthOptions::default()).unwrap();
            assert!(report.is_missing());
        });
        assert!(logged.contains("WARN"), "{logged}");
        assert!(logged.contains("fewer than two distinct time points"), "{logged}");
    }

    #[test]
    fn unknown_shapes_warn_without_verbose() {
        let t: Vec<f64> = (0..6).map(|i| i as f64).collect();
        let y: Vec<f64> = t.iter().map(|v| 1.0 + 0.3 * v).collect();
        let logged = warnings_from(|| {
            let report = estimate_growth_rate_named(&t, &y, &["gompertz"], &GrowthOptions::default()).unwrap();
            assert!(report.is_missing());
        });
        assert!(logged.contains("gompertz"), "{logged}");
        assert!(logged.contains("no recognised growth shapes"), "{logged}");
    }

    #[test]
    fn per_shape_failures_stay_quiet_without_verbose() {
        let t: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y = vec![1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let opts = GrowthOptions {
            shapes: vec![GrowthShape::Linear, GrowthShape::Lag],
            min_exp_obs: 7,
            ..GrowthOptions::default()
        };
        let logged = warnings_from(|| {
            let report = estimate_growth_rate(&t, &y, &opts).unwrap();
            assert_eq!(report.shape, Some(GrowthShape::Linear));
        });
        assert!(!logged.contains("WARN"), "{logged}");
    }

    #[test]
    fn length_mismatch_is_invalid_input() {
        let err = estimate_growth_rate(&[0.0, 1.0], &[1.0], &GrowthOptions::default()).unwrap_err();
        assert_matches!(err, GrowthError::InvalidInput(_));
    }

    #[test]
    fn invalid_options_are_rejected() {
        let opts = GrowthOptions {
            smoothness: 0.0,
            ..GrowthOptions::default()
        };
        let err = estimate_growth_rate(&[0.0, 1.0], &[1.0, 2.0], &opts).unwrap_err();
        assert_matches!(err, GrowthError::InvalidInput(_));
    }

    #[test]
    fn single_time_point_yields_missing_report() {
        let report = estimate_growth_rate(&[2.0, 2.0, 2.0], &[1.0, 1.1, 0.9], &GrowthOptions::default()).unwrap();
        assert!(report.is_missing());
        assert!(report.slope.is_nan());
        assert_eq!(report.diagnostics[0].kind, DiagnosticKind::DegenerateInput);
    }

    #[test]
    fn empty_shape_list_yields_missing_report() {
        let opts = GrowthOptions::default().with_shapes(&[]);
        let report = estimate_growth_rate(&[0.0, 1.0, 2.0], &[1.0, 2.0, 3.0], &opts).unwrap();
        assert!(report.is_missing());
        assert_eq!(report.diagnostics[0].kind, DiagnosticKind::NoShapes);
    }

    #[test]
    fn unknown_names_are_reported_and_skipped() {
        let t: Vec<f64> = (0..6).map(|i| i as f64).collect();
        let y: Vec<f64> = t.iter().map(|v| 1.0 + 0.3 * v).collect();
        let report =
            estimate_growth_rate_named(&t, &y, &["linear", "gompertz"], &GrowthOptions::default()).unwrap();
        assert_eq!(report.shape, Some(GrowthShape::Linear));
        assert_eq!(report.diagnostics[0].kind, DiagnosticKind::UnknownShape);
        assert!(report.diagnostics[0].message.contains("gompertz"));

        let missing = estimate_growth_rate_named(&t, &y, &["gompertz"], &GrowthOptions::default()).unwrap();
        assert!(missing.is_missing());
        let kinds: Vec<_> = missing.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![DiagnosticKind::UnknownShape, DiagnosticKind::NoShapes]);
    }

    #[test]
    fn duplicate_shapes_are_fitted_once() {
        let t: Vec<f64> = (0..6).map(|i| i as f64).collect();
        let y: Vec<f64> = t.iter().map(|v| 1.0 + 0.3 * v).collect();
        let opts = GrowthOptions::default().with_shapes(&[GrowthShape::Linear, GrowthShape::Linear]);
        let report = estimate_growth_rate(&t, &y, &opts).unwrap();
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.ranking.len(), 1);
    }

    #[test]
    fn disqualified_fits_are_logged() {
        // The lag fit is exact with its breakpoint at t = 4, which leaves six
        // observations in the exponential segment.
        let t: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y = vec![1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let opts = GrowthOptions {
            shapes: vec![GrowthShape::Linear, GrowthShape::Lag],
            min_exp_obs: 7,
            criterion: Criterion::Aicc,
            ..GrowthOptions::default()
        };
        let report = estimate_growth_rate(&t, &y, &opts).unwrap();
        assert_eq!(report.shape, Some(GrowthShape::Linear));
        assert_matches!(
            report.outcomes.get(&GrowthShape::Lag),
            Some(FitOutcome::Failure { failure: FitFailure::Disqualified { .. } })
        );
        assert!(report
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::Disqualified && d.shape == Some(GrowthShape::Lag)));
    }

    #[test]
    fn plot_failure_does_not_change_result() {
        let t: Vec<f64> = (0..6).map(|i| i as f64).collect();
        let y: Vec<f64> = t.iter().map(|v| 1.0 + 0.3 * v).collect();
        let opts = GrowthOptions {
            shapes: vec![GrowthShape::Linear],
            plot_path: Some("/nonexistent-dir/for/plot.svg".into()),
            ..GrowthOptions::default()
        };
        let report = estimate_growth_rate(&t, &y, &opts).unwrap();
        assert_eq!(report.shape, Some(GrowthShape::Linear));
        assert!((report.slope - 0.3).abs() < 1e-9);
        assert!(report.diagnostics.iter().any(|d| d.kind == DiagnosticKind::Plot));
    }
}
