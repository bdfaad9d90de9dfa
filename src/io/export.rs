//! Export batch results to JSON and CSV.
//!
//! The JSON export keeps per-shape detail (ranking, outcomes, diagnostics);
//! the CSV export is one row per group and is meant for spreadsheets.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::domain::{Criterion, Diagnostic, FitOutcome, GrowthShape, ShapeParams};
use crate::error::GrowthError;
use crate::fit::selection::ModelScore;
use crate::report::{GroupResult, GrowthReport};

#[derive(Debug, Serialize)]
struct OutcomeRecord {
    shape: GrowthShape,
    status: &'static str,
    reason: Option<String>,
    params: Option<ShapeParams>,
    /// Standard errors in parameter order; `null` where undefined.
    std_errors: Option<Vec<Option<f64>>>,
    sse: Option<f64>,
    iterations: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ReportRecord<'a> {
    group: Option<&'a str>,
    status: &'static str,
    error: Option<String>,
    criterion: Option<Criterion>,
    shape: Option<GrowthShape>,
    params: Option<ShapeParams>,
    slope: Option<f64>,
    slope_se: Option<f64>,
    r2: Option<f64>,
    n_obs: Option<usize>,
    n_dropped: Option<usize>,
    time_offset: Option<f64>,
    ranking: &'a [ModelScore],
    outcomes: Vec<OutcomeRecord>,
    diagnostics: &'a [Diagnostic],
}

/// One row of the CSV summary.
#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    group: &'a str,
    status: &'static str,
    shape: &'a str,
    slope: Option<f64>,
    slope_se: Option<f64>,
    r2: Option<f64>,
    exp_n: Option<usize>,
    exp_r2: Option<f64>,
    n_obs: Option<usize>,
    n_dropped: Option<usize>,
    error: String,
}

/// Write every group as a pretty-printed JSON array.
pub fn write_reports_json(path: &Path, results: &[GroupResult]) -> Result<(), GrowthError> {
    let file = File::create(path).map_err(|e| GrowthError::io(path, e))?;
    let mut writer = BufWriter::new(file);

    let records: Vec<ReportRecord<'_>> = results.iter().map(report_record).collect();
    serde_json::to_writer_pretty(&mut writer, &records)?;
    writer.write_all(b"\n").map_err(|e| GrowthError::io(path, e))?;
    writer.flush().map_err(|e| GrowthError::io(path, e))?;
    Ok(())
}

/// Write one summary row per group.
pub fn write_summary_csv(path: &Path, results: &[GroupResult]) -> Result<(), GrowthError> {
    let mut writer = csv::Writer::from_path(path)?;
    for r in results {
        writer.serialize(summary_row(r))?;
    }
    writer.flush().map_err(|e| GrowthError::io(path, e))?;
    Ok(())
}

fn status(result: &Result<GrowthReport, GrowthError>) -> &'static str {
    match result {
        Ok(report) if report.is_missing() => "missing",
        Ok(_) => "ok",
        Err(_) => "error",
    }
}

fn report_record(result: &GroupResult) -> ReportRecord<'_> {
    let group = result.name.as_deref();
    match &result.result {
        Ok(report) => ReportRecord {
            group,
            status: status(&result.result),
            error: None,
            criterion: Some(report.criterion),
            shape: report.shape,
            params: report.params,
            slope: finite(report.slope),
            slope_se: finite(report.slope_se),
            r2: finite(report.r2),
            n_obs: Some(report.n_obs()),
            n_dropped: Some(report.series.dropped),
            time_offset: Some(report.series.time_offset),
            ranking: &report.ranking,
            outcomes: report
                .outcomes
                .iter()
                .map(|(&shape, outcome)| outcome_record(shape, outcome))
                .collect(),
            diagnostics: &report.diagnostics,
        },
        Err(e) => ReportRecord {
            group,
            status: "error",
            error: Some(e.to_string()),
            criterion: None,
            shape: None,
            params: None,
            slope: None,
            slope_se: None,
            r2: None,
            n_obs: None,
            n_dropped: None,
            time_offset: None,
            ranking: &[],
            outcomes: Vec::new(),
            diagnostics: &[],
        },
    }
}

fn outcome_record(shape: GrowthShape, outcome: &FitOutcome) -> OutcomeRecord {
    match outcome {
        FitOutcome::Success { fit, .. } => OutcomeRecord {
            shape,
            status: "success",
            reason: None,
            params: Some(fit.params),
            std_errors: Some(fit.std_errors().into_iter().map(finite).collect()),
            sse: Some(fit.sse),
            iterations: Some(fit.iterations),
        },
        FitOutcome::Failure { failure } => OutcomeRecord {
            shape,
            status: "failure",
            reason: Some(failure.describe()),
            params: None,
            std_errors: None,
            sse: None,
            iterations: None,
        },
    }
}

fn summary_row(result: &GroupResult) -> SummaryRow<'_> {
    let group = result.name.as_deref().unwrap_or("");
    match &result.result {
        Ok(report) => SummaryRow {
            group,
            status: status(&result.result),
            shape: report.shape.map(GrowthShape::name).unwrap_or(""),
            slope: finite(report.slope),
            slope_se: finite(report.slope_se),
            r2: finite(report.r2),
            exp_n: report.segments.map(|s| s.exp.n),
            exp_r2: report.segments.and_then(|s| finite(s.exp.r2)),
            n_obs: Some(report.n_obs()),
            n_dropped: Some(report.series.dropped),
            error: String::new(),
        },
        Err(e) => SummaryRow {
            group,
            status: "error",
            shape: "",
            slope: None,
            slope_se: None,
            r2: None,
            exp_n: None,
            exp_r2: None,
            n_obs: None,
            n_dropped: None,
            error: e.to_string(),
        },
    }
}

/// Missing values are written as empty cells / `null`.
fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}
