//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{FitOutcome, GrowthShape};
use crate::report::GrowthReport;

/// Format the summary of one estimation (series stats, model table, winner).
pub fn format_report(report: &GrowthReport) -> String {
    let mut out = String::new();

    let label = report.label.as_deref().unwrap_or("series");
    out.push_str(&format!("=== gcurve - growth rate ({label}) ===\n"));
    let s = &report.series;
    if s.is_empty() {
        out.push_str(&format!("Points: n=0 | dropped={}\n", s.dropped));
    } else {
        out.push_str(&format!(
            "Points: n={} | dropped={} | distinct t={} | t=[{:.3}, {:.3}] | offset={:.3}\n",
            s.len(),
            s.dropped,
            s.distinct_times(),
            s.t_min(),
            s.t_max(),
            s.time_offset
        ));
    }
    out.push_str(&format!("Criterion: {}\n", report.criterion.display_name()));

    if !report.outcomes.is_empty() {
        out.push_str("\nModel diagnostics:\n");
        for score in &report.ranking {
            let chosen = if Some(score.shape) == report.shape { "*" } else { " " };
            out.push_str(&format!(
                "{chosen} {:<18} SSE={:.4e} AICc={} AIC={:.3} BIC={:.3} w={:.3}\n",
                score.shape.display_name(),
                score.sse,
                fmt_num(score.aicc),
                score.aic,
                score.bic,
                score.weight
            ));
        }
        for (shape, outcome) in &report.outcomes {
            if let FitOutcome::Failure { failure } = outcome {
                out.push_str(&format!("  (failed {}) {}\n", shape.display_name(), failure.describe()));
            }
        }
    }

    match (report.shape, report.params) {
        (Some(shape), Some(params)) => {
            out.push_str("\nChosen model:\n");
            out.push_str(&format!("- {} ({})\n", shape.display_name(), shape.name()));
            out.push_str(&format!("- params: {}\n", fmt_params(shape, &params.to_vec())));
            out.push_str(&format!(
                "- growth rate: {} (SE {})\n",
                fmt_num(report.slope),
                fmt_num(report.slope_se)
            ));
            out.push_str(&format!("- R2: {}\n", fmt_num(report.r2)));
            if let Some(seg) = report.segments {
                out.push_str(&format!(
                    "- exponential segment: n={} R2={}\n",
                    seg.exp.n,
                    fmt_num(seg.exp.r2)
                ));
            }
        }
        _ => out.push_str("\nNo growth rate estimated.\n"),
    }

    if !report.diagnostics.is_empty() {
        out.push_str("\nDiagnostics:\n");
        for d in &report.diagnostics {
            out.push_str(&format!("- {}\n", d.message));
        }
    }
    out.push('\n');

    out
}

fn fmt_params(shape: GrowthShape, values: &[f64]) -> String {
    let parts: Vec<String> = shape
        .param_names()
        .iter()
        .zip(values)
        .map(|(name, v)| format!("{name}={v:.6}"))
        .collect();
    parts.join(", ")
}

fn fmt_num(v: f64) -> String {
    if v.is_nan() {
        "NA".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "Inf".to_string() } else { "-Inf".to_string() }
    } else {
        format!("{v:.6}")
    }
}
