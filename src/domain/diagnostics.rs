//! Structured diagnostic channel.
//!
//! The engine never prints. Every notable event (degenerate input, a failed
//! shape, a retry, a plot that could not be written) is pushed into a
//! [`DiagnosticLog`], which:
//!
//! - keeps the event for the report (so batch callers can inspect it later)
//! - forwards it to `tracing`
//!
//! Per-shape events (retries, failed or disqualified fits) go through
//! [`DiagnosticLog::push`] and are only warnings in verbose mode. Events that
//! change the outcome of the whole run go through [`DiagnosticLog::warn`] and
//! are always warnings.

use serde::{Deserialize, Serialize};

use crate::domain::GrowthShape;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    DegenerateInput,
    UnknownShape,
    NoShapes,
    Retry,
    NonConvergence,
    SingularGradient,
    NonFinite,
    Disqualified,
    Plot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub shape: Option<GrowthShape>,
    pub message: String,
}

/// Collects diagnostics for one estimation run.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticLog {
    verbose: bool,
    label: Option<String>,
    entries: Vec<Diagnostic>,
}

impl DiagnosticLog {
    pub fn new(verbose: bool, label: Option<String>) -> Self {
        Self {
            verbose,
            label,
            entries: Vec::new(),
        }
    }

    /// Record a per-shape diagnostic; logged as a warning only in verbose mode.
    pub fn push(&mut self, kind: DiagnosticKind, shape: Option<GrowthShape>, message: impl Into<String>) {
        let loud = self.verbose;
        self.record(kind, shape, message.into(), loud);
    }

    /// Record a run-level diagnostic; always logged as a warning.
    pub fn warn(&mut self, kind: DiagnosticKind, shape: Option<GrowthShape>, message: impl Into<String>) {
        self.record(kind, shape, message.into(), true);
    }

    fn record(&mut self, kind: DiagnosticKind, shape: Option<GrowthShape>, message: String, loud: bool) {
        let label = self.label.as_deref().unwrap_or("-");
        let shape_name = shape.map(|s| s.name()).unwrap_or("-");
        if loud {
            tracing::warn!(series = label, shape = shape_name, kind = ?kind, "{message}");
        } else {
            tracing::debug!(series = label, shape = shape_name, kind = ?kind, "{message}");
        }
        self.entries.push(Diagnostic {
            kind,
            shape,
            message,
        });
    }

    /// Trace an event without recording it in the report.
    pub fn trace(&self, shape: Option<GrowthShape>, message: &str) {
        let label = self.label.as_deref().unwrap_or("-");
        let shape_name = shape.map(|s| s.name()).unwrap_or("-");
        tracing::debug!(series = label, shape = shape_name, "{message}");
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }
}
