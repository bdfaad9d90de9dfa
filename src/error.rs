use std::path::PathBuf;

use crate::domain::GrowthShape;

/// Errors that abort a run (or a single series in batch mode).
///
/// Per-shape fitting problems are *not* errors: they are recorded as
/// [`crate::domain::FitFailure`] values and only become an error when every
/// requested shape failed.
#[derive(Debug, thiserror::Error)]
pub enum GrowthError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No data: {0}")]
    NoData(String),

    #[error("All requested growth shapes failed to produce a usable fit ({})", fmt_shapes(.attempted))]
    AllModelsFailed { attempted: Vec<GrowthShape> },

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Plot error: {0}")]
    Plot(String),
}

impl GrowthError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for the `gcurve` binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            GrowthError::InvalidInput(_) | GrowthError::Io { .. } | GrowthError::Csv(_) => 2,
            GrowthError::Json(_) | GrowthError::Plot(_) => 2,
            GrowthError::NoData(_) => 3,
            GrowthError::AllModelsFailed { .. } => 4,
        }
    }
}

fn fmt_shapes(shapes: &[GrowthShape]) -> String {
    if shapes.is_empty() {
        return "none requested".to_string();
    }
    shapes
        .iter()
        .map(|s| s.name())
        .collect::<Vec<_>>()
        .join(", ")
}
