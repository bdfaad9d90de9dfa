//! Command-line parsing for the growth-rate estimator.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{Criterion, GrowthShape};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "gcurve", version, about = "Segmented growth-rate estimation for log-abundance time series")]
pub struct Cli {
    /// Surface per-shape failures and debug tracing.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit every series in a CSV file, print summaries, and optionally plot/export.
    Fit(FitArgs),
    /// Write a synthetic noisy series for one shape to stdout as CSV.
    Simulate(SimulateArgs),
}

/// Options for fitting.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Input CSV with one observation per row.
    #[arg(long, value_name = "CSV")]
    pub csv: PathBuf,

    /// Time column name.
    #[arg(long, default_value = "time")]
    pub time_col: String,

    /// Log-abundance column name.
    #[arg(long, default_value = "value")]
    pub value_col: String,

    /// Optional column splitting rows into independent series.
    #[arg(long)]
    pub group_col: Option<String>,

    /// Shapes to try (comma separated).
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = GrowthShape::ALL)]
    pub shapes: Vec<GrowthShape>,

    /// Information criterion used for ranking.
    #[arg(long, value_enum, default_value_t = Criterion::Aicc)]
    pub criterion: Criterion,

    /// Minimum observations required in the exponential segment.
    #[arg(long, default_value_t = crate::domain::DEFAULT_MIN_EXP_OBS)]
    pub min_exp_obs: usize,

    /// Local R² cutoff when the exponential segment has exactly the minimum size.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub r2_cutoff: f64,

    /// Keep the original time origin instead of shifting the first time to zero.
    #[arg(long)]
    pub no_zero_time: bool,

    /// Render an ASCII plot of each winning fit.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Write an SVG of the winning fit. With several groups, the group name is
    /// appended to the file stem.
    #[arg(long, value_name = "SVG")]
    pub plot_svg: Option<PathBuf>,

    /// Export per-group reports to JSON.
    #[arg(long, value_name = "JSON")]
    pub export_json: Option<PathBuf>,

    /// Export a one-row-per-group summary to CSV.
    #[arg(long, value_name = "CSV")]
    pub export_csv: Option<PathBuf>,

    /// Report singular-gradient failures as diagnostics.
    #[arg(long)]
    pub show_singular: bool,
}

/// Options for simulating a series.
#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    #[arg(long, value_enum, default_value_t = GrowthShape::LagSaturating)]
    pub shape: GrowthShape,

    /// Parameter values in the shape's order (a, b[, B1][, B2]). Defaults
    /// give a visible lag and plateau over the default time range.
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub params: Option<Vec<f64>>,

    /// Number of distinct time points.
    #[arg(short = 'n', long, default_value_t = 24)]
    pub n: usize,

    /// Replicates per time point.
    #[arg(long, default_value_t = 1)]
    pub replicates: usize,

    #[arg(long, default_value_t = 0.0)]
    pub t_start: f64,

    #[arg(long, default_value_t = 24.0)]
    pub t_end: f64,

    /// Standard deviation of the Gaussian noise.
    #[arg(long, default_value_t = 0.05)]
    pub noise: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}
