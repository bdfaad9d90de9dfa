//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up tracing
//! - loads grouped series from CSV
//! - runs the estimation for every group
//! - prints reports/plots
//! - writes optional exports

use std::io;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Command, FitArgs, SimulateArgs};
use crate::data::{SimulationSpec, simulate_series};
use crate::domain::{GrowthOptions, GrowthShape, ShapeParams};
use crate::error::GrowthError;
use crate::io::{InputColumns, load_series_csv};

pub mod pipeline;

/// Entry point for the `gcurve` binary.
pub fn run() -> Result<(), GrowthError> {
    let cli = crate::cli::Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Fit(args) => handle_fit(&args, cli.verbose),
        Command::Simulate(args) => handle_simulate(&args),
    }
}

fn init_tracing(verbose: bool) {
    dotenvy::dotenv().ok();

    let default = if verbose { "growth_curves=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn handle_fit(args: &FitArgs, verbose: bool) -> Result<(), GrowthError> {
    let opts = options_from_args(args, verbose);
    opts.validate()?;

    let columns = InputColumns {
        time: args.time_col.clone(),
        value: args.value_col.clone(),
        group: args.group_col.clone(),
    };
    let ingest = load_series_csv(&args.csv, &columns)?;
    for e in &ingest.row_errors {
        tracing::warn!(line = e.line, "{}", e.message);
    }
    tracing::info!(
        rows = ingest.rows_read,
        groups = ingest.groups.len(),
        "loaded {}",
        args.csv.display()
    );

    let results = pipeline::fit_groups(&ingest.groups, &opts, args.plot_svg.as_deref());

    for r in &results {
        match &r.result {
            Ok(report) => {
                println!("{}", crate::report::format_report(report));
                if args.plot {
                    let plot = crate::plot::render_ascii_plot(
                        &report.series,
                        report.params.as_ref(),
                        opts.smoothness,
                        args.width,
                        args.height,
                    );
                    println!("{plot}");
                }
            }
            Err(e) => {
                let name = r.name.as_deref().unwrap_or("series");
                eprintln!("{name}: {e}");
            }
        }
    }

    // Optional exports.
    if let Some(path) = &args.export_json {
        crate::io::write_reports_json(path, &results)?;
    }
    if let Some(path) = &args.export_csv {
        crate::io::write_summary_csv(path, &results)?;
    }

    // A batch only fails when no group produced a report.
    if results.iter().all(|r| r.result.is_err()) {
        if let Some(err) = results.into_iter().find_map(|r| r.result.err()) {
            return Err(err);
        }
    }
    Ok(())
}

fn handle_simulate(args: &SimulateArgs) -> Result<(), GrowthError> {
    let params = match &args.params {
        Some(values) => {
            let expected = args.shape.param_count();
            if values.len() != expected {
                return Err(GrowthError::InvalidInput(format!(
                    "Shape '{}' takes {expected} parameters ({}), got {}.",
                    args.shape,
                    args.shape.param_names().join(", "),
                    values.len()
                )));
            }
            ShapeParams::from_slice(args.shape, values)
        }
        None => default_params(args.shape, args.t_start, args.t_end),
    };

    let spec = SimulationSpec {
        params,
        n_times: args.n,
        replicates: args.replicates,
        t_start: args.t_start,
        t_end: args.t_end,
        noise_sd: args.noise,
        seed: args.seed,
    };
    let points = simulate_series(&spec)?;

    let mut writer = csv::Writer::from_writer(io::stdout());
    for p in &points {
        writer.serialize(p)?;
    }
    writer
        .flush()
        .map_err(|e| GrowthError::io("<stdout>", e))?;
    Ok(())
}

/// Parameters with the breakpoints at the quarter marks of the time range.
fn default_params(shape: GrowthShape, t_start: f64, t_end: f64) -> ShapeParams {
    let span = t_end - t_start;
    let early = t_start + 0.25 * span;
    let mid = t_start + 0.5 * span;
    let late = t_start + 0.75 * span;
    let values: Vec<f64> = match shape {
        GrowthShape::Linear => vec![1.0, 0.3],
        GrowthShape::Lag => vec![1.0, 0.3, early],
        GrowthShape::Saturating => vec![1.0, 0.3, late],
        GrowthShape::Floor => vec![8.0, -0.3, mid],
        GrowthShape::LagSaturating => vec![1.0, 0.3, early, late],
    };
    ShapeParams::from_slice(shape, &values)
}

pub fn options_from_args(args: &FitArgs, verbose: bool) -> GrowthOptions {
    GrowthOptions {
        label: None,
        shapes: args.shapes.clone(),
        criterion: args.criterion,
        min_exp_obs: args.min_exp_obs,
        r2_cutoff: args.r2_cutoff,
        zero_time: !args.no_zero_time,
        plot_path: args.plot_svg.clone(),
        verbose,
        report_singular: args.show_singular,
        ..GrowthOptions::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    fn fit_args(extra: &[&str]) -> FitArgs {
        let mut argv = vec!["gcurve", "fit", "--csv", "data.csv"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Fit(args) => args,
            Command::Simulate(_) => panic!("expected fit"),
        }
    }

    #[test]
    fn defaults_match_library_defaults() {
        let opts = options_from_args(&fit_args(&[]), false);
        let lib = GrowthOptions::default();
        assert_eq!(opts.shapes, lib.shapes);
        assert_eq!(opts.criterion, lib.criterion);
        assert_eq!(opts.min_exp_obs, lib.min_exp_obs);
        assert!(opts.zero_time);
        assert!(!opts.report_singular);
    }

    #[test]
    fn shape_list_and_flags_are_mapped() {
        let args = fit_args(&["--shapes", "lag,linear", "--criterion", "bic", "--no-zero-time", "--show-singular"]);
        let opts = options_from_args(&args, true);
        assert_eq!(opts.shapes, vec![GrowthShape::Lag, GrowthShape::Linear]);
        assert_eq!(opts.criterion, crate::domain::Criterion::Bic);
        assert!(!opts.zero_time);
        assert!(opts.report_singular);
        assert!(opts.verbose);
    }

    #[test]
    fn default_simulation_params_fit_their_shape() {
        for shape in GrowthShape::ALL {
            let p = default_params(shape, 0.0, 24.0);
            assert_eq!(p.shape(), shape);
            let bounds = shape.bounds();
            for (v, (lo, hi)) in p.to_vec().into_iter().zip(bounds) {
                assert!(v >= lo && v <= hi, "{shape:?}");
            }
        }
    }
}
