//! SVG rendering of a fitted growth curve with `plotters`.
//!
//! Only the SVG backend is compiled in (no font rendering), so the chart is
//! drawn without mesh labels or a caption.

use std::path::Path;

use plotters::prelude::*;

use crate::domain::{ShapeParams, TimeSeries};
use crate::error::GrowthError;
use crate::models::predict;

const SIZE: (u32, u32) = (800, 500);
const CURVE_SAMPLES: usize = 400;

/// Write observations and the fitted curve to an SVG file.
pub fn render_svg(
    series: &TimeSeries,
    params: &ShapeParams,
    smoothness: f64,
    path: &Path,
) -> Result<(), GrowthError> {
    if series.is_empty() {
        return Err(GrowthError::Plot("nothing to plot".to_string()));
    }

    let (x0, x1) = (series.t_min(), series.t_max());
    if !(x1 > x0) {
        return Err(GrowthError::Plot("time range is empty".to_string()));
    }
    let curve: Vec<(f64, f64)> = (0..CURVE_SAMPLES)
        .map(|i| {
            let t = x0 + (x1 - x0) * i as f64 / (CURVE_SAMPLES - 1) as f64;
            (t, predict(params, t, smoothness))
        })
        .collect();

    let ys = series.values.iter().copied().chain(curve.iter().map(|&(_, y)| y));
    let (y0, y1) = ys.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| (lo.min(y), hi.max(y)));
    if !(y0.is_finite() && y1.is_finite()) {
        return Err(GrowthError::Plot("non-finite values".to_string()));
    }
    let pad = ((y1 - y0) * 0.05).max(1e-6);
    let (y0, y1) = (y0 - pad, y1 + pad);

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .build_cartesian_2d(x0..x1, y0..y1)
        .map_err(plot_err)?;

    let curve_color = RGBColor(0, 114, 178);
    let points_color = RGBColor(60, 60, 60);

    chart
        .draw_series(LineSeries::new(curve, curve_color.stroke_width(2)))
        .map_err(plot_err)?;
    chart
        .draw_series(
            series
                .times
                .iter()
                .zip(series.values.iter())
                .map(|(&t, &y)| Circle::new((t, y), 3, points_color.filled())),
        )
        .map_err(plot_err)?;

    for b in [params.lag_end(), params.growth_end()].into_iter().flatten() {
        if b > x0 && b < x1 {
            chart
                .draw_series(LineSeries::new(vec![(b, y0), (b, y1)], &RGBColor(200, 200, 200)))
                .map_err(plot_err)?;
        }
    }

    root.present().map_err(plot_err)?;
    tracing::debug!(path = %path.display(), "wrote SVG plot");
    Ok(())
}

fn plot_err(e: impl std::fmt::Display) -> GrowthError {
    GrowthError::Plot(e.to_string())
}
