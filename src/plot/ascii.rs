//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - observed points: `o`
//! - fitted curve: `-` line
//! - breakpoints of the fitted shape: `|`

use crate::domain::{ShapeParams, TimeSeries};
use crate::models::predict;

/// Render observations and, optionally, a fitted curve.
pub fn render_ascii_plot(
    series: &TimeSeries,
    params: Option<&ShapeParams>,
    smoothness: f64,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (t_min, t_max) = time_range(series).unwrap_or((0.0, 1.0));
    let curve = params.map(|p| sample_curve(p, smoothness, t_min, t_max, width));

    let (y_min, y_max) = y_range(series, curve.as_deref()).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    if let Some(p) = params {
        for b in [p.lag_end(), p.growth_end()].into_iter().flatten() {
            if b > t_min && b < t_max {
                let x = map_x(b, t_min, t_max, width);
                for row in grid.iter_mut() {
                    row[x] = '|';
                }
            }
        }
    }

    // Curve first so points overlay it.
    if let Some(curve) = &curve {
        draw_curve(&mut grid, curve, t_min, t_max, y_min, y_max);
    }

    for (&t, &y) in series.times.iter().zip(series.values.iter()) {
        let x = map_x(t, t_min, t_max, width);
        let row = map_y(y, y_min, y_max, height);
        grid[row][x] = 'o';
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: t=[{t_min:.3}, {t_max:.3}] | y=[{y_min:.2}, {y_max:.2}]\n"
    ));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn time_range(series: &TimeSeries) -> Option<(f64, f64)> {
    if series.is_empty() {
        return None;
    }
    let (min_t, max_t) = (series.t_min(), series.t_max());
    if min_t.is_finite() && max_t.is_finite() && max_t > min_t {
        Some((min_t, max_t))
    } else {
        None
    }
}

fn sample_curve(params: &ShapeParams, s: f64, t_min: f64, t_max: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            let t = t_min + u * (t_max - t_min);
            (t, predict(params, t, s))
        })
        .collect()
}

fn y_range(series: &TimeSeries, curve: Option<&[(f64, f64)]>) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    for &y in &series.values {
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    if let Some(curve) = curve {
        for &(_, y) in curve {
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
    }

    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], t_min: f64, t_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(t, y) in curve {
        if !y.is_finite() {
            prev = None;
            continue;
        }
        let x = map_x(t, t_min, t_max, width);
        let yy = map_y(y, y_min, y_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, x, yy, '-');
        } else {
            grid[yy][x] = '-';
        }
        prev = Some((x, yy));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
