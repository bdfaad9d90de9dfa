//! Batch fitting across groups.
//!
//! Every group owns its observations and gets an independent report, so
//! groups are estimated in parallel. Results keep input order.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::domain::GrowthOptions;
use crate::fit::estimate_growth_rate;
use crate::io::SeriesGroup;
use crate::report::GroupResult;

/// Estimate every group (parallel).
///
/// `svg` is the requested plot path; with more than one group each plot gets
/// the group name appended to the file stem.
pub fn fit_groups(groups: &[SeriesGroup], opts: &GrowthOptions, svg: Option<&Path>) -> Vec<GroupResult> {
    let many = groups.len() > 1;
    groups
        .par_iter()
        .map(|group| {
            let mut group_opts = opts.clone();
            group_opts.label = group.name.clone().or_else(|| opts.label.clone());
            group_opts.plot_path = svg.map(|p| {
                if many {
                    plot_path_for(p, group.name.as_deref().unwrap_or("series"))
                } else {
                    p.to_path_buf()
                }
            });

            GroupResult {
                name: group.name.clone(),
                result: estimate_growth_rate(&group.times, &group.values, &group_opts),
            }
        })
        .collect()
}

/// `out/plot.svg` + `A 1` -> `out/plot-A_1.svg`.
fn plot_path_for(base: &Path, group: &str) -> PathBuf {
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("plot");
    let ext = base.extension().and_then(|s| s.to_str()).unwrap_or("svg");
    let safe: String = group
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    base.with_file_name(format!("{stem}-{safe}.{ext}"))
}
