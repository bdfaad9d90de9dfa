//! CSV ingest of growth time series.
//!
//! Turns a long-format CSV (one observation per row) into one raw series per
//! group. Design goals:
//! - **Strict schema** for the named columns (clear errors + exit code 2)
//! - **Lenient values**: missing or unparsable numbers become NaN and are
//!   dropped later by series cleaning, never here
//! - **Stable grouping**: groups keep their order of first appearance

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::error::GrowthError;

/// Column names to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputColumns {
    pub time: String,
    pub value: String,
    pub group: Option<String>,
}

impl Default for InputColumns {
    fn default() -> Self {
        Self {
            time: "time".to_string(),
            value: "value".to_string(),
            group: None,
        }
    }
}

/// Raw observations of one group, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesGroup {
    /// Group key, `None` when no group column was requested.
    pub name: Option<String>,
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

/// A row that could not be read at all.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct IngestedData {
    pub groups: Vec<SeriesGroup>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Load a CSV file.
pub fn load_series_csv(path: &Path, columns: &InputColumns) -> Result<IngestedData, GrowthError> {
    let file = File::open(path).map_err(|e| GrowthError::io(path, e))?;
    read_series(file, columns)
}

/// Read series from any CSV source.
pub fn read_series<R: Read>(source: R, columns: &InputColumns) -> Result<IngestedData, GrowthError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader.headers()?.clone();
    let header_map = build_header_map(&headers);

    let time_idx = require_column(&header_map, &columns.time)?;
    let value_idx = require_column(&header_map, &columns.value)?;
    let group_idx = columns
        .group
        .as_deref()
        .map(|name| require_column(&header_map, name))
        .transpose()?;

    let mut groups: Vec<SeriesGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header; CSV lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let key = group_idx.map(|i| record.get(i).unwrap_or("").to_string());
        let slot = match index.get(key.as_deref().unwrap_or("")) {
            Some(&slot) => slot,
            None => {
                groups.push(SeriesGroup {
                    name: key.clone(),
                    times: Vec::new(),
                    values: Vec::new(),
                });
                index.insert(key.unwrap_or_default(), groups.len() - 1);
                groups.len() - 1
            }
        };

        let group = &mut groups[slot];
        group.times.push(parse_number(record.get(time_idx)));
        group.values.push(parse_number(record.get(value_idx)));
    }

    if groups.is_empty() {
        return Err(GrowthError::NoData("CSV contains no data rows.".to_string()));
    }

    Ok(IngestedData {
        groups,
        row_errors,
        rows_read,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn require_column(header_map: &HashMap<String, usize>, name: &str) -> Result<usize, GrowthError> {
    header_map
        .get(&normalize_header_name(name))
        .copied()
        .ok_or_else(|| GrowthError::InvalidInput(format!("Missing required column: `{name}`")))
}

/// Parse a numeric cell; missing markers and garbage become NaN.
fn parse_number(cell: Option<&str>) -> f64 {
    match cell.map(str::trim) {
        None | Some("") => f64::NAN,
        Some(s) if s.eq_ignore_ascii_case("na") => f64::NAN,
        Some(s) => s.parse::<f64>().unwrap_or(f64::NAN),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_single_series_with_missing_values() {
        let csv = "\u{feff}Time,Value\n0,1.0\n1,NA\n2,\n3,abc\n4,2.5\n";
        let data = read_series(csv.as_bytes(), &InputColumns::default()).unwrap();
        assert_eq!(data.rows_read, 5);
        assert_eq!(data.groups.len(), 1);
        let g = &data.groups[0];
        assert_eq!(g.name, None);
        assert_eq!(g.times, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(g.values[0], 1.0);
        assert!(g.values[1].is_nan() && g.values[2].is_nan() && g.values[3].is_nan());
        assert_eq!(g.values[4], 2.5);
    }

    #[test]
    fn groups_keep_first_appearance_order() {
        let csv = "well,t,y\nB,0,1\nA,0,2\nB,1,3\nA,1,4\n";
        let columns = InputColumns {
            time: "t".into(),
            value: "y".into(),
            group: Some("well".into()),
        };
        let data = read_series(csv.as_bytes(), &columns).unwrap();
        let names: Vec<_> = data.groups.iter().map(|g| g.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["B", "A"]);
        assert_eq!(data.groups[0].values, vec![1.0, 3.0]);
        assert_eq!(data.groups[1].values, vec![2.0, 4.0]);
    }

    #[test]
    fn missing_column_is_input_error() {
        let err = read_series("t,y\n0,1\n".as_bytes(), &InputColumns::default()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("`time`"));
    }

    #[test]
    fn header_only_is_no_data() {
        let err = read_series("time,value\n".as_bytes(), &InputColumns::default()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
