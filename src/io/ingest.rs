//! CSV ingest of observations.
//!
//! Long format, one observation per row:
//!
//! ```text
//! set,variable,time,value
//! run1,x,0.0,1.00
//! run1,y,0.0,0.50
//! ```
//!
//! The `set` column is optional; without it every row belongs to one set named
//! `default`. Column names are case-insensitive and a UTF-8 BOM is tolerated.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic order** (sets and variables in order of first appearance)

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{Observations, Series};
use crate::error::{AppError, EXIT_INPUT};

/// Name used when the CSV has no `set` column.
pub const DEFAULT_SET: &str = "default";

/// One independent observation set.
#[derive(Debug, Clone)]
pub struct ObservationSet {
    pub name: String,
    pub observations: Observations,
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: observation sets + row errors.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub sets: Vec<ObservationSet>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Load observations from a CSV file.
pub fn load_observations(path: &Path) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_observations(file)
}

/// Parse observations from any reader (file, bytes in tests).
pub fn read_observations<R: Read>(source: R) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    for required in ["variable", "time", "value"] {
        if !header_map.contains_key(required) {
            return Err(AppError::new(
                EXIT_INPUT,
                format!("Missing required column: `{required}`"),
            ));
        }
    }

    let mut builder = SetBuilder::default();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;
    let mut rows_used = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: header line plus 1-based numbering.
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

        match parse_row(&record, &header_map) {
            Ok(row) => {
                builder.push(row);
                rows_used += 1;
            }
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if rows_used == 0 {
        return Err(AppError::new(EXIT_INPUT, "No valid observation rows in CSV."));
    }

    Ok(IngestedData {
        sets: builder.finish()?,
        row_errors,
        rows_read,
        rows_used,
    })
}

#[derive(Debug)]
struct Row {
    set: String,
    variable: String,
    time: f64,
    value: f64,
}

/// Accumulates rows per set and variable, preserving first-appearance order.
#[derive(Debug, Default)]
struct SetBuilder {
    index: HashMap<String, usize>,
    sets: Vec<(String, Vec<(String, Vec<f64>, Vec<f64>)>)>,
}

impl SetBuilder {
    fn push(&mut self, row: Row) {
        let next = self.sets.len();
        let set_idx = *self.index.entry(row.set.clone()).or_insert(next);
        if set_idx == next {
            self.sets.push((row.set, Vec::new()));
        }

        let series = &mut self.sets[set_idx].1;
        let entry = match series.iter().position(|(name, _, _)| *name == row.variable) {
            Some(i) => &mut series[i],
            None => {
                series.push((row.variable, Vec::new(), Vec::new()));
                let last = series.len() - 1;
                &mut series[last]
            }
        };
        entry.1.push(row.time);
        entry.2.push(row.value);
    }

    fn finish(self) -> Result<Vec<ObservationSet>, AppError> {
        self.sets
            .into_iter()
            .map(|(name, series)| {
                let series = series
                    .into_iter()
                    .map(|(variable, times, values)| Series::new(variable, times, values))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| AppError::new(EXIT_INPUT, format!("Set '{name}': {e}")))?;
                Ok(ObservationSet {
                    name,
                    observations: Observations::new(series),
                })
            })
            .collect()
    }
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn parse_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<Row, String> {
    let variable = get_required(record, header_map, "variable")?.to_string();
    let time = parse_f64(get_required(record, header_map, "time")?, "time")?;
    let value = parse_f64(get_required(record, header_map, "value")?, "value")?;
    let set = get_optional(record, header_map, "set")
        .unwrap_or(DEFAULT_SET)
        .to_string();
    Ok(Row {
        set,
        variable,
        time,
        value,
    })
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_f64(s: &str, name: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("Invalid `{name}` value '{s}'.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_grouped_by_set_and_variable() {
        let csv = "\u{feff}Set,Variable,Time,Value\n\
                   b,x,1,2\n\
                   a,x,0,1\n\
                   b,x,0,1\n\
                   b,y,0,5\n";
        let data = read_observations(csv.as_bytes()).unwrap();
        let names: Vec<&str> = data.sets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);

        let b = &data.sets[0].observations;
        let x = b.get("x").unwrap();
        assert_eq!(x.times, vec![0.0, 1.0]);
        assert_eq!(x.values, vec![1.0, 2.0]);
        assert_eq!(b.get("y").unwrap().len(), 1);
        assert_eq!(data.rows_used, 4);
    }

    #[test]
    fn missing_set_column_uses_default() {
        let csv = "variable,time,value\nx,0,1\nx,1,2\n";
        let data = read_observations(csv.as_bytes()).unwrap();
        assert_eq!(data.sets.len(), 1);
        assert_eq!(data.sets[0].name, DEFAULT_SET);
    }

    #[test]
    fn bad_rows_are_skipped_and_reported() {
        let csv = "variable,time,value\nx,0,1\nx,1,\nx,abc,3\nx,2,NaN\nx,3,4\n";
        let data = read_observations(csv.as_bytes()).unwrap();
        assert_eq!(data.rows_read, 5);
        assert_eq!(data.rows_used, 2);
        let lines: Vec<usize> = data.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
    }

    #[test]
    fn required_columns_are_enforced() {
        let err = read_observations("variable,time\nx,0\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_INPUT);
    }
}
