use crate::constants::{COUNTRY_CODE_COLUMN, DATE_YEAR_COLUMN, YEAR_COLUMN};
use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use crate::types::{Cell, CleanedRow, CleanedTable, WideTable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

/// Data-quality diagnostics produced while cleaning. Informational only:
/// nothing here changes the cleaned rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    /// Rows in the input table
    pub rows_in: usize,
    /// Rows dropped because country_code or year was missing
    pub dropped_missing_keys: usize,
    /// Rows whose (country_code, date_year) key already appeared on an
    /// earlier row. Two (USA, 2020) rows count as 1.
    pub duplicate_keys: usize,
    /// Missing-value count per column, only for columns with at least one
    pub missing_by_column: Vec<(String, usize)>,
    pub assessed_at: DateTime<Utc>,
}

impl CleaningReport {
    pub fn empty() -> Self {
        Self {
            rows_in: 0,
            dropped_missing_keys: 0,
            duplicate_keys: 0,
            missing_by_column: Vec::new(),
            assessed_at: Utc::now(),
        }
    }

    pub fn rows_out(&self) -> usize {
        self.rows_in - self.dropped_missing_keys
    }

    /// Emit the report through tracing.
    pub fn log(&self) {
        info!(
            dropped = self.dropped_missing_keys,
            "Dropped rows with missing keys: {}", self.dropped_missing_keys
        );
        if self.duplicate_keys > 0 {
            warn!(duplicates = self.duplicate_keys, "Duplicate country-year rows: {}", self.duplicate_keys);
        } else {
            info!("Duplicate country-year rows: 0");
        }
        if self.missing_by_column.is_empty() {
            info!("No missing values");
        }
        for (column, count) in &self.missing_by_column {
            info!(column = %column, missing = count, "Missing values in {}: {}", column, count);
        }
    }
}

/// Clean and validate a combined table.
///
/// Column names are lowercased, the year becomes a whole number named
/// `date_year`, every other column except the country code becomes numeric
/// (unparsable values are missing), rows without country code or year are
/// dropped and the rest sorted by (country_code, date_year). Accepts its own
/// output (via [`CleanedTable::to_wide`]) and returns it unchanged.
pub fn clean_validate_dataset(table: &WideTable) -> Result<(CleanedTable, CleaningReport)> {
    // No indicator had data for any country: nothing to clean
    if table.columns().is_empty() {
        return Ok((CleanedTable::default(), CleaningReport::empty()));
    }

    let mut table = table.clone();
    table.rename_columns(|c| c.to_lowercase());

    let country_idx = table.column_index(COUNTRY_CODE_COLUMN).ok_or_else(|| {
        PipelineError::Schema(format!("table has no '{}' column", COUNTRY_CODE_COLUMN))
    })?;
    let year_idx = table
        .column_index(YEAR_COLUMN)
        .or_else(|| table.column_index(DATE_YEAR_COLUMN))
        .ok_or_else(|| PipelineError::Schema(format!("table has no '{}' column", YEAR_COLUMN)))?;

    let value_indices: Vec<usize> = (0..table.columns().len())
        .filter(|&i| i != country_idx && i != year_idx)
        .collect();
    let indicator_columns: Vec<String> = value_indices
        .iter()
        .map(|&i| table.columns()[i].clone())
        .collect();

    let rows_in = table.len();
    let mut rows: Vec<CleanedRow> = table
        .rows()
        .iter()
        .filter_map(|row| {
            let country_code = parse_country_code(&row[country_idx])?;
            let date_year = whole_year(&row[year_idx])?;
            Some(CleanedRow {
                country_code,
                date_year,
                values: value_indices.iter().map(|&i| row[i].to_number()).collect(),
            })
        })
        .collect();

    let dropped_missing_keys = rows_in - rows.len();
    metrics::clean::rows_dropped(dropped_missing_keys);

    // Stable, so duplicate keys keep their relative order
    rows.sort_by(|a, b| {
        a.country_code
            .cmp(&b.country_code)
            .then(a.date_year.cmp(&b.date_year))
    });

    let cleaned = CleanedTable {
        indicator_columns,
        rows,
    };

    let duplicate_keys = count_duplicate_keys(&cleaned);
    metrics::clean::duplicate_keys(duplicate_keys);

    let missing_by_column = missing_value_summary(&cleaned);
    for (column, count) in &missing_by_column {
        metrics::clean::missing_values(column, *count);
    }

    let report = CleaningReport {
        rows_in,
        dropped_missing_keys,
        duplicate_keys,
        missing_by_column,
        assessed_at: Utc::now(),
    };

    Ok((cleaned, report))
}

/// Number of rows repeating a (country_code, date_year) key seen earlier.
pub fn count_duplicate_keys(table: &CleanedTable) -> usize {
    let mut seen = HashSet::with_capacity(table.len());
    table
        .rows
        .iter()
        .filter(|r| !seen.insert((r.country_code.as_str(), r.date_year)))
        .count()
}

/// Per-column missing counts in header order, omitting complete columns.
pub fn missing_value_summary(table: &CleanedTable) -> Vec<(String, usize)> {
    table
        .indicator_columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let missing = table
                .rows
                .iter()
                .filter(|r| r.values.get(i).copied().flatten().is_none())
                .count();
            (column.clone(), missing)
        })
        .filter(|(_, missing)| *missing > 0)
        .collect()
}

fn parse_country_code(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Text(s) if s.is_empty() => None,
        Cell::Text(s) => Some(s.clone()),
        Cell::Number(n) if !n.is_nan() => Some(n.to_string()),
        _ => None,
    }
}

/// Years must be whole numbers: "2020" and 2020.0 pass, "2020Q1" and 2020.5
/// do not.
fn whole_year(cell: &Cell) -> Option<i32> {
    let n = cell.to_number()?;
    if n.fract() != 0.0 || n < f64::from(i32::MIN) || n > f64::from(i32::MAX) {
        return None;
    }
    Some(n as i32)
}
