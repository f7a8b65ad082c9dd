use crate::constants::{COUNTRY_CODE_COLUMN, DATE_YEAR_COLUMN};
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A single table cell before cleaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Missing,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Convert a JSON scalar from the API into a cell. Null becomes `Missing`.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Missing,
            Value::String(s) => Cell::Text(s.clone()),
            Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Missing),
            Value::Bool(b) => Cell::Text(b.to_string()),
            other => Cell::Text(other.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Missing => true,
            Cell::Number(n) => n.is_nan(),
            Cell::Text(_) => false,
        }
    }

    /// Numeric coercion: unparsable or empty text is `None`, never an error.
    pub fn to_number(&self) -> Option<f64> {
        let n = match self {
            Cell::Missing => return None,
            Cell::Number(n) => *n,
            Cell::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        (!n.is_nan()).then_some(n)
    }

    /// Normalised form used to match join keys.
    fn join_key(&self) -> String {
        match self {
            Cell::Missing => "\u{0}".to_string(),
            Cell::Number(n) if n.is_nan() => "\u{0}".to_string(),
            Cell::Text(s) => format!("t:{s}"),
            Cell::Number(n) => format!("n:{n}"),
        }
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map(Cell::Number).unwrap_or(Cell::Missing)
    }
}

/// A wide table: ordered column names and rows of cells.
///
/// Keys are not unique-enforced; duplicates are carried through and only
/// reported by the cleaner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WideTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl WideTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from rows, checking every row matches the column count.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(PipelineError::Schema(format!(
                "row has {} cells but table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// No rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    pub(crate) fn rename_columns(&mut self, f: impl Fn(&str) -> String) {
        for column in &mut self.columns {
            let renamed = f(column.as_str());
            *column = renamed;
        }
    }

    /// Left join `right` onto `self` on the given key columns.
    ///
    /// Every left row is kept in order. A left row matching several right
    /// rows is repeated once per match; right rows whose key is absent on the
    /// left are dropped. Non-key right columns are appended and must not
    /// already exist on the left.
    pub fn left_join(&self, right: &WideTable, on: &[&str]) -> Result<WideTable> {
        let left_keys = key_indices(self, on)?;
        let right_keys = key_indices(right, on)?;

        let right_values: Vec<usize> = (0..right.columns.len())
            .filter(|i| !right_keys.contains(i))
            .collect();

        let mut columns = self.columns.clone();
        for &i in &right_values {
            let name = &right.columns[i];
            if self.has_column(name) {
                return Err(PipelineError::Schema(format!(
                    "column '{name}' exists on both sides of the join"
                )));
            }
            columns.push(name.clone());
        }

        let mut index: HashMap<Vec<String>, Vec<usize>> = HashMap::new();
        for (row_idx, row) in right.rows.iter().enumerate() {
            let key = right_keys.iter().map(|&k| row[k].join_key()).collect();
            index.entry(key).or_default().push(row_idx);
        }

        let mut joined = WideTable::new(columns);
        for row in &self.rows {
            let key: Vec<String> = left_keys.iter().map(|&k| row[k].join_key()).collect();
            match index.get(&key) {
                Some(matches) => {
                    for &m in matches {
                        let mut out = row.clone();
                        out.extend(right_values.iter().map(|&i| right.rows[m][i].clone()));
                        joined.rows.push(out);
                    }
                }
                None => {
                    let mut out = row.clone();
                    out.extend(right_values.iter().map(|_| Cell::Missing));
                    joined.rows.push(out);
                }
            }
        }

        Ok(joined)
    }

    /// Stack tables row-wise. Columns are the union of all inputs in
    /// first-seen order; cells a table lacks are `Missing`.
    pub fn concat(tables: Vec<WideTable>) -> WideTable {
        let mut columns: Vec<String> = Vec::new();
        for table in &tables {
            for column in &table.columns {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }

        let mut stacked = WideTable::new(columns);
        for table in tables {
            let mapping: Vec<Option<usize>> = stacked
                .columns
                .iter()
                .map(|c| table.column_index(c))
                .collect();
            for row in table.rows {
                let out = mapping
                    .iter()
                    .map(|m| m.map(|i| row[i].clone()).unwrap_or(Cell::Missing))
                    .collect();
                stacked.rows.push(out);
            }
        }
        stacked
    }
}

fn key_indices(table: &WideTable, on: &[&str]) -> Result<Vec<usize>> {
    on.iter()
        .map(|k| {
            table
                .column_index(k)
                .ok_or_else(|| PipelineError::Schema(format!("join key '{k}' not found")))
        })
        .collect()
}

/// One row of the cleaned dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedRow {
    pub country_code: String,
    pub date_year: i32,
    /// One value per indicator column, in `CleanedTable::indicator_columns` order
    pub values: Vec<Option<f64>>,
}

/// The pipeline's durable output: every row has a country code and a whole
/// year, every other field is numeric or missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanedTable {
    pub indicator_columns: Vec<String>,
    pub rows: Vec<CleanedRow>,
}

impl CleanedTable {
    /// Full header: key columns followed by the indicator columns.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = vec![COUNTRY_CODE_COLUMN.to_string(), DATE_YEAR_COLUMN.to_string()];
        columns.extend(self.indicator_columns.iter().cloned());
        columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of an indicator column in a given row; `None` if missing, if
    /// the column does not exist or if the row is short.
    pub fn value(&self, row: usize, column: &str) -> Option<f64> {
        let idx = self.indicator_columns.iter().position(|c| c == column)?;
        self.rows.get(row).and_then(|r| r.values.get(idx).copied().flatten())
    }

    /// Back to a generic wide table, e.g. to run the cleaner again.
    pub fn to_wide(&self) -> WideTable {
        let rows = self
            .rows
            .iter()
            .map(|r| {
                let mut cells = vec![
                    Cell::Text(r.country_code.clone()),
                    Cell::Number(f64::from(r.date_year)),
                ];
                cells.extend(r.values.iter().map(|v| Cell::from(*v)));
                cells
            })
            .collect();
        WideTable {
            columns: self.columns(),
            rows,
        }
    }
}
