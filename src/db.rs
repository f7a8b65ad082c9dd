//! Loader: bulk insert of the cleaned CSV into a relational table.
//!
//! Runs on its own, reading only the CSV artifact. One transaction, one
//! commit; any failing row aborts the whole batch.

use crate::config::ColumnSelection;
use crate::constants::{COUNTRY_CODE_COLUMN, DATE_YEAR_COLUMN};
use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use crate::storage::read_csv;
use crate::types::CleanedTable;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use tracing::{info, instrument, warn};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"));

/// Which CSV field feeds each insert column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan {
    /// Insert column names, in statement order
    pub columns: Vec<String>,
    /// For each insert column after the two keys: index into the table's
    /// indicator values
    value_indices: Vec<usize>,
    /// CSV columns that are not inserted
    pub skipped_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub table: String,
    pub rows_inserted: usize,
    pub columns: Vec<String>,
    pub skipped_columns: Vec<String>,
}

/// Resolve the insert column list against the CSV header.
///
/// `FromFile` inserts every CSV column. `Explicit` inserts exactly the named
/// columns; each must be present in the CSV and must start with
/// `country_code, date_year`. CSV columns left out are reported as skipped.
pub fn plan_columns(data: &CleanedTable, selection: &ColumnSelection) -> Result<LoadPlan> {
    let plan = match selection {
        ColumnSelection::FromFile => LoadPlan {
            columns: data.columns(),
            value_indices: (0..data.indicator_columns.len()).collect(),
            skipped_columns: Vec::new(),
        },
        ColumnSelection::Explicit(wanted) => {
            if wanted.len() < 2 || wanted[0] != COUNTRY_CODE_COLUMN || wanted[1] != DATE_YEAR_COLUMN {
                return Err(PipelineError::Config(format!(
                    "insert columns must start with {}, {}",
                    COUNTRY_CODE_COLUMN, DATE_YEAR_COLUMN
                )));
            }
            let value_indices = wanted[2..]
                .iter()
                .map(|name| {
                    data.indicator_columns
                        .iter()
                        .position(|c| c == name)
                        .ok_or_else(|| {
                            PipelineError::Config(format!("insert column '{name}' is not in the CSV"))
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            let skipped_columns = data
                .indicator_columns
                .iter()
                .filter(|c| !wanted.contains(*c))
                .cloned()
                .collect();
            LoadPlan {
                columns: wanted.clone(),
                value_indices,
                skipped_columns,
            }
        }
    };

    for column in &plan.columns {
        check_identifier(column)?;
    }
    Ok(plan)
}

fn check_identifier(name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(PipelineError::Config(format!("'{name}' is not a valid SQL identifier")))
    }
}

/// The `INSERT` statement for a plan, with positional placeholders.
pub fn insert_sql(table: &str, columns: &[String]) -> Result<String> {
    check_identifier(table)?;
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders
    ))
}

/// `CREATE TABLE IF NOT EXISTS` for the destination table.
pub fn create_table_sql(table: &str, columns: &[String]) -> Result<String> {
    check_identifier(table)?;
    let mut defs = Vec::with_capacity(columns.len());
    for column in columns {
        check_identifier(column)?;
        let def = match column.as_str() {
            COUNTRY_CODE_COLUMN => format!("{column} TEXT NOT NULL"),
            DATE_YEAR_COLUMN => format!("{column} INTEGER NOT NULL"),
            _ => format!("{column} REAL"),
        };
        defs.push(def);
    }
    Ok(format!("CREATE TABLE IF NOT EXISTS {} ({})", table, defs.join(", ")))
}

/// Connection to the destination database. The connection is closed when
/// this value is dropped, on success and failure alike.
pub struct DestinationDb {
    conn: Connection,
}

impl DestinationDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn create_table(&self, table: &str, columns: &[String]) -> Result<()> {
        let sql = create_table_sql(table, columns)?;
        self.conn.execute_batch(&sql)?;
        info!(table, columns = columns.len(), "Destination table ready");
        Ok(())
    }

    /// Insert every row in one transaction. Missing values bind as NULL.
    /// On any error the transaction is rolled back and nothing is kept.
    pub fn bulk_insert(&mut self, table: &str, data: &CleanedTable, plan: &LoadPlan) -> Result<usize> {
        let sql = insert_sql(table, &plan.columns)?;
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in &data.rows {
                let mut params: Vec<SqlValue> = Vec::with_capacity(plan.columns.len());
                params.push(SqlValue::Text(row.country_code.clone()));
                params.push(SqlValue::Integer(i64::from(row.date_year)));
                for &i in &plan.value_indices {
                    let value = row.values.get(i).ok_or_else(|| {
                        PipelineError::Schema(format!(
                            "row {} {} has {} values but table has {} indicator columns",
                            row.country_code,
                            row.date_year,
                            row.values.len(),
                            data.indicator_columns.len()
                        ))
                    })?;
                    params.push(match value {
                        Some(v) => SqlValue::Real(*v),
                        None => SqlValue::Null,
                    });
                }
                stmt.execute(params_from_iter(params.iter()))?;
            }
        }
        tx.commit()?;
        Ok(data.len())
    }

    pub fn count_rows(&self, table: &str) -> Result<usize> {
        check_identifier(table)?;
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
        Ok(n as usize)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Read the cleaned CSV and insert all of it into `table`.
#[instrument(skip(csv_path, db_path, selection), fields(csv = %csv_path.display(), db = %db_path.display()))]
pub fn load_csv(
    csv_path: &Path,
    db_path: &Path,
    table: &str,
    selection: &ColumnSelection,
) -> Result<LoadSummary> {
    let data = read_csv(csv_path)?;
    let plan = plan_columns(&data, selection)?;
    if !plan.skipped_columns.is_empty() {
        warn!(
            skipped = ?plan.skipped_columns,
            "CSV columns not in the insert column list are not loaded"
        );
    }

    let mut db = DestinationDb::open(db_path)?;
    let rows_inserted = match db.bulk_insert(table, &data, &plan) {
        Ok(n) => n,
        Err(e) => {
            metrics::load::batch_failed();
            return Err(e);
        }
    };
    metrics::load::rows_inserted(rows_inserted);
    info!(table, rows = rows_inserted, "Data loaded successfully");

    Ok(LoadSummary {
        table: table.to_string(),
        rows_inserted,
        columns: plan.columns,
        skipped_columns: plan.skipped_columns,
    })
}
