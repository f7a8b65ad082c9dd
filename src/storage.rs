//! CSV persistence of the cleaned dataset.
//!
//! Layout: `country_code,date_year,<indicator columns...>`, one row per
//! observation row, missing values as empty fields.

use crate::constants::{COUNTRY_CODE_COLUMN, DATE_YEAR_COLUMN};
use crate::error::{PipelineError, Result};
use crate::types::{CleanedRow, CleanedTable};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

pub fn write_csv(table: &CleanedTable, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    write_csv_to(table, file)?;
    info!(path = %path.display(), rows = table.len(), "Clean dataset saved");
    Ok(())
}

pub fn write_csv_to<W: Write>(table: &CleanedTable, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(table.columns())?;

    for row in &table.rows {
        let mut record = Vec::with_capacity(row.values.len() + 2);
        record.push(row.country_code.clone());
        record.push(row.date_year.to_string());
        record.extend(row.values.iter().map(|v| v.map(|n| n.to_string()).unwrap_or_default()));
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn read_csv(path: &Path) -> Result<CleanedTable> {
    let file = File::open(path).map_err(|e| {
        PipelineError::MalformedCsv(format!("Failed to open '{}': {e}", path.display()))
    })?;
    read_csv_from(file)
}

pub fn read_csv_from<R: Read>(reader: R) -> Result<CleanedTable> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);

    let headers = rdr.headers()?.clone();
    if headers.get(0) != Some(COUNTRY_CODE_COLUMN) || headers.get(1) != Some(DATE_YEAR_COLUMN) {
        return Err(PipelineError::MalformedCsv(format!(
            "header must start with {},{}",
            COUNTRY_CODE_COLUMN, DATE_YEAR_COLUMN
        )));
    }
    let indicator_columns: Vec<String> = headers.iter().skip(2).map(str::to_string).collect();

    let mut rows = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        // +2: 1-indexed plus header
        let line = line + 2;

        let country_code = record.get(0).unwrap_or_default().to_string();
        if country_code.is_empty() {
            return Err(PipelineError::MalformedCsv(format!(
                "line {line}: empty country_code"
            )));
        }
        let date_year = record
            .get(1)
            .unwrap_or_default()
            .parse::<i32>()
            .map_err(|e| PipelineError::MalformedCsv(format!("line {line}: bad date_year: {e}")))?;

        let values = record
            .iter()
            .skip(2)
            .enumerate()
            .map(|(i, field)| {
                if field.is_empty() {
                    return Ok(None);
                }
                field.parse::<f64>().map(Some).map_err(|e| {
                    PipelineError::MalformedCsv(format!(
                        "line {line}: bad value '{field}' in {}: {e}",
                        indicator_columns[i]
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        rows.push(CleanedRow {
            country_code,
            date_year,
            values,
        });
    }

    Ok(CleanedTable {
        indicator_columns,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CleanedTable {
        CleanedTable {
            indicator_columns: vec!["life_expectancy".into(), "gdp_usd".into()],
            rows: vec![
                CleanedRow {
                    country_code: "CAN".into(),
                    date_year: 2020,
                    values: vec![Some(81.7), None],
                },
                CleanedRow {
                    country_code: "USA".into(),
                    date_year: 2021,
                    values: vec![None, Some(23_315_080_560_000.0)],
                },
            ],
        }
    }

    #[test]
    fn test_missing_values_are_empty_fields() {
        let mut buf = Vec::new();
        write_csv_to(&sample(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "country_code,date_year,life_expectancy,gdp_usd");
        assert_eq!(lines[1], "CAN,2020,81.7,");
        assert_eq!(lines[2], "USA,2021,,23315080560000");
    }

    #[test]
    fn test_round_trip_preserves_rows_and_gaps() {
        let mut buf = Vec::new();
        write_csv_to(&sample(), &mut buf).unwrap();
        let back = read_csv_from(buf.as_slice()).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_rejects_unexpected_header() {
        let err = read_csv_from("year,country_code\n2020,USA\n".as_bytes()).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedCsv(_)));
    }

    #[test]
    fn test_rejects_non_numeric_value() {
        let err = read_csv_from("country_code,date_year,gdp\nUSA,2020,abc\n".as_bytes()).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedCsv(_)));
    }
}
