use anyhow::Result;
use std::fs;
use tempfile::tempdir;
use worldbank_pipeline::config::{ColumnSelection, Config};
use worldbank_pipeline::constants::LEGACY_HEALTH_ECONOMY_COLUMNS;
use worldbank_pipeline::db::{load_csv, DestinationDb};
use worldbank_pipeline::error::PipelineError;

const CSV: &str = "\
country_code,date_year,life_expectancy,gni_per_capita_usd,gdp_usd
CAN,2019,82.2,46370,1.74e12
CAN,2020,81.7,,1640000000000
USA,2020,,64140,
";

fn legacy() -> ColumnSelection {
    ColumnSelection::Explicit(LEGACY_HEALTH_ECONOMY_COLUMNS.iter().map(|c| c.to_string()).collect())
}

#[test]
fn test_load_full_column_set() -> Result<()> {
    let dir = tempdir()?;
    let csv_path = dir.path().join("clean.csv");
    let db_path = dir.path().join("warehouse.db");
    fs::write(&csv_path, CSV)?;

    {
        let db = DestinationDb::open(&db_path)?;
        db.create_table(
            "health_economy",
            &["country_code", "date_year", "life_expectancy", "gni_per_capita_usd", "gdp_usd"]
                .map(String::from),
        )?;
    }

    let summary = load_csv(&csv_path, &db_path, "health_economy", &ColumnSelection::FromFile)?;
    assert_eq!(summary.rows_inserted, 3);
    assert_eq!(summary.columns.len(), 5);
    assert!(summary.skipped_columns.is_empty());

    let db = DestinationDb::open(&db_path)?;
    assert_eq!(db.count_rows("health_economy")?, 3);
    let (year, life, gdp): (i64, Option<f64>, Option<f64>) = db.connection().query_row(
        "SELECT date_year, life_expectancy, gdp_usd FROM health_economy WHERE country_code = 'USA'",
        [],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )?;
    assert_eq!(year, 2020);
    assert_eq!(life, None);
    assert_eq!(gdp, None);
    Ok(())
}

#[test]
fn test_every_run_reinserts_all_rows() -> Result<()> {
    let dir = tempdir()?;
    let csv_path = dir.path().join("clean.csv");
    let db_path = dir.path().join("warehouse.db");
    fs::write(&csv_path, CSV)?;

    let columns = ["country_code", "date_year", "life_expectancy", "gni_per_capita_usd", "gdp_usd"]
        .map(String::from);
    DestinationDb::open(&db_path)?.create_table("health_economy", &columns)?;

    load_csv(&csv_path, &db_path, "health_economy", &ColumnSelection::FromFile)?;
    load_csv(&csv_path, &db_path, "health_economy", &ColumnSelection::FromFile)?;
    assert_eq!(DestinationDb::open(&db_path)?.count_rows("health_economy")?, 6);
    Ok(())
}

#[test]
fn test_legacy_subset_requires_its_columns() -> Result<()> {
    let dir = tempdir()?;
    let csv_path = dir.path().join("clean.csv");
    let db_path = dir.path().join("warehouse.db");
    fs::write(&csv_path, CSV)?;

    // the small CSV lacks most legacy columns
    let err = load_csv(&csv_path, &db_path, "health_economy", &legacy()).unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
    Ok(())
}

#[test]
fn test_legacy_subset_skips_extra_indicators() -> Result<()> {
    let dir = tempdir()?;
    let csv_path = dir.path().join("clean.csv");
    let db_path = dir.path().join("warehouse.db");

    // full default indicator header: legacy columns plus the three it omits
    let config = Config::default();
    let mut header = vec!["country_code".to_string(), "date_year".to_string()];
    header.extend(config.indicators.iter().map(|i| i.name.clone()));
    let mut row = vec!["MEX".to_string(), "2020".to_string()];
    row.extend((0..config.indicators.len()).map(|i| i.to_string()));
    fs::write(&csv_path, format!("{}\n{}\n", header.join(","), row.join(",")))?;

    let legacy_columns: Vec<String> = LEGACY_HEALTH_ECONOMY_COLUMNS.iter().map(|c| c.to_string()).collect();
    DestinationDb::open(&db_path)?.create_table("health_economy", &legacy_columns)?;

    let summary = load_csv(&csv_path, &db_path, "health_economy", &legacy())?;
    assert_eq!(summary.rows_inserted, 1);
    assert_eq!(summary.columns, legacy_columns);
    assert_eq!(
        summary.skipped_columns,
        vec!["gni_per_capita_usd", "exports_percent_gdp", "imports_percent_gdp"]
    );

    // values land in the right columns despite the skipped ones
    let db = DestinationDb::open(&db_path)?;
    let inflation: f64 = db.connection().query_row(
        "SELECT inflation_percent FROM health_economy",
        [],
        |r| r.get(0),
    )?;
    let expected = config
        .indicators
        .iter()
        .position(|i| i.name == "inflation_percent")
        .unwrap() as f64;
    assert_eq!(inflation, expected);
    Ok(())
}

#[test]
fn test_missing_destination_table_fails_without_partial_rows() -> Result<()> {
    let dir = tempdir()?;
    let csv_path = dir.path().join("clean.csv");
    let db_path = dir.path().join("warehouse.db");
    fs::write(&csv_path, CSV)?;

    let err = load_csv(&csv_path, &db_path, "health_economy", &ColumnSelection::FromFile).unwrap_err();
    assert!(matches!(err, PipelineError::Database(_)));
    Ok(())
}

#[test]
fn test_malformed_csv_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let csv_path = dir.path().join("clean.csv");
    let db_path = dir.path().join("warehouse.db");
    fs::write(&csv_path, "country_code,date_year,gdp_usd\nUSA,twenty,1\n")?;

    let err = load_csv(&csv_path, &db_path, "health_economy", &ColumnSelection::FromFile).unwrap_err();
    assert!(matches!(err, PipelineError::MalformedCsv(_)));
    Ok(())
}
