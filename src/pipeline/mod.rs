// Extract pipeline: fetch, merge, clean, write CSV

pub mod merge;
pub mod quality_gate;

use crate::apis::worldbank::WorldBankFetcher;
use crate::app::ports::HttpClientPort;
use crate::config::Config;
use crate::error::Result;
use crate::storage::write_csv;
use crate::types::CleanedTable;
use quality_gate::CleaningReport;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, instrument};

pub use merge::{merged_database, retrieve_data_country};
pub use quality_gate::clean_validate_dataset;

/// Result of a complete extract run
#[derive(Debug, Serialize)]
pub struct ExtractResult {
    pub countries: usize,
    pub indicators: usize,
    pub combined_rows: usize,
    pub output_file: PathBuf,
    pub report: CleaningReport,
    #[serde(skip)]
    pub cleaned: CleanedTable,
}

pub struct Pipeline;

impl Pipeline {
    /// Fetch and merge every configured country, clean the combined table
    /// and write it to `output`. Stops at the first transport error.
    #[instrument(skip(config, http, output), fields(output_path = %output.display()))]
    pub fn run_extract(
        config: &Config,
        http: Box<dyn HttpClientPort>,
        output: &Path,
    ) -> Result<ExtractResult> {
        let start = Instant::now();
        let fetcher = WorldBankFetcher::new(http, config.api.base_url.clone());

        info!(
            countries = config.countries.len(),
            indicators = config.indicators.len(),
            "Starting extract"
        );

        let combined = merged_database(&fetcher, &config.countries, &config.indicators)?;
        info!(
            rows = combined.len(),
            columns = combined.columns().len(),
            "Combined dataset built"
        );

        let (cleaned, report) = clean_validate_dataset(&combined)?;
        report.log();

        write_csv(&cleaned, output)?;
        info!(elapsed = ?start.elapsed(), "Extract finished");

        Ok(ExtractResult {
            countries: config.countries.len(),
            indicators: config.indicators.len(),
            combined_rows: combined.len(),
            output_file: output.to_path_buf(),
            report,
            cleaned,
        })
    }
}
