use crate::app::ports::HttpClientPort;
use crate::config::Indicator;
use crate::constants::{
    COUNTRY_CODE_COLUMN, OBS_COUNTRY_FIELD, OBS_DATE_FIELD, OBS_VALUE_FIELD, YEAR_COLUMN,
};
use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use crate::types::{Cell, WideTable};
use serde_json::Value;
use tracing::{debug, instrument, warn};

/// One (country, year, value) data point for a single indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorObservation {
    pub country_code: Cell,
    pub year: Cell,
    pub value: Cell,
}

/// Fetches single-indicator time series from the World Bank API.
pub struct WorldBankFetcher {
    http: Box<dyn HttpClientPort>,
    base_url: String,
}

impl WorldBankFetcher {
    pub fn new(http: Box<dyn HttpClientPort>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn indicator_url(&self, country_code: &str, indicator_code: &str) -> String {
        format!(
            "{}/countries/{}/indicators/{}",
            self.base_url, country_code, indicator_code
        )
    }

    /// Fetch page 1 of one indicator for one country as a
    /// `country_code, year, <indicator name>` table.
    ///
    /// An empty table means the API has no data for the pair. Only page 1 is
    /// requested, so longer histories are truncated.
    #[instrument(skip(self, indicator), fields(indicator_code = %indicator.code))]
    pub fn fetch_indicator(&self, country_code: &str, indicator: &Indicator) -> Result<WideTable> {
        let url = self.indicator_url(country_code, &indicator.code);
        let body = match self.http.get_json(&url, &[("format", "json"), ("page", "1")]) {
            Ok(body) => body,
            Err(e) => {
                metrics::fetch::request_failed();
                return Err(e);
            }
        };
        metrics::fetch::request_succeeded();

        let table = parse_indicator_response(&body, &indicator.name)?;
        if table.is_empty() {
            metrics::fetch::empty_response();
            debug!("No observations returned");
        } else {
            metrics::fetch::observations_received(table.len());
            debug!(rows = table.len(), "Fetched observations");
        }
        Ok(table)
    }
}

/// Reshape an API body (`[metadata, observations]`) into an indicator table.
pub fn parse_indicator_response(body: &Value, indicator_name: &str) -> Result<WideTable> {
    let parts = body.as_array().ok_or_else(|| PipelineError::Api {
        message: "expected a JSON array of [metadata, observations]".to_string(),
    })?;

    let columns = vec![
        COUNTRY_CODE_COLUMN.to_string(),
        YEAR_COLUMN.to_string(),
        indicator_name.to_string(),
    ];

    if parts.len() < 2 || parts[1].is_null() {
        return Ok(WideTable::new(columns));
    }

    warn_if_truncated(&parts[0], indicator_name);

    let observations = parse_observations(&parts[1])?;
    let rows = observations
        .into_iter()
        .map(|o| vec![o.country_code, o.year, o.value])
        .collect();
    WideTable::from_rows(columns, rows)
}

fn parse_observations(list: &Value) -> Result<Vec<IndicatorObservation>> {
    let items = list.as_array().ok_or_else(|| PipelineError::Api {
        message: "observation list is not an array".to_string(),
    })?;
    if items.is_empty() {
        return Ok(Vec::new());
    }

    // A field absent from every observation means the payload is not what we
    // expect; absent from a few just leaves gaps.
    for field in [OBS_COUNTRY_FIELD, OBS_DATE_FIELD, OBS_VALUE_FIELD] {
        if !items.iter().any(|o| o.get(field).is_some()) {
            return Err(PipelineError::MissingField(format!(
                "{field} not found in observations"
            )));
        }
    }

    Ok(items
        .iter()
        .map(|o| IndicatorObservation {
            country_code: o.get(OBS_COUNTRY_FIELD).map(Cell::from_json).unwrap_or(Cell::Missing),
            year: o.get(OBS_DATE_FIELD).map(Cell::from_json).unwrap_or(Cell::Missing),
            value: o.get(OBS_VALUE_FIELD).map(Cell::from_json).unwrap_or(Cell::Missing),
        })
        .collect())
}

/// True when the metadata reports more than the single page we fetch.
fn is_truncated(metadata: &Value) -> bool {
    metadata
        .get("pages")
        .and_then(page_count)
        .is_some_and(|pages| pages > 1)
}

fn warn_if_truncated(metadata: &Value, indicator_name: &str) {
    if is_truncated(metadata) {
        let pages = metadata.get("pages").and_then(page_count).unwrap_or(0);
        let total = metadata.get("total").and_then(page_count).unwrap_or(0);
        warn!(
            indicator = indicator_name,
            pages, total, "Only page 1 fetched; indicator history is truncated"
        );
    }
}

// The API reports counts as numbers or numeric strings depending on version.
fn page_count(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok()))
}
