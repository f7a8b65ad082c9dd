//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade with Prometheus-style names. No
//! exporter is installed by this crate; without a recorder every call is a
//! no-op.

use std::fmt;

/// All metric names used by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Fetch
    FetchRequestsSuccess,
    FetchRequestsError,
    FetchEmptyResponses,
    FetchObservations,

    // Merge
    MergeIndicatorsSkipped,
    MergeRowsPerCountry,

    // Clean
    CleanRowsDropped,
    CleanDuplicateKeys,
    CleanMissingValues,

    // Load
    LoadRowsInserted,
    LoadBatchesFailed,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::FetchRequestsSuccess => "worldbank_fetch_requests_success_total",
            MetricName::FetchRequestsError => "worldbank_fetch_requests_error_total",
            MetricName::FetchEmptyResponses => "worldbank_fetch_empty_responses_total",
            MetricName::FetchObservations => "worldbank_fetch_observations_total",
            MetricName::MergeIndicatorsSkipped => "worldbank_merge_indicators_skipped_total",
            MetricName::MergeRowsPerCountry => "worldbank_merge_rows_per_country",
            MetricName::CleanRowsDropped => "worldbank_clean_rows_dropped_total",
            MetricName::CleanDuplicateKeys => "worldbank_clean_duplicate_keys_total",
            MetricName::CleanMissingValues => "worldbank_clean_missing_values_total",
            MetricName::LoadRowsInserted => "worldbank_load_rows_inserted_total",
            MetricName::LoadBatchesFailed => "worldbank_load_batches_failed_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub mod fetch {
    use super::MetricName;

    pub fn request_succeeded() {
        ::metrics::counter!(MetricName::FetchRequestsSuccess.as_str()).increment(1);
    }

    pub fn request_failed() {
        ::metrics::counter!(MetricName::FetchRequestsError.as_str()).increment(1);
    }

    /// The API had no observations for a country/indicator pair
    pub fn empty_response() {
        ::metrics::counter!(MetricName::FetchEmptyResponses.as_str()).increment(1);
    }

    pub fn observations_received(count: usize) {
        ::metrics::counter!(MetricName::FetchObservations.as_str()).increment(count as u64);
    }
}

pub mod merge {
    use super::MetricName;

    /// An indicator contributed nothing, with the reason ("empty" or "collision")
    pub fn indicator_skipped(reason: &'static str) {
        ::metrics::counter!(MetricName::MergeIndicatorsSkipped.as_str(), "reason" => reason)
            .increment(1);
    }

    pub fn country_rows(country_code: &str, rows: usize) {
        ::metrics::histogram!(
            MetricName::MergeRowsPerCountry.as_str(),
            "country" => country_code.to_string()
        )
        .record(rows as f64);
    }
}

pub mod clean {
    use super::MetricName;

    pub fn rows_dropped(count: usize) {
        ::metrics::counter!(MetricName::CleanRowsDropped.as_str()).increment(count as u64);
    }

    pub fn duplicate_keys(count: usize) {
        ::metrics::counter!(MetricName::CleanDuplicateKeys.as_str()).increment(count as u64);
    }

    pub fn missing_values(column: &str, count: usize) {
        ::metrics::counter!(
            MetricName::CleanMissingValues.as_str(),
            "column" => column.to_string()
        )
        .increment(count as u64);
    }
}

pub mod load {
    use super::MetricName;

    pub fn rows_inserted(count: usize) {
        ::metrics::counter!(MetricName::LoadRowsInserted.as_str()).increment(count as u64);
    }

    pub fn batch_failed() {
        ::metrics::counter!(MetricName::LoadBatchesFailed.as_str()).increment(1);
    }
}
