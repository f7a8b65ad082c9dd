use crate::apis::worldbank::WorldBankFetcher;
use crate::config::{Country, Indicator};
use crate::constants::{COUNTRY_CODE_COLUMN, YEAR_COLUMN};
use crate::error::Result;
use crate::observability::metrics;
use crate::types::WideTable;
use tracing::{debug, info, info_span, instrument};

/// What happened to one indicator while building a country table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStep {
    /// The API returned no observations
    SkippedEmpty,
    /// First indicator with data; its (country, year) rows become the row set
    Seeded,
    /// Left-joined onto the accumulated table
    Joined,
    /// A column with the same name already exists; nothing is added
    SkippedCollision,
}

/// Fold one indicator table into the accumulator.
///
/// The row universe is fixed by whichever indicator seeds the accumulator:
/// later indicators only fill (country, year) pairs that already exist.
pub fn merge_indicator(
    accumulator: &mut WideTable,
    indicator_table: WideTable,
    indicator_name: &str,
) -> Result<MergeStep> {
    if indicator_table.is_empty() {
        return Ok(MergeStep::SkippedEmpty);
    }

    if accumulator.is_empty() {
        *accumulator = indicator_table;
        return Ok(MergeStep::Seeded);
    }

    if accumulator.has_column(indicator_name) {
        return Ok(MergeStep::SkippedCollision);
    }

    *accumulator = accumulator.left_join(&indicator_table, &[COUNTRY_CODE_COLUMN, YEAR_COLUMN])?;
    Ok(MergeStep::Joined)
}

/// Fetch every configured indicator for one country and merge them into a
/// wide table keyed by (country_code, year). Empty if no indicator had data.
#[instrument(skip(fetcher, indicators))]
pub fn retrieve_data_country(
    fetcher: &WorldBankFetcher,
    country_code: &str,
    indicators: &[Indicator],
) -> Result<WideTable> {
    let mut accumulator = WideTable::default();

    for indicator in indicators {
        let table = fetcher.fetch_indicator(country_code, indicator)?;
        match merge_indicator(&mut accumulator, table, &indicator.name)? {
            MergeStep::SkippedEmpty => {
                metrics::merge::indicator_skipped("empty");
                debug!(indicator = %indicator.name, "No data, skipping");
            }
            MergeStep::SkippedCollision => {
                metrics::merge::indicator_skipped("collision");
                debug!(indicator = %indicator.name, "Column already present, skipping");
            }
            MergeStep::Seeded => {
                debug!(indicator = %indicator.name, rows = accumulator.len(), "Seeded country table");
            }
            MergeStep::Joined => {}
        }
    }

    metrics::merge::country_rows(country_code, accumulator.len());
    Ok(accumulator)
}

/// Build the combined table: one merged table per country, stacked in
/// configuration order with no deduplication.
pub fn merged_database(
    fetcher: &WorldBankFetcher,
    countries: &[Country],
    indicators: &[Indicator],
) -> Result<WideTable> {
    let mut tables = Vec::with_capacity(countries.len());

    for country in countries {
        let span = info_span!("country", code = %country.code);
        let _enter = span.enter();

        let table = retrieve_data_country(fetcher, &country.code, indicators)?;
        info!(
            country = %country.name,
            rows = table.len(),
            columns = table.columns().len(),
            "Merged country table"
        );
        tables.push(table);
    }

    Ok(WideTable::concat(tables))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cell;

    fn indicator_table(name: &str, rows: &[(&str, &str, Option<f64>)]) -> WideTable {
        WideTable::from_rows(
            vec!["country_code".into(), "year".into(), name.into()],
            rows.iter()
                .map(|(c, y, v)| vec![Cell::Text(c.to_string()), Cell::Text(y.to_string()), Cell::from(*v)])
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_first_non_empty_indicator_seeds() {
        let mut acc = WideTable::default();
        let empty = WideTable::new(vec!["country_code".into(), "year".into(), "a".into()]);

        assert_eq!(merge_indicator(&mut acc, empty, "a").unwrap(), MergeStep::SkippedEmpty);
        assert!(acc.is_empty());

        let b = indicator_table("b", &[("USA", "2020", Some(1.0))]);
        assert_eq!(merge_indicator(&mut acc, b, "b").unwrap(), MergeStep::Seeded);
        assert_eq!(acc.columns(), &["country_code", "year", "b"]);
    }

    #[test]
    fn test_later_indicator_cannot_add_years() {
        let mut acc = WideTable::default();
        let a = indicator_table("a", &[("USA", "2019", Some(1.0)), ("USA", "2020", Some(2.0))]);
        let b = indicator_table(
            "b",
            &[("USA", "2018", Some(8.0)), ("USA", "2020", Some(20.0)), ("USA", "2021", Some(21.0))],
        );

        merge_indicator(&mut acc, a, "a").unwrap();
        assert_eq!(merge_indicator(&mut acc, b, "b").unwrap(), MergeStep::Joined);

        assert_eq!(acc.len(), 2);
        let years: Vec<_> = (0..acc.len()).map(|i| acc.get(i, "year").cloned()).collect();
        assert_eq!(
            years,
            vec![Some(Cell::Text("2019".into())), Some(Cell::Text("2020".into()))]
        );
        assert_eq!(acc.get(0, "b"), Some(&Cell::Missing));
        assert_eq!(acc.get(1, "b"), Some(&Cell::Number(20.0)));
    }

    #[test]
    fn test_colliding_column_is_skipped() {
        let mut acc = WideTable::default();
        merge_indicator(&mut acc, indicator_table("a", &[("USA", "2020", Some(1.0))]), "a").unwrap();

        let step = merge_indicator(&mut acc, indicator_table("a", &[("USA", "2020", Some(99.0))]), "a")
            .unwrap();
        assert_eq!(step, MergeStep::SkippedCollision);
        assert_eq!(acc.columns().len(), 3);
        assert_eq!(acc.get(0, "a"), Some(&Cell::Number(1.0)));
    }
}
