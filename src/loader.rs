use crate::config::Config;
use crate::error::{Feed, LoadError};
use crate::fetch::FeedSource;
use crate::normalize::{
    daily_records, hourly_records, monthly_records, normalize_table, split_utility, FeedStats,
    FieldSpec, NormalizedTable, RawTable, ENERGY, PLANT, SOLAR_FIELDS, UTILITY_ENERGY,
    UTILITY_FIELDS,
};
use crate::reports::estimate_hourly_consumption;
use crate::types::{Dataset, Plant};
use chrono::Local;
use csv::ReaderBuilder;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// What normalization had to absorb, per feed.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub monthly: FeedStats,
    pub daily: FeedStats,
    pub hourly: FeedStats,
    pub utility: FeedStats,
    pub cost_overrides: BTreeMap<Plant, f64>,
}

impl LoadReport {
    pub fn stats(&self, feed: Feed) -> &FeedStats {
        match feed {
            Feed::SolarMonthly => &self.monthly,
            Feed::SolarDaily => &self.daily,
            Feed::SolarHourly => &self.hourly,
            Feed::Utility => &self.utility,
        }
    }

    pub fn feeds(&self) -> [(Feed, &FeedStats); 4] {
        Feed::ALL.map(|feed| (feed, self.stats(feed)))
    }

    pub fn total_rows(&self) -> usize {
        self.feeds().iter().map(|(_, s)| s.total_rows).sum()
    }

    pub fn dropped_rows(&self) -> usize {
        self.feeds().iter().map(|(_, s)| s.dropped_rows).sum()
    }

    pub fn defaulted_cells(&self) -> usize {
        self.feeds().iter().map(|(_, s)| s.defaulted_cells).sum()
    }
}

/// Parse CSV text into a string table. Ragged rows are accepted; blank
/// header cells are kept as empty names.
pub fn read_table(text: &str, feed: Feed) -> Result<RawTable, LoadError> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = rdr
        .headers()
        .map_err(|source| LoadError::Csv { feed, source })?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|source| LoadError::Csv { feed, source })?;
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(|c| c.to_string()).collect());
    }
    Ok(RawTable::new(headers, rows))
}

/// Fetch one feed and normalize it against `fields`.
///
/// A table that has neither an energy column nor a plant column under any
/// alias is not the table we asked for, so the load fails instead of
/// producing an all-zero dataset.
fn fetch_normalized(
    source: &dyn FeedSource,
    feed: Feed,
    fields: &[FieldSpec],
    energy_field: &'static str,
) -> Result<NormalizedTable, LoadError> {
    let text = source.fetch(feed)?;
    let raw = read_table(&text, feed)?;
    debug!(%feed, headers = ?raw.headers, rows = raw.rows.len(), "parsed");
    let table = normalize_table(raw, fields);
    if table.is_missing(energy_field) && table.is_missing(PLANT) {
        return Err(LoadError::MissingColumn {
            feed,
            column: energy_field.to_string(),
        });
    }
    if !table.missing_fields.is_empty() {
        warn!(%feed, missing = ?table.missing_fields, "columns filled with defaults");
    }
    Ok(table)
}

/// Fetch and normalize all four feeds into a fresh `Dataset`.
///
/// Any fetch or parse failure aborts the whole load. Unit costs start from
/// the configured defaults and are replaced by positive values found in the
/// utility feed.
pub fn load_dataset(
    source: &dyn FeedSource,
    cfg: &Config,
) -> Result<(Dataset, LoadReport), LoadError> {
    let monthly_t = fetch_normalized(source, Feed::SolarMonthly, SOLAR_FIELDS, ENERGY)?;
    let daily_t = fetch_normalized(source, Feed::SolarDaily, SOLAR_FIELDS, ENERGY)?;
    let hourly_t = fetch_normalized(source, Feed::SolarHourly, SOLAR_FIELDS, ENERGY)?;
    let utility_t = fetch_normalized(source, Feed::Utility, UTILITY_FIELDS, UTILITY_ENERGY)?;

    let (monthly, monthly_stats) = monthly_records(&monthly_t);
    let (daily, daily_stats) = daily_records(&daily_t);
    let (hourly, hourly_stats) = hourly_records(&hourly_t);
    let (utility, utility_stats) = split_utility(&utility_t);

    let mut costs = cfg.costs.to_table();
    costs.apply_overrides(&utility.cost_overrides);
    let hourly_estimate = estimate_hourly_consumption(&utility.consumption);

    let report = LoadReport {
        monthly: monthly_stats,
        daily: daily_stats,
        hourly: hourly_stats,
        utility: utility_stats,
        cost_overrides: utility.cost_overrides,
    };
    for (feed, stats) in report.feeds() {
        info!(
            %feed,
            rows = stats.total_rows,
            kept = stats.kept_rows,
            dropped = stats.dropped_rows,
            defaulted = stats.defaulted_cells,
            "normalized"
        );
    }

    let dataset = Dataset {
        monthly,
        daily,
        hourly,
        consumption: utility.consumption,
        hourly_estimate,
        costs,
        historical_averages: utility.historical_averages,
        loaded_at: Local::now(),
    };
    Ok((dataset, report))
}
