// Header normalization and canonical record builders.
//
// Spreadsheet exports arrive with inconsistent headers (casing, accents,
// historical spellings), free-text plant names and mixed number formats.
// Everything here turns a `RawTable` into canonical records without ever
// failing on an individual cell: bad cells default, bad keys drop the row.
use crate::types::{
    DailyRecord, HourlyRecord, MonthlyRecord, Plant, PlantId, UtilityKind, UtilityRecord,
};
use crate::util::{
    coerce_kwh, coerce_number, parse_date_safe, parse_hour, parse_i32_safe, parse_month,
    strip_accents,
};
use chrono::Datelike;
use serde::Serialize;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Raw tables
// ---------------------------------------------------------------------------

/// A rectangular table of string cells, as read from a CSV export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        RawTable { headers, rows }
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell of `row` under header `name`; short rows read as missing.
    pub fn cell<'a>(&self, row: &'a [String], name: &str) -> Option<&'a str> {
        self.column(name)
            .and_then(|idx| row.get(idx))
            .map(|s| s.as_str())
    }
}

// ---------------------------------------------------------------------------
// Canonical vocabulary
// ---------------------------------------------------------------------------

pub const YEAR: &str = "anio";
pub const MONTH: &str = "mes";
pub const PLANT: &str = "planta";
pub const ENERGY: &str = "energia_kwh";
pub const UTILITY_ENERGY: &str = "epm_kwh";
pub const DATE: &str = "fecha";
pub const HOUR: &str = "hora";
pub const KIND: &str = "tipo";

/// A canonical column, the header spellings that feed it (first match wins)
/// and the value used when none of them is present.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub canonical: &'static str,
    pub aliases: &'static [&'static str],
    pub default: &'static str,
}

const fn field(
    canonical: &'static str,
    aliases: &'static [&'static str],
    default: &'static str,
) -> FieldSpec {
    FieldSpec {
        canonical,
        aliases,
        default,
    }
}

pub const SOLAR_FIELDS: &[FieldSpec] = &[
    field(YEAR, &["ano", "year"], "0"),
    field(MONTH, &["month", "mes_num"], "0"),
    field(PLANT, &["sede", "plant"], ""),
    field(ENERGY, &["energia (kwh)", "energia", "kwh", "energy_kwh"], "0"),
    field(DATE, &["dia", "date"], ""),
    field(HOUR, &["hora_num", "hour"], ""),
];

pub const UTILITY_FIELDS: &[FieldSpec] = &[
    field(YEAR, &["ano", "year"], "0"),
    field(MONTH, &["month", "mes_num"], "0"),
    field(PLANT, &["sede", "plant"], ""),
    field(
        UTILITY_ENERGY,
        &["consumo_kwh", "epm (kwh)", "energia_kwh", "consumo"],
        "0",
    ),
    field(DATE, &["date"], ""),
    field(KIND, &["kind"], ""),
];

/// Lower-case, trimmed, accent-free header: `" Año "` becomes `"ano"`.
pub fn normalize_header(h: &str) -> String {
    strip_accents(h.trim()).to_lowercase()
}

/// A table whose headers are normalized and which carries every canonical
/// field of its vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    pub table: RawTable,
    /// Canonical fields for which no header alias was found.
    pub missing_fields: Vec<&'static str>,
}

impl NormalizedTable {
    pub fn is_missing(&self, field: &str) -> bool {
        self.missing_fields.iter().any(|f| *f == field)
    }

    fn get<'a>(&self, row: &'a [String], field: &str) -> Option<&'a str> {
        self.table.cell(row, field)
    }
}

/// Normalize headers and resolve aliases into canonical columns.
///
/// Columns outside the vocabulary pass through untouched. A canonical field
/// with no matching header is added filled with its default.
pub fn normalize_table(raw: RawTable, fields: &[FieldSpec]) -> NormalizedTable {
    let RawTable { headers, mut rows } = raw;
    let mut headers: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    let mut missing_fields = Vec::new();

    for spec in fields {
        if headers.iter().any(|h| h == spec.canonical) {
            continue;
        }
        let source = spec
            .aliases
            .iter()
            .find_map(|alias| headers.iter().position(|h| h == alias));
        match source {
            Some(idx) => {
                for row in rows.iter_mut() {
                    let value = row.get(idx).cloned().unwrap_or_default();
                    pad_row(row, headers.len());
                    row.push(value);
                }
            }
            None => {
                missing_fields.push(spec.canonical);
                for row in rows.iter_mut() {
                    pad_row(row, headers.len());
                    row.push(spec.default.to_string());
                }
            }
        }
        headers.push(spec.canonical.to_string());
    }

    NormalizedTable {
        table: RawTable { headers, rows },
        missing_fields,
    }
}

fn pad_row(row: &mut Vec<String>, len: usize) {
    if row.len() < len {
        row.resize(len, String::new());
    }
}

// ---------------------------------------------------------------------------
// Plants and row kinds
// ---------------------------------------------------------------------------

const PLANT_ALIASES: &[(&str, Plant)] = &[
    ("CAFE", Plant::Cafe),
    ("PLANTA CAFE", Plant::Cafe),
    ("SEDE CAFE", Plant::Cafe),
    ("CAFETERIA", Plant::Cafe),
    ("MERCADO", Plant::Mercado),
    ("PLANTA MERCADO", Plant::Mercado),
    ("SEDE MERCADO", Plant::Mercado),
    ("MERC", Plant::Mercado),
    ("SUPERMERCADO", Plant::Mercado),
];

/// Map a free-text plant label to its canonical identifier.
///
/// Exact aliases first, then containment of `CAFE`/`MERCADO`; anything else
/// is kept as its cleaned upper-case text. Blank labels are `TOTAL`.
pub fn canonicalize_plant(label: &str) -> PlantId {
    let cleaned = strip_accents(label)
        .to_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if cleaned.is_empty() || matches!(cleaned.as_str(), "NAN" | "NONE" | "NULL") {
        return PlantId::total();
    }
    if let Some((_, plant)) = PLANT_ALIASES.iter().find(|(alias, _)| *alias == cleaned) {
        return PlantId::Known(*plant);
    }
    if cleaned.contains("CAFE") {
        PlantId::Known(Plant::Cafe)
    } else if cleaned.contains("MERCADO") {
        PlantId::Known(Plant::Mercado)
    } else {
        PlantId::Other(cleaned)
    }
}

/// Classify a utility row by its free-text kind label.
///
/// Labels that match none of the known words are treated as consumption.
pub fn classify_kind(label: &str) -> UtilityKind {
    let l = strip_accents(label).to_lowercase();
    if l.contains("costo") || l.contains("valor") {
        UtilityKind::UnitCost
    } else if l.contains("promedio") || l.contains("historico") {
        UtilityKind::HistoricalAverage
    } else {
        UtilityKind::Consumption
    }
}

// ---------------------------------------------------------------------------
// Record builders
// ---------------------------------------------------------------------------

/// Per-feed counters of what normalization had to absorb.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedStats {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub dropped_rows: usize,
    pub defaulted_cells: usize,
    pub missing_fields: Vec<String>,
}

impl FeedStats {
    fn for_table(t: &NormalizedTable) -> Self {
        FeedStats {
            total_rows: t.table.rows.len(),
            missing_fields: t.missing_fields.iter().map(|f| f.to_string()).collect(),
            ..FeedStats::default()
        }
    }
}

fn energy_cell(t: &NormalizedTable, row: &[String], field: &str, stats: &mut FeedStats) -> f64 {
    let c = coerce_kwh(t.get(row, field).unwrap_or(""));
    if c.is_defaulted() {
        stats.defaulted_cells += 1;
    }
    c.value()
}

/// Monthly generation, summed per (year, month, plant). Rows whose month is
/// not 1..=12 are dropped.
pub fn monthly_records(t: &NormalizedTable) -> (Vec<MonthlyRecord>, FeedStats) {
    let mut stats = FeedStats::for_table(t);
    let mut acc: BTreeMap<(i32, u32, PlantId), f64> = BTreeMap::new();
    for row in &t.table.rows {
        let month = parse_month(t.get(row, MONTH).unwrap_or(""));
        if month == 0 {
            stats.dropped_rows += 1;
            continue;
        }
        let year = parse_i32_safe(t.get(row, YEAR)).unwrap_or(0);
        let plant = canonicalize_plant(t.get(row, PLANT).unwrap_or(""));
        let kwh = energy_cell(t, row, ENERGY, &mut stats);
        *acc.entry((year, month, plant)).or_insert(0.0) += kwh;
        stats.kept_rows += 1;
    }
    let records = acc
        .into_iter()
        .map(|((year, month, plant), energy_kwh)| MonthlyRecord {
            year,
            month,
            plant,
            energy_kwh,
        })
        .collect();
    (records, stats)
}

/// Daily generation, summed per (date, plant). Rows without a readable date
/// are dropped.
pub fn daily_records(t: &NormalizedTable) -> (Vec<DailyRecord>, FeedStats) {
    let mut stats = FeedStats::for_table(t);
    let mut acc: BTreeMap<(chrono::NaiveDate, PlantId), f64> = BTreeMap::new();
    for row in &t.table.rows {
        let Some(date) = parse_date_safe(t.get(row, DATE)) else {
            stats.dropped_rows += 1;
            continue;
        };
        let plant = canonicalize_plant(t.get(row, PLANT).unwrap_or(""));
        let kwh = energy_cell(t, row, ENERGY, &mut stats);
        *acc.entry((date, plant)).or_insert(0.0) += kwh;
        stats.kept_rows += 1;
    }
    let records = acc
        .into_iter()
        .map(|((date, plant), energy_kwh)| DailyRecord {
            date,
            plant,
            energy_kwh,
        })
        .collect();
    (records, stats)
}

/// Hourly generation, summed per (date, hour, plant). Rows without a
/// readable date or hour are dropped.
pub fn hourly_records(t: &NormalizedTable) -> (Vec<HourlyRecord>, FeedStats) {
    let mut stats = FeedStats::for_table(t);
    let mut acc: BTreeMap<(chrono::NaiveDate, u32, PlantId), f64> = BTreeMap::new();
    for row in &t.table.rows {
        let date = parse_date_safe(t.get(row, DATE));
        let hour = t.get(row, HOUR).and_then(parse_hour);
        let (Some(date), Some(hour)) = (date, hour) else {
            stats.dropped_rows += 1;
            continue;
        };
        let plant = canonicalize_plant(t.get(row, PLANT).unwrap_or(""));
        let kwh = energy_cell(t, row, ENERGY, &mut stats);
        *acc.entry((date, hour, plant)).or_insert(0.0) += kwh;
        stats.kept_rows += 1;
    }
    let records = acc
        .into_iter()
        .map(|((date, hour, plant), energy_kwh)| HourlyRecord {
            date,
            hour,
            plant,
            energy_kwh,
        })
        .collect();
    (records, stats)
}

/// The utility feed split by row kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UtilityFeed {
    pub consumption: Vec<UtilityRecord>,
    pub cost_overrides: BTreeMap<Plant, f64>,
    pub historical_averages: BTreeMap<Plant, f64>,
}

/// Separate cost-override and historical-average rows from consumption rows
/// and build monthly consumption per (year, month, plant).
///
/// Side-table rows name their plant in the plant column or, failing that, in
/// the kind label itself (`"Costo Cafe"`). Only priced plants are kept there.
pub fn split_utility(t: &NormalizedTable) -> (UtilityFeed, FeedStats) {
    let mut stats = FeedStats::for_table(t);
    let mut feed = UtilityFeed::default();
    let has_kind = !t.is_missing(KIND);
    let derive_period = t.is_missing(YEAR) || t.is_missing(MONTH);
    let mut acc: BTreeMap<(i32, u32, PlantId), f64> = BTreeMap::new();

    for row in &t.table.rows {
        let kind_label = t.get(row, KIND).unwrap_or("");
        let kind = if has_kind {
            classify_kind(kind_label)
        } else {
            UtilityKind::Consumption
        };
        let plant = canonicalize_plant(t.get(row, PLANT).unwrap_or(""));

        if kind != UtilityKind::Consumption {
            let side_plant = plant.known().or_else(|| canonicalize_plant(kind_label).known());
            let value = coerce_number(t.get(row, UTILITY_ENERGY).unwrap_or(""));
            if value.is_defaulted() {
                stats.defaulted_cells += 1;
            }
            if let Some(p) = side_plant {
                let table = match kind {
                    UtilityKind::UnitCost => &mut feed.cost_overrides,
                    _ => &mut feed.historical_averages,
                };
                table.insert(p, value.value());
            }
            stats.dropped_rows += 1;
            continue;
        }

        let date = if derive_period {
            parse_date_safe(t.get(row, DATE))
        } else {
            None
        };
        let (year, month) = match date {
            Some(d) => (d.year(), d.month()),
            None => (
                parse_i32_safe(t.get(row, YEAR)).unwrap_or(0),
                parse_month(t.get(row, MONTH).unwrap_or("")),
            ),
        };
        if !(1..=12).contains(&month) {
            stats.dropped_rows += 1;
            continue;
        }
        let kwh = energy_cell(t, row, UTILITY_ENERGY, &mut stats);
        *acc.entry((year, month, plant)).or_insert(0.0) += kwh;
        stats.kept_rows += 1;
    }

    feed.consumption = acc
        .into_iter()
        .map(|((year, month, plant), consumption_kwh)| UtilityRecord {
            year,
            month,
            plant,
            consumption_kwh,
        })
        .collect();
    (feed, stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn plant_spellings_collapse() {
        let cafe = PlantId::Known(Plant::Cafe);
        assert_eq!(canonicalize_plant("café"), cafe);
        assert_eq!(canonicalize_plant("CAFE"), cafe);
        assert_eq!(canonicalize_plant(" Cafe "), cafe);
        assert_eq!(canonicalize_plant("Planta   Café"), cafe);
        assert_eq!(canonicalize_plant("mercado central"), PlantId::Known(Plant::Mercado));
        assert_eq!(canonicalize_plant(""), PlantId::total());
        assert_eq!(canonicalize_plant("nan"), PlantId::total());
        assert_eq!(canonicalize_plant("bodega norte"), PlantId::Other("BODEGA NORTE".into()));
    }

    #[test]
    fn kind_labels() {
        assert_eq!(classify_kind("Costo Cafe"), UtilityKind::UnitCost);
        assert_eq!(classify_kind("VALOR kWh"), UtilityKind::UnitCost);
        assert_eq!(classify_kind("Promedio"), UtilityKind::HistoricalAverage);
        assert_eq!(classify_kind("Histórico"), UtilityKind::HistoricalAverage);
        assert_eq!(classify_kind("Consumo"), UtilityKind::Consumption);
        assert_eq!(classify_kind("otro"), UtilityKind::Consumption);
    }

    #[test]
    fn headers_resolve_aliases_and_defaults() {
        let raw = table(&[" Año ", "MES", "Planta", "Energía_kWh", "notas"], &[&["2025", "1", "cafe", "10", "x"]]);
        let t = normalize_table(raw, SOLAR_FIELDS);
        assert!(t.table.column(YEAR).is_some());
        assert_eq!(t.table.cell(&t.table.rows[0], YEAR), Some("2025"));
        assert_eq!(t.table.cell(&t.table.rows[0], "notas"), Some("x"));
        assert_eq!(t.table.cell(&t.table.rows[0], ENERGY), Some("10"));
        assert!(t.is_missing(DATE));
        assert!(t.is_missing(HOUR));
        assert!(!t.is_missing(YEAR));
        assert_eq!(t.table.cell(&t.table.rows[0], DATE), Some(""));
    }

    #[test]
    fn first_alias_wins() {
        let raw = table(&["consumo", "consumo_kwh"], &[&["1", "2"]]);
        let t = normalize_table(raw, UTILITY_FIELDS);
        assert_eq!(t.table.cell(&t.table.rows[0], UTILITY_ENERGY), Some("2"));
    }

    #[test]
    fn monthly_rows_aggregate_and_drop_bad_months() {
        let raw = table(
            &["anio", "mes", "planta", "energia_kwh"],
            &[
                &["2025", "Ene", "CAFE", "1.234,5"],
                &["2025", "1", "Café", "100"],
                &["2025", "13", "CAFE", "50"],
                &["2025", "2", "MERCADO", "abc"],
            ],
        );
        let (records, stats) = monthly_records(&normalize_table(raw, SOLAR_FIELDS));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].plant, PlantId::Known(Plant::Cafe));
        assert!((records[0].energy_kwh - 1334.5).abs() < 1e-9);
        assert_eq!(records[1].energy_kwh, 0.0);
        assert_eq!(stats.total_rows, 4);
        assert_eq!(stats.kept_rows, 3);
        assert_eq!(stats.dropped_rows, 1);
        assert_eq!(stats.defaulted_cells, 1);
    }

    #[test]
    fn hourly_rows_need_date_and_hour() {
        let raw = table(
            &["fecha", "hora", "planta", "energia_kwh"],
            &[
                &["01/02/2025", "06:30", "CAFE", "1,5"],
                &["01/02/2025", "x", "CAFE", "2"],
                &["", "7", "CAFE", "2"],
            ],
        );
        let (records, stats) = hourly_records(&normalize_table(raw, SOLAR_FIELDS));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].hour, 6);
        assert_eq!(records[0].energy_kwh, 1.5);
        assert_eq!(stats.dropped_rows, 2);
    }

    #[test]
    fn utility_side_tables_are_split_out() {
        let raw = table(
            &["Año", "Mes", "Sede", "Tipo", "Consumo_kWh"],
            &[
                &["2025", "1", "CAFE", "Consumo", "2.000"],
                &["2025", "1", "MERCADO", "Consumo", "1,500"],
                &["", "", "", "Costo Cafe", "1,200"],
                &["", "", "MERCADO", "Valor kWh", "0"],
                &["", "", "Cafe", "Promedio Historico", "3100"],
            ],
        );
        let (feed, stats) = split_utility(&normalize_table(raw, UTILITY_FIELDS));
        assert_eq!(feed.consumption.len(), 2);
        assert_eq!(feed.consumption[0].consumption_kwh, 2.0);
        assert_eq!(feed.consumption[1].consumption_kwh, 1500.0);
        assert_eq!(feed.cost_overrides.get(&Plant::Cafe), Some(&1200.0));
        assert_eq!(feed.cost_overrides.get(&Plant::Mercado), Some(&0.0));
        assert_eq!(feed.historical_averages.get(&Plant::Cafe), Some(&3100.0));
        assert_eq!(stats.kept_rows, 2);
        assert_eq!(stats.dropped_rows, 3);
    }

    #[test]
    fn utility_without_kind_or_plant_is_total_consumption() {
        let raw = table(&["fecha", "epm (kwh)"], &[&["15/03/2025", "900"], &["bad", "1"]]);
        let (feed, stats) = split_utility(&normalize_table(raw, UTILITY_FIELDS));
        assert_eq!(feed.consumption.len(), 1);
        let r = &feed.consumption[0];
        assert_eq!((r.year, r.month), (2025, 3));
        assert!(r.plant.is_total());
        assert_eq!(r.consumption_kwh, 900.0);
        assert_eq!(stats.dropped_rows, 1);
    }
}
