use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tabled::Tabled;

/// The two monitored sites that carry a unit cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Plant {
    Cafe,
    Mercado,
}

impl Plant {
    pub const ALL: [Plant; 2] = [Plant::Cafe, Plant::Mercado];

    pub fn as_str(&self) -> &'static str {
        match self {
            Plant::Cafe => "CAFE",
            Plant::Mercado => "MERCADO",
        }
    }
}

impl fmt::Display for Plant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical plant identifier.
///
/// Only `Known` plants are priced; anything else (including the `TOTAL`
/// fallback for rows without a plant column) is carried as `Other` so it can
/// never be mistaken for a cost-bearing site.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlantId {
    Known(Plant),
    Other(String),
}

pub const TOTAL_LABEL: &str = "TOTAL";

impl PlantId {
    pub fn total() -> Self {
        PlantId::Other(TOTAL_LABEL.to_string())
    }

    pub fn known(&self) -> Option<Plant> {
        match self {
            PlantId::Known(p) => Some(*p),
            PlantId::Other(_) => None,
        }
    }

    pub fn is_total(&self) -> bool {
        matches!(self, PlantId::Other(s) if s == TOTAL_LABEL)
    }

    pub fn as_str(&self) -> &str {
        match self {
            PlantId::Known(p) => p.as_str(),
            PlantId::Other(s) => s.as_str(),
        }
    }
}

impl From<Plant> for PlantId {
    fn from(p: Plant) -> Self {
        PlantId::Known(p)
    }
}

impl fmt::Display for PlantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PlantId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Canonical records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyRecord {
    pub year: i32,
    pub month: u32,
    pub plant: PlantId,
    pub energy_kwh: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub plant: PlantId,
    pub energy_kwh: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourlyRecord {
    pub date: NaiveDate,
    pub hour: u32,
    pub plant: PlantId,
    pub energy_kwh: f64,
}

/// Row kind of the utility feed. Only `Consumption` rows are aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtilityKind {
    Consumption,
    UnitCost,
    HistoricalAverage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UtilityRecord {
    pub year: i32,
    pub month: u32,
    pub plant: PlantId,
    pub consumption_kwh: f64,
}

/// Modeled hour-of-day share of a month's utility consumption. Not measured.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyEstimate {
    pub year: i32,
    pub month: u32,
    pub plant: PlantId,
    pub hour: u32,
    pub estimated_kwh: f64,
}

// ---------------------------------------------------------------------------
// Cost table
// ---------------------------------------------------------------------------

/// Currency per kWh for each priced plant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostTable {
    costs: BTreeMap<Plant, f64>,
}

impl CostTable {
    pub fn new(cafe: f64, mercado: f64) -> Self {
        let mut costs = BTreeMap::new();
        costs.insert(Plant::Cafe, cafe);
        costs.insert(Plant::Mercado, mercado);
        CostTable { costs }
    }

    /// Unit cost for a plant; unpriced identifiers cost nothing.
    pub fn unit_cost(&self, plant: &PlantId) -> f64 {
        plant
            .known()
            .and_then(|p| self.costs.get(&p).copied())
            .unwrap_or(0.0)
    }

    /// Replace defaults with positive overrides extracted from the utility feed.
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<Plant, f64>) {
        for (plant, value) in overrides {
            if *value > 0.0 {
                self.costs.insert(*plant, *value);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Plant, &f64)> {
        self.costs.iter()
    }
}

impl Default for CostTable {
    fn default() -> Self {
        CostTable::new(1033.0, 1077.0)
    }
}

/// Everything one load produces. Replaced wholesale on refresh.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub monthly: Vec<MonthlyRecord>,
    pub daily: Vec<DailyRecord>,
    pub hourly: Vec<HourlyRecord>,
    pub consumption: Vec<UtilityRecord>,
    pub hourly_estimate: Vec<HourlyEstimate>,
    pub costs: CostTable,
    pub historical_averages: BTreeMap<Plant, f64>,
    pub loaded_at: DateTime<Local>,
}

// ---------------------------------------------------------------------------
// Report rows (console preview + CSV export)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct MonthlyRow {
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: String,
    #[serde(rename = "SolarCafe")]
    #[tabled(rename = "SolarCafe")]
    pub solar_cafe: String,
    #[serde(rename = "SolarMercado")]
    #[tabled(rename = "SolarMercado")]
    pub solar_mercado: String,
    #[serde(rename = "SolarTotal")]
    #[tabled(rename = "SolarTotal")]
    pub solar_total: String,
    #[serde(rename = "UtilityCafe")]
    #[tabled(rename = "UtilityCafe")]
    pub utility_cafe: String,
    #[serde(rename = "UtilityMercado")]
    #[tabled(rename = "UtilityMercado")]
    pub utility_mercado: String,
    #[serde(rename = "UtilityTotal")]
    #[tabled(rename = "UtilityTotal")]
    pub utility_total: String,
    #[serde(rename = "Coverage")]
    #[tabled(rename = "Coverage")]
    pub coverage: String,
    #[serde(rename = "Savings")]
    #[tabled(rename = "Savings")]
    pub savings: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct DailyRow {
    #[serde(rename = "Date")]
    #[tabled(rename = "Date")]
    pub date: String,
    #[serde(rename = "SolarCafe")]
    #[tabled(rename = "SolarCafe")]
    pub solar_cafe: String,
    #[serde(rename = "SolarMercado")]
    #[tabled(rename = "SolarMercado")]
    pub solar_mercado: String,
    #[serde(rename = "SolarTotal")]
    #[tabled(rename = "SolarTotal")]
    pub solar_total: String,
    #[serde(rename = "Savings")]
    #[tabled(rename = "Savings")]
    pub savings: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct WeekdayRow {
    #[serde(rename = "Weekday")]
    #[tabled(rename = "Weekday")]
    pub weekday: String,
    #[serde(rename = "Plant")]
    #[tabled(rename = "Plant")]
    pub plant: String,
    #[serde(rename = "AvgKwhPerDay")]
    #[tabled(rename = "AvgKwhPerDay")]
    pub avg_kwh: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct HourlyRow {
    #[serde(rename = "Hour")]
    #[tabled(rename = "Hour")]
    pub hour: String,
    #[serde(rename = "SolarCafe")]
    #[tabled(rename = "SolarCafe")]
    pub solar_cafe: String,
    #[serde(rename = "SolarMercado")]
    #[tabled(rename = "SolarMercado")]
    pub solar_mercado: String,
    #[serde(rename = "SolarTotal")]
    #[tabled(rename = "SolarTotal")]
    pub solar_total: String,
    #[serde(rename = "UtilityCafe(est.)")]
    #[tabled(rename = "UtilityCafe(est.)")]
    pub utility_cafe_est: String,
    #[serde(rename = "UtilityMercado(est.)")]
    #[tabled(rename = "UtilityMercado(est.)")]
    pub utility_mercado_est: String,
    #[serde(rename = "UtilityTotal(est.)")]
    #[tabled(rename = "UtilityTotal(est.)")]
    pub utility_total_est: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub generation_total_kwh: f64,
    pub generation_by_plant: BTreeMap<String, f64>,
    pub consumption_total_kwh: f64,
    pub consumption_by_plant: BTreeMap<String, f64>,
    pub savings_total: f64,
    pub savings_by_plant: BTreeMap<String, f64>,
    pub coverage_pct: f64,
    pub active_days: usize,
    pub avg_daily_kwh: f64,
    pub solar_months: usize,
    pub avg_monthly_kwh: f64,
    pub peak_hour: Option<u32>,
    pub peak_hour_kwh: f64,
    pub productive_hours: usize,
    pub unit_costs: BTreeMap<String, f64>,
    pub historical_avg_kwh: BTreeMap<String, f64>,
}
