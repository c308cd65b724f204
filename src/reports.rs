use crate::config::FilterConfig;
use crate::normalize::canonicalize_plant;
use crate::types::{
    CostTable, DailyRecord, DailyRow, Dataset, HourlyEstimate, HourlyRecord, HourlyRow,
    MonthlyRecord, MonthlyRow, Plant, PlantId, SummaryStats, UtilityRecord, WeekdayRow,
};
use crate::util::{
    average, date_label, format_currency, format_number, hour_label, month_label,
    parse_date_safe, parse_month, std_dev, weekday_label,
};
use chrono::{Datelike, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, BTreeSet};

/// Hours whose generation exceeds this count as productive.
pub const PRODUCTIVE_THRESHOLD_KWH: f64 = 0.5;

/// Inclusive hour window reported as peak production.
pub const PEAK_WINDOW: (u32, u32) = (9, 15);

/// Dates kept in the date x hour matrix.
pub const HEATMAP_MAX_DATES: usize = 45;

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// User selection. Empty selections mean "everything available", except
/// plants which default to the two priced sites.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub plants: Vec<PlantId>,
    pub years: Vec<i32>,
    pub months: Vec<u32>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl Filter {
    pub fn from_config(cfg: &FilterConfig) -> Self {
        Filter {
            plants: cfg.plants.iter().map(|p| canonicalize_plant(p)).collect(),
            years: cfg.years.clone(),
            months: cfg.months.clone(),
            date_from: cfg.date_from,
            date_to: cfg.date_to,
        }
    }

    /// Build a filter from prompt answers. Lists are separated by `,` or
    /// `;`; entries that cannot be read are skipped. Blank means "all".
    pub fn from_answers(a: &FilterAnswers) -> Self {
        Filter {
            plants: list(&a.plants).map(canonicalize_plant).collect(),
            years: list(&a.years).filter_map(|t| t.parse().ok()).collect(),
            months: list(&a.months)
                .map(parse_month)
                .filter(|m| *m != 0)
                .collect(),
            date_from: parse_date_safe(Some(a.date_from.as_str())),
            date_to: parse_date_safe(Some(a.date_to.as_str())),
        }
    }

    /// One-line description for the console; empty selections read "all".
    pub fn describe(&self) -> String {
        fn join<T: ToString>(items: &[T]) -> String {
            if items.is_empty() {
                "all".to_string()
            } else {
                items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
            }
        }
        let bound = |d: Option<NaiveDate>| d.map_or("*".to_string(), |d| d.to_string());
        format!(
            "plants: {}; years: {}; months: {}; dates: {} to {}",
            if self.plants.is_empty() {
                "CAFE, MERCADO".to_string()
            } else {
                join(&self.plants)
            },
            join(&self.years),
            join(&self.months),
            bound(self.date_from),
            bound(self.date_to)
        )
    }

    pub fn resolve(&self, ds: &Dataset) -> ResolvedFilter {
        let plants = if self.plants.is_empty() {
            Plant::ALL.iter().map(|p| PlantId::Known(*p)).collect()
        } else {
            self.plants.iter().cloned().collect()
        };
        let years = if self.years.is_empty() {
            available_years(ds)
        } else {
            self.years.iter().copied().collect()
        };
        let months = if self.months.is_empty() {
            available_months(ds)
        } else {
            self.months.iter().copied().collect()
        };
        let first = ds.daily.iter().map(|r| r.date).min();
        let last = ds.daily.iter().map(|r| r.date).max();
        ResolvedFilter {
            plants,
            years,
            months,
            date_from: self.date_from.or(first),
            date_to: self.date_to.or(last),
        }
    }
}

/// Raw answers typed at the filter prompt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterAnswers {
    pub plants: String,
    pub years: String,
    pub months: String,
    pub date_from: String,
    pub date_to: String,
}

fn list(s: &str) -> impl Iterator<Item = &str> {
    s.split(|c: char| c == ',' || c == ';')
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFilter {
    pub plants: BTreeSet<PlantId>,
    pub years: BTreeSet<i32>,
    pub months: BTreeSet<u32>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl ResolvedFilter {
    fn period(&self, year: i32, month: u32) -> bool {
        self.years.contains(&year) && self.months.contains(&month)
    }

    fn date(&self, d: NaiveDate) -> bool {
        self.date_from.map_or(true, |from| d >= from) && self.date_to.map_or(true, |to| d <= to)
    }

    /// Plant-less utility rows describe the whole site and always pass.
    fn utility_plant(&self, p: &PlantId) -> bool {
        p.is_total() || self.plants.contains(p)
    }
}

/// The slice of a dataset selected by a filter.
#[derive(Debug, Clone, Default)]
pub struct View {
    pub monthly: Vec<MonthlyRecord>,
    pub daily: Vec<DailyRecord>,
    pub hourly: Vec<HourlyRecord>,
    pub consumption: Vec<UtilityRecord>,
    pub hourly_estimate: Vec<HourlyEstimate>,
}

pub fn apply_filter(ds: &Dataset, f: &ResolvedFilter) -> View {
    View {
        monthly: ds
            .monthly
            .iter()
            .filter(|r| f.plants.contains(&r.plant) && f.period(r.year, r.month))
            .cloned()
            .collect(),
        daily: ds
            .daily
            .iter()
            .filter(|r| f.plants.contains(&r.plant) && f.date(r.date))
            .cloned()
            .collect(),
        hourly: ds
            .hourly
            .iter()
            .filter(|r| f.plants.contains(&r.plant) && f.date(r.date))
            .cloned()
            .collect(),
        consumption: ds
            .consumption
            .iter()
            .filter(|r| f.utility_plant(&r.plant) && f.period(r.year, r.month))
            .cloned()
            .collect(),
        hourly_estimate: ds
            .hourly_estimate
            .iter()
            .filter(|r| f.utility_plant(&r.plant) && f.period(r.year, r.month))
            .cloned()
            .collect(),
    }
}

pub fn available_years(ds: &Dataset) -> BTreeSet<i32> {
    ds.monthly
        .iter()
        .map(|r| r.year)
        .chain(ds.consumption.iter().map(|r| r.year))
        .collect()
}

pub fn available_months(ds: &Dataset) -> BTreeSet<u32> {
    ds.monthly
        .iter()
        .map(|r| r.month)
        .chain(ds.consumption.iter().map(|r| r.month))
        .collect()
}

pub fn available_plants(ds: &Dataset) -> BTreeSet<PlantId> {
    let mut plants: BTreeSet<PlantId> = ds
        .monthly
        .iter()
        .map(|r| r.plant.clone())
        .chain(ds.consumption.iter().map(|r| r.plant.clone()))
        .collect();
    plants.extend(Plant::ALL.iter().map(|p| PlantId::Known(*p)));
    plants
}

// ---------------------------------------------------------------------------
// Core metrics
// ---------------------------------------------------------------------------

pub fn generation_by_plant(records: &[MonthlyRecord]) -> BTreeMap<PlantId, f64> {
    let mut out = BTreeMap::new();
    for r in records {
        *out.entry(r.plant.clone()).or_insert(0.0) += r.energy_kwh;
    }
    out
}

pub fn consumption_by_plant(records: &[UtilityRecord]) -> BTreeMap<PlantId, f64> {
    let mut out = BTreeMap::new();
    for r in records {
        *out.entry(r.plant.clone()).or_insert(0.0) += r.consumption_kwh;
    }
    out
}

/// Avoided cost of `generation_kwh` at `unit_cost` per kWh.
pub fn savings(generation_kwh: f64, unit_cost: f64) -> f64 {
    generation_kwh * unit_cost
}

pub fn savings_by_plant(
    generation: &BTreeMap<PlantId, f64>,
    costs: &CostTable,
) -> BTreeMap<PlantId, f64> {
    generation
        .iter()
        .map(|(p, kwh)| (p.clone(), savings(*kwh, costs.unit_cost(p))))
        .collect()
}

/// Generation as a percentage of grid consumption; 0 without consumption.
pub fn coverage_pct(generation_total: f64, consumption_total: f64) -> f64 {
    if consumption_total > 0.0 {
        generation_total / consumption_total * 100.0
    } else {
        0.0
    }
}

/// Generation per hour of day summed over every record.
pub fn hourly_totals(records: &[HourlyRecord]) -> BTreeMap<u32, f64> {
    let mut out = BTreeMap::new();
    for r in records {
        *out.entry(r.hour).or_insert(0.0) += r.energy_kwh;
    }
    out
}

/// Hour with the largest total; the earliest hour wins ties.
pub fn peak_hour(totals: &BTreeMap<u32, f64>) -> Option<(u32, f64)> {
    let mut best: Option<(u32, f64)> = None;
    for (&h, &kwh) in totals {
        match best {
            Some((_, b)) if kwh <= b => {}
            _ => best = Some((h, kwh)),
        }
    }
    best
}

pub fn productive_hours(totals: &BTreeMap<u32, f64>) -> usize {
    totals
        .values()
        .filter(|kwh| **kwh > PRODUCTIVE_THRESHOLD_KWH)
        .count()
}

/// (inside, outside) the peak window.
pub fn peak_window_split(totals: &BTreeMap<u32, f64>) -> (f64, f64) {
    let (lo, hi) = PEAK_WINDOW;
    totals.iter().fold((0.0, 0.0), |(inside, outside), (h, kwh)| {
        if (lo..=hi).contains(h) {
            (inside + kwh, outside)
        } else {
            (inside, outside + kwh)
        }
    })
}

// ---------------------------------------------------------------------------
// Estimated hourly consumption
// ---------------------------------------------------------------------------

/// Share of a day's consumption assigned to each hour: a linear bell around
/// noon between 06:00 and 18:00, flat 0.15 outside, normalized to sum to 1.
pub static HOURLY_WEIGHTS: Lazy<[f64; 24]> = Lazy::new(|| {
    let mut w = [0.0; 24];
    for (h, slot) in w.iter_mut().enumerate() {
        let h = h as f64;
        *slot = if (6.0..=18.0).contains(&h) {
            (1.0 - (h - 12.0).abs() / 7.0).max(0.0)
        } else {
            0.15
        };
    }
    let total: f64 = w.iter().sum();
    for slot in w.iter_mut() {
        *slot /= total;
    }
    w
});

/// Spread each month's consumption over 24 hours. This is a model, not a
/// measurement, and is labeled as an estimate wherever it is shown.
pub fn estimate_hourly_consumption(records: &[UtilityRecord]) -> Vec<HourlyEstimate> {
    let weights = &*HOURLY_WEIGHTS;
    records
        .iter()
        .flat_map(|r| {
            (0..24u32).map(move |h| HourlyEstimate {
                year: r.year,
                month: r.month,
                plant: r.plant.clone(),
                hour: h,
                estimated_kwh: r.consumption_kwh * weights[h as usize],
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Headline figures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Kpis {
    pub generation_by_plant: BTreeMap<PlantId, f64>,
    pub generation_total: f64,
    pub consumption_by_plant: BTreeMap<PlantId, f64>,
    pub consumption_total: f64,
    pub savings_by_plant: BTreeMap<PlantId, f64>,
    pub savings_total: f64,
    pub coverage_pct: f64,
    pub active_days: usize,
    pub avg_daily_kwh: f64,
    pub solar_months: usize,
    pub avg_monthly_kwh: f64,
}

pub fn compute_kpis(view: &View, costs: &CostTable) -> Kpis {
    let generation = generation_by_plant(&view.monthly);
    let generation_total: f64 = generation.values().sum();
    let consumption = consumption_by_plant(&view.consumption);
    let consumption_total: f64 = consumption.values().sum();
    let savings = savings_by_plant(&generation, costs);
    let savings_total: f64 = savings.values().sum();

    let active_days = view.daily.iter().map(|r| r.date).collect::<BTreeSet<_>>().len();
    let solar_months = view
        .monthly
        .iter()
        .map(|r| (r.year, r.month))
        .collect::<BTreeSet<_>>()
        .len();

    Kpis {
        coverage_pct: coverage_pct(generation_total, consumption_total),
        avg_daily_kwh: per(generation_total, active_days),
        avg_monthly_kwh: per(generation_total, solar_months),
        generation_by_plant: generation,
        generation_total,
        consumption_by_plant: consumption,
        consumption_total,
        savings_by_plant: savings,
        savings_total,
        active_days,
        solar_months,
    }
}

fn per(total: f64, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        total / n as f64
    }
}

fn plant_value(map: &BTreeMap<PlantId, f64>, plant: Plant) -> f64 {
    map.get(&PlantId::Known(plant)).copied().unwrap_or(0.0)
}

fn positive_average(values: impl Iterator<Item = f64>) -> f64 {
    let v: Vec<f64> = values.filter(|x| *x > 0.0).collect();
    average(&v)
}

// ---------------------------------------------------------------------------
// Monthly view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyPoint {
    pub year: i32,
    pub month: u32,
    pub solar: BTreeMap<PlantId, f64>,
    pub solar_total: f64,
    pub utility: BTreeMap<PlantId, f64>,
    pub utility_total: f64,
    pub coverage_pct: f64,
    pub savings: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlySummary {
    pub points: Vec<MonthlyPoint>,
    /// Averages over months with a positive value.
    pub avg_solar: f64,
    pub avg_utility: f64,
    pub avg_savings: f64,
}

/// Solar and utility side by side for every month present in either table.
pub fn monthly_summary(view: &View, costs: &CostTable) -> MonthlySummary {
    let mut solar: BTreeMap<(i32, u32), BTreeMap<PlantId, f64>> = BTreeMap::new();
    for r in &view.monthly {
        *solar
            .entry((r.year, r.month))
            .or_default()
            .entry(r.plant.clone())
            .or_insert(0.0) += r.energy_kwh;
    }
    let mut utility: BTreeMap<(i32, u32), BTreeMap<PlantId, f64>> = BTreeMap::new();
    for r in &view.consumption {
        *utility
            .entry((r.year, r.month))
            .or_default()
            .entry(r.plant.clone())
            .or_insert(0.0) += r.consumption_kwh;
    }

    let periods: BTreeSet<(i32, u32)> = solar.keys().chain(utility.keys()).copied().collect();
    let points: Vec<MonthlyPoint> = periods
        .into_iter()
        .map(|(year, month)| {
            let s = solar.remove(&(year, month)).unwrap_or_default();
            let u = utility.remove(&(year, month)).unwrap_or_default();
            let solar_total: f64 = s.values().sum();
            let utility_total: f64 = u.values().sum();
            let savings: f64 = savings_by_plant(&s, costs).values().sum();
            MonthlyPoint {
                year,
                month,
                coverage_pct: coverage_pct(solar_total, utility_total),
                solar: s,
                solar_total,
                utility: u,
                utility_total,
                savings,
            }
        })
        .collect();

    MonthlySummary {
        avg_solar: positive_average(points.iter().map(|p| p.solar_total)),
        avg_utility: positive_average(points.iter().map(|p| p.utility_total)),
        avg_savings: positive_average(points.iter().map(|p| p.savings)),
        points,
    }
}

pub fn generate_monthly_report(summary: &MonthlySummary) -> Vec<MonthlyRow> {
    summary
        .points
        .iter()
        .map(|p| MonthlyRow {
            month: month_label(p.year, p.month),
            solar_cafe: format_number(plant_value(&p.solar, Plant::Cafe), 1),
            solar_mercado: format_number(plant_value(&p.solar, Plant::Mercado), 1),
            solar_total: format_number(p.solar_total, 1),
            utility_cafe: format_number(plant_value(&p.utility, Plant::Cafe), 0),
            utility_mercado: format_number(plant_value(&p.utility, Plant::Mercado), 0),
            utility_total: format_number(p.utility_total, 0),
            coverage: format!("{}%", format_number(p.coverage_pct, 1)),
            savings: format_currency(p.savings),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Daily view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub by_plant: BTreeMap<PlantId, f64>,
    pub total: f64,
    pub savings: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailySummary {
    pub points: Vec<DailyPoint>,
    /// Mean and sample deviation over days with generation.
    pub avg_kwh: f64,
    pub std_kwh: f64,
    pub best_day: Option<(NaiveDate, f64)>,
}

pub fn daily_summary(view: &View, costs: &CostTable) -> DailySummary {
    let mut by_date: BTreeMap<NaiveDate, BTreeMap<PlantId, f64>> = BTreeMap::new();
    for r in &view.daily {
        *by_date
            .entry(r.date)
            .or_default()
            .entry(r.plant.clone())
            .or_insert(0.0) += r.energy_kwh;
    }
    let points: Vec<DailyPoint> = by_date
        .into_iter()
        .map(|(date, by_plant)| DailyPoint {
            date,
            total: by_plant.values().sum(),
            savings: savings_by_plant(&by_plant, costs).values().sum(),
            by_plant,
        })
        .collect();

    let producing: Vec<f64> = points.iter().map(|p| p.total).filter(|t| *t > 0.0).collect();
    let mut best_day: Option<(NaiveDate, f64)> = None;
    for p in &points {
        match best_day {
            Some((_, b)) if p.total <= b => {}
            _ => best_day = Some((p.date, p.total)),
        }
    }

    DailySummary {
        avg_kwh: average(&producing),
        std_kwh: std_dev(&producing),
        best_day,
        points,
    }
}

pub fn generate_daily_report(summary: &DailySummary) -> Vec<DailyRow> {
    summary
        .points
        .iter()
        .map(|p| DailyRow {
            date: date_label(p.date),
            solar_cafe: format_number(plant_value(&p.by_plant, Plant::Cafe), 1),
            solar_mercado: format_number(plant_value(&p.by_plant, Plant::Mercado), 1),
            solar_total: format_number(p.total, 1),
            savings: format_currency(p.savings),
        })
        .collect()
}

/// Mean daily generation per (weekday, plant), Monday first.
pub fn weekday_profile(records: &[DailyRecord]) -> Vec<(Weekday, PlantId, f64)> {
    let mut acc: BTreeMap<(u32, PlantId), Vec<f64>> = BTreeMap::new();
    for r in records {
        acc.entry((r.date.weekday().num_days_from_monday(), r.plant.clone()))
            .or_default()
            .push(r.energy_kwh);
    }
    acc.into_iter()
        .map(|((dow, plant), values)| (weekday_from_index(dow), plant, average(&values)))
        .collect()
}

fn weekday_from_index(i: u32) -> Weekday {
    match i {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        _ => Weekday::Sun,
    }
}

pub fn generate_weekday_report(records: &[DailyRecord]) -> Vec<WeekdayRow> {
    weekday_profile(records)
        .into_iter()
        .map(|(w, plant, avg)| WeekdayRow {
            weekday: weekday_label(w).to_string(),
            plant: plant.to_string(),
            avg_kwh: format_number(avg, 1),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Hourly view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct HourlyPoint {
    pub hour: u32,
    /// Mean generation per plant for this hour across the selected dates.
    pub solar: BTreeMap<PlantId, f64>,
    /// Mean estimated consumption per plant for this hour across the
    /// selected months.
    pub estimated_utility: BTreeMap<PlantId, f64>,
}

fn mean_by_hour_plant<'a>(
    items: impl Iterator<Item = (u32, &'a PlantId, f64)>,
) -> BTreeMap<u32, BTreeMap<PlantId, f64>> {
    let mut acc: BTreeMap<u32, BTreeMap<PlantId, Vec<f64>>> = BTreeMap::new();
    for (hour, plant, kwh) in items {
        acc.entry(hour)
            .or_default()
            .entry(plant.clone())
            .or_default()
            .push(kwh);
    }
    acc.into_iter()
        .map(|(h, plants)| {
            let means = plants
                .into_iter()
                .map(|(p, values)| (p, average(&values)))
                .collect();
            (h, means)
        })
        .collect()
}

/// Hours with solar data, in order. Estimates are attached where available.
pub fn hourly_profile(view: &View) -> Vec<HourlyPoint> {
    let solar = mean_by_hour_plant(view.hourly.iter().map(|r| (r.hour, &r.plant, r.energy_kwh)));
    let mut estimated = mean_by_hour_plant(
        view.hourly_estimate
            .iter()
            .map(|r| (r.hour, &r.plant, r.estimated_kwh)),
    );
    solar
        .into_iter()
        .map(|(hour, s)| HourlyPoint {
            hour,
            solar: s,
            estimated_utility: estimated.remove(&hour).unwrap_or_default(),
        })
        .collect()
}

/// Average of the per-plant hourly means that are positive.
pub fn average_producing_hour(profile: &[HourlyPoint]) -> f64 {
    positive_average(profile.iter().flat_map(|p| p.solar.values().copied()))
}

pub fn generate_hourly_report(profile: &[HourlyPoint]) -> Vec<HourlyRow> {
    profile
        .iter()
        .map(|p| HourlyRow {
            hour: hour_label(p.hour),
            solar_cafe: format_number(plant_value(&p.solar, Plant::Cafe), 2),
            solar_mercado: format_number(plant_value(&p.solar, Plant::Mercado), 2),
            solar_total: format_number(p.solar.values().sum(), 2),
            utility_cafe_est: format_number(plant_value(&p.estimated_utility, Plant::Cafe), 2),
            utility_mercado_est: format_number(
                plant_value(&p.estimated_utility, Plant::Mercado),
                2,
            ),
            utility_total_est: format_number(p.estimated_utility.values().sum(), 2),
        })
        .collect()
}

/// Generation per (date, hour) for the most recent `max_dates` dates.
pub fn date_hour_totals(
    records: &[HourlyRecord],
    max_dates: usize,
) -> BTreeMap<(NaiveDate, u32), f64> {
    let dates: BTreeSet<NaiveDate> = records.iter().map(|r| r.date).collect();
    let cutoff = dates.iter().rev().nth(max_dates.saturating_sub(1)).copied();
    let mut out = BTreeMap::new();
    for r in records {
        if max_dates == 0 || cutoff.map_or(false, |c| r.date < c) {
            continue;
        }
        *out.entry((r.date, r.hour)).or_insert(0.0) += r.energy_kwh;
    }
    out
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

fn string_keys<K: ToString>(map: &BTreeMap<K, f64>) -> BTreeMap<String, f64> {
    map.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

pub fn generate_summary(ds: &Dataset, view: &View) -> SummaryStats {
    let kpis = compute_kpis(view, &ds.costs);
    let totals = hourly_totals(&view.hourly);
    let peak = peak_hour(&totals);
    let unit_costs: BTreeMap<Plant, f64> = ds.costs.iter().map(|(p, c)| (*p, *c)).collect();
    SummaryStats {
        generation_total_kwh: kpis.generation_total,
        generation_by_plant: string_keys(&kpis.generation_by_plant),
        consumption_total_kwh: kpis.consumption_total,
        consumption_by_plant: string_keys(&kpis.consumption_by_plant),
        savings_total: kpis.savings_total,
        savings_by_plant: string_keys(&kpis.savings_by_plant),
        coverage_pct: kpis.coverage_pct,
        active_days: kpis.active_days,
        avg_daily_kwh: kpis.avg_daily_kwh,
        solar_months: kpis.solar_months,
        avg_monthly_kwh: kpis.avg_monthly_kwh,
        peak_hour: peak.map(|(h, _)| h),
        peak_hour_kwh: peak.map(|(_, kwh)| kwh).unwrap_or(0.0),
        productive_hours: productive_hours(&totals),
        unit_costs: string_keys(&unit_costs),
        historical_avg_kwh: string_keys(&ds.historical_averages),
    }
}
