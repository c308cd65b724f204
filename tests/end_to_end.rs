use solar_report::config::Config;
use solar_report::error::{Feed, FetchError, LoadError};
use solar_report::fetch::{FallbackSource, FeedSource};
use solar_report::loader::load_dataset;
use solar_report::reports::{
    apply_filter, available_plants, compute_kpis, generate_summary, hourly_totals,
    monthly_summary, peak_hour, productive_hours, Filter,
};
use solar_report::types::{Dataset, Plant, PlantId};
use std::collections::HashMap;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

/// In-memory feeds keyed by feed; a missing feed fails like a 404.
struct Stub(HashMap<Feed, String>);

impl Stub {
    fn new(monthly: &str, daily: &str, hourly: &str, utility: &str) -> Self {
        let mut feeds = HashMap::new();
        feeds.insert(Feed::SolarMonthly, monthly.to_string());
        feeds.insert(Feed::SolarDaily, daily.to_string());
        feeds.insert(Feed::SolarHourly, hourly.to_string());
        feeds.insert(Feed::Utility, utility.to_string());
        Stub(feeds)
    }
}

impl FeedSource for Stub {
    fn fetch(&self, feed: Feed) -> Result<String, FetchError> {
        self.0
            .get(&feed)
            .cloned()
            .ok_or(FetchError::Status { feed, status: 404 })
    }
}

const MONTHLY: &str = "Año,Mes,Planta,Energía (kWh)\n2025,Ene,Cafe,100\n2025,1,MERCADO,\"50,0\"\n";
const DAILY: &str = "Fecha,Planta,Energia_kWh\n15/01/2025,CAFE,4\n16/01/2025,MERCADO,2\n";
const UTILITY: &str = "Año,Mes,Planta,Consumo_kWh\n2025,1,CAFE,1000\n2025,1,MERCADO,500\n";

fn hourly_one_day() -> String {
    let mut s = String::from("Fecha,Hora,Planta,Energia_kWh\n");
    for h in 0..24 {
        let kwh = if h == 12 { "10" } else { "0" };
        s.push_str(&format!("15/01/2025,{},CAFE,{}\n", h, kwh));
    }
    s
}

fn load(src: &dyn FeedSource) -> Dataset {
    load_dataset(src, &Config::default()).unwrap().0
}

#[test]
fn two_plant_month_totals_and_savings() {
    let ds = load(&Stub::new(MONTHLY, DAILY, &hourly_one_day(), UTILITY));
    let view = apply_filter(&ds, &Filter::default().resolve(&ds));
    let kpis = compute_kpis(&view, &ds.costs);

    assert!(approx_eq(kpis.generation_total, 150.0));
    assert!(approx_eq(
        kpis.generation_by_plant.values().sum::<f64>(),
        kpis.generation_total
    ));
    assert!(approx_eq(kpis.savings_total, 157150.0));
    assert!(approx_eq(kpis.consumption_total, 1500.0));
    assert!(approx_eq(kpis.coverage_pct, 10.0));

    let plants = available_plants(&ds);
    assert_eq!(plants.len(), 2);
    assert!(plants.contains(&PlantId::Known(Plant::Mercado)));

    let months = monthly_summary(&view, &ds.costs);
    assert_eq!(months.points.len(), 1);
    assert!(approx_eq(months.points[0].savings, 157150.0));
}

#[test]
fn unit_cost_row_overrides_default() {
    let utility = "Año,Mes,Tipo,Planta,Consumo_kWh\n\
                   2025,1,Consumo,CAFE,1000\n\
                   ,,Costo Cafe,,\"1,200\"\n";
    let ds = load(&Stub::new(MONTHLY, DAILY, &hourly_one_day(), utility));

    assert!(approx_eq(ds.costs.unit_cost(&PlantId::Known(Plant::Cafe)), 1200.0));
    assert!(approx_eq(ds.costs.unit_cost(&PlantId::Known(Plant::Mercado)), 1077.0));

    let view = apply_filter(&ds, &Filter::default().resolve(&ds));
    let kpis = compute_kpis(&view, &ds.costs);
    assert!(approx_eq(kpis.savings_total, 100.0 * 1200.0 + 50.0 * 1077.0));
    // The cost row is not consumption.
    assert!(approx_eq(kpis.consumption_total, 1000.0));
}

#[test]
fn single_peak_hour_is_found() {
    let ds = load(&Stub::new(MONTHLY, DAILY, &hourly_one_day(), UTILITY));
    let view = apply_filter(&ds, &Filter::default().resolve(&ds));
    let totals = hourly_totals(&view.hourly);

    assert_eq!(peak_hour(&totals).map(|(h, _)| h), Some(12));
    assert_eq!(productive_hours(&totals), 1);

    let summary = generate_summary(&ds, &view);
    assert_eq!(summary.peak_hour, Some(12));
    assert!(approx_eq(summary.peak_hour_kwh, 10.0));
    assert_eq!(summary.productive_hours, 1);
    assert_eq!(summary.unit_costs.get("CAFE"), Some(&1033.0));
}

#[test]
fn hourly_estimates_preserve_monthly_consumption() {
    let ds = load(&Stub::new(MONTHLY, DAILY, &hourly_one_day(), UTILITY));
    let cafe: f64 = ds
        .hourly_estimate
        .iter()
        .filter(|e| e.plant == PlantId::Known(Plant::Cafe))
        .map(|e| e.estimated_kwh)
        .sum();
    assert!(approx_eq(cafe, 1000.0));
}

#[test]
fn missing_feed_aborts_the_whole_load() {
    let mut stub = Stub::new(MONTHLY, DAILY, &hourly_one_day(), UTILITY);
    stub.0.remove(&Feed::Utility);
    match load_dataset(&stub, &Config::default()) {
        Err(LoadError::Fetch(FetchError::Status { feed, status })) => {
            assert_eq!(feed, Feed::Utility);
            assert_eq!(status, 404);
        }
        other => panic!("Expected fetch failure, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn fallback_source_fills_in_for_a_failing_primary() {
    let primary = Stub(HashMap::new());
    let secondary = Stub::new(MONTHLY, DAILY, &hourly_one_day(), UTILITY);
    let ds = load(&FallbackSource::new(primary, secondary));
    assert_eq!(ds.monthly.len(), 2);
}
