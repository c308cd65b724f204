// Entry point and high-level CLI flow.
//
// - Option [1] loads the four feeds (through the cache) and prints
//   normalization diagnostics.
// - Option [2] generates the four report tables and a JSON summary for the
//   current filter.
// - Option [3] changes the filter; the next reports are recomputed from the
//   cached dataset.
// - Option [4] drops the cached dataset and fetches everything again.
// - After generating reports, the user can choose to go back to the
//   selection menu or exit.
use once_cell::sync::Lazy;
use solar_report::cache::TtlCache;
use solar_report::config::{Config, DEFAULT_CONFIG_PATH};
use solar_report::error::LoadError;
use solar_report::fetch::{build_source, FetchKey};
use solar_report::loader::{load_dataset, LoadReport};
use solar_report::output;
use solar_report::reports::{self, Filter, FilterAnswers};
use solar_report::types::Dataset;
use solar_report::util;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// Process-wide state: the cached dataset, the diagnostics of the load that
// produced it and the filter the reports are generated for.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| {
    Mutex::new(AppState {
        cache: TtlCache::new(Duration::from_secs(300)),
        last_report: None,
        filter: Filter::default(),
    })
});

struct AppState {
    cache: TtlCache<FetchKey, Arc<Dataset>>,
    last_report: Option<LoadReport>,
    filter: Filter,
}

fn state() -> MutexGuard<'static, AppState> {
    APP_STATE.lock().unwrap_or_else(|e| e.into_inner())
}

/// Read a single trimmed line of input after printing `prompt`.
fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Read a single line of input after printing the common "Enter choice:" prompt.
fn read_choice() -> String {
    read_line("Enter choice: ")
}

/// Ask the user whether to go back to the menu after generating reports.
///
/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        print!("Back to Report Selection (Y/N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        io::stdin().read_line(&mut buf).ok();
        let resp = buf.trim().to_uppercase();
        match resp.as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Cached dataset for the configured sources, loading it on a miss.
fn dataset(cfg: &Config) -> Result<Arc<Dataset>, LoadError> {
    let key = FetchKey::from_config(cfg);
    let mut state = state();
    let mut fresh_report = None;
    let ds = state.cache.get_or_try_insert_with(&key, || {
        let source = build_source(cfg)?;
        let (ds, report) = load_dataset(&source, cfg)?;
        fresh_report = Some(report);
        Ok::<_, LoadError>(Arc::new(ds))
    })?;
    if let Some(report) = fresh_report {
        state.last_report = Some(report);
    }
    Ok(ds)
}

fn print_load_report(ds: &Dataset, report: &LoadReport) {
    println!(
        "Processing dataset... ({} rows read, {} dropped, {} cells defaulted to 0)",
        util::format_int(report.total_rows() as i64),
        util::format_int(report.dropped_rows() as i64),
        util::format_int(report.defaulted_cells() as i64)
    );
    for (feed, stats) in report.feeds() {
        println!(
            "  {}: {} kept / {} rows",
            feed,
            util::format_int(stats.kept_rows as i64),
            util::format_int(stats.total_rows as i64)
        );
        if !stats.missing_fields.is_empty() {
            println!("    Note: missing columns filled with defaults: {}", stats.missing_fields.join(", "));
        }
    }
    for (plant, cost) in ds.costs.iter() {
        let source = if report.cost_overrides.contains_key(plant) {
            "from utility sheet"
        } else {
            "default"
        };
        println!("  Unit cost {}: {} ({})", plant, util::format_currency(*cost), source);
    }
    let plants: Vec<String> = reports::available_plants(ds)
        .iter()
        .map(|p| p.to_string())
        .collect();
    let years: Vec<String> = reports::available_years(ds)
        .iter()
        .map(|y| y.to_string())
        .collect();
    println!("  Plants: {}; years: {}", plants.join(", "), years.join(", "));
    println!("  Loaded at {}\n", ds.loaded_at.format("%Y-%m-%d %H:%M:%S"));
}

/// Handle option [1]: load (or reuse) the dataset and print diagnostics.
fn handle_load(cfg: &Config) {
    match dataset(cfg) {
        Ok(ds) => {
            let report = state().last_report.clone();
            match report {
                Some(r) => print_load_report(&ds, &r),
                None => println!("Dataset loaded.\n"),
            }
        }
        Err(e) => {
            error!(error = %e, "load failed");
            eprintln!("Failed to load data: {}\n", e);
        }
    }
}

fn join_all<T: ToString>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Handle option [3]: prompt for a new filter. Blank answers mean "all".
fn handle_set_filter(cfg: &Config) {
    println!("Current filter: {}", state().filter.describe());
    match dataset(cfg) {
        Ok(ds) => {
            println!("  Plants available: {}", join_all(reports::available_plants(&ds)));
            println!("  Years available:  {}", join_all(reports::available_years(&ds)));
            println!(
                "  Months available: {}",
                join_all(
                    reports::available_months(&ds)
                        .into_iter()
                        .map(util::month_name)
                )
            );
        }
        Err(e) => eprintln!("Note: data not loaded ({}); values are not checked.", e),
    }
    println!("Separate values with commas; leave blank for all.\n");

    let answers = FilterAnswers {
        plants: read_line("Plants: "),
        years: read_line("Years: "),
        months: read_line("Months: "),
        date_from: read_line("From date (dd/mm/yyyy): "),
        date_to: read_line("To date (dd/mm/yyyy): "),
    };
    let filter = Filter::from_answers(&answers);
    info!(filter = %filter.describe(), "filter changed");
    println!("Filter set: {}\n", filter.describe());
    state().filter = filter;
}

/// Handle option [4]: drop the cached dataset and fetch again.
fn handle_refresh(cfg: &Config) {
    let key = FetchKey::from_config(cfg);
    if state().cache.invalidate(&key) {
        info!("cache invalidated");
    }
    println!("Refreshing data...");
    handle_load(cfg);
}

fn write_report<T: serde::Serialize>(dir: &Path, name: &str, rows: &[T]) {
    let result = output::output_path(dir, name).and_then(|path| output::write_csv(&path, rows));
    if let Err(e) = result {
        eprintln!("Write error: {}", e);
    }
}

/// Handle option [2]: generate all reports and the JSON summary.
///
/// Writes four CSV files and a JSON summary, and prints Markdown previews of
/// each report to the console.
fn handle_generate_reports(cfg: &Config) {
    let ds = match dataset(cfg) {
        Ok(ds) => ds,
        Err(e) => {
            eprintln!("Error: No data available ({}). Please load the data first (option 1).\n", e);
            return;
        }
    };

    let filter = state().filter.resolve(&ds);
    let view = reports::apply_filter(&ds, &filter);
    let dir = &cfg.output.dir;
    let rows = cfg.output.preview_rows;

    println!("Generating reports...");
    println!("Outputs saved to {}\n", dir.display());

    let plants: Vec<String> = filter.plants.iter().map(|p| p.to_string()).collect();
    let scope = format!(
        "Plants: {}; {} months of solar data",
        plants.join(", "),
        view.monthly
            .iter()
            .map(|r| (r.year, r.month))
            .collect::<std::collections::BTreeSet<_>>()
            .len()
    );

    let monthly = reports::monthly_summary(&view, &ds.costs);
    let r1 = reports::generate_monthly_report(&monthly);
    write_report(dir, output::MONTHLY_FILE, &r1);
    output::preview_table(1, "Monthly Solar vs Utility", Some(scope.as_str()), &r1, rows);
    println!(
        "Average per month: solar {} kWh, utility {} kWh, savings {}",
        util::format_number(monthly.avg_solar, 1),
        util::format_number(monthly.avg_utility, 0),
        util::format_currency(monthly.avg_savings)
    );
    println!("(Full table exported to {})\n", output::MONTHLY_FILE);

    let daily = reports::daily_summary(&view, &ds.costs);
    let r2 = reports::generate_daily_report(&daily);
    write_report(dir, output::DAILY_FILE, &r2);
    output::preview_table(2, "Daily Generation", None, &r2, rows);
    println!(
        "Average per producing day: {} kWh (std. dev. {})",
        util::format_number(daily.avg_kwh, 1),
        util::format_number(daily.std_kwh, 1)
    );
    if let Some((date, kwh)) = daily.best_day {
        println!("Best day: {} with {} kWh", util::date_label(date), util::format_number(kwh, 1));
    }
    println!("(Full table exported to {})\n", output::DAILY_FILE);

    let r3 = reports::generate_weekday_report(&view.daily);
    write_report(dir, output::WEEKDAY_FILE, &r3);
    output::preview_table(3, "Average Generation by Weekday", None, &r3, 14);
    println!("(Full table exported to {})\n", output::WEEKDAY_FILE);

    let profile = reports::hourly_profile(&view);
    let r4 = reports::generate_hourly_report(&profile);
    write_report(dir, output::HOURLY_FILE, &r4);
    output::preview_table(
        4,
        "Hourly Profile",
        Some("utility columns are modeled estimates"),
        &r4,
        24,
    );
    let totals = reports::hourly_totals(&view.hourly);
    let (in_window, outside) = reports::peak_window_split(&totals);
    println!(
        "Average producing hour: {} kWh; {}:00-{}:00 window {} kWh vs {} kWh outside",
        util::format_number(reports::average_producing_hour(&profile), 2),
        reports::PEAK_WINDOW.0,
        reports::PEAK_WINDOW.1,
        util::format_number(in_window, 1),
        util::format_number(outside, 1)
    );
    let heatmap = reports::date_hour_totals(&view.hourly, reports::HEATMAP_MAX_DATES);
    let heat_dates = heatmap
        .keys()
        .map(|(d, _)| *d)
        .collect::<std::collections::BTreeSet<_>>();
    if let (Some(first), Some(last)) = (heat_dates.iter().next(), heat_dates.iter().next_back()) {
        println!(
            "Date x hour grid: {} cells from {} to {}",
            util::format_int(heatmap.len() as i64),
            util::date_label(*first),
            util::date_label(*last)
        );
    }
    println!("(Full table exported to {})\n", output::HOURLY_FILE);

    let summary = reports::generate_summary(&ds, &view);
    let written = output::output_path(dir, output::SUMMARY_FILE)
        .and_then(|path| output::write_json(&path, &summary));
    if let Err(e) = written {
        eprintln!("Write error: {}", e);
    }
    println!("Summary Stats ({}):", output::SUMMARY_FILE);
    println!(
        "{{\"generation_kwh\": {}, \"savings\": {}, \"coverage_pct\": {}, \"peak_hour\": {}}}\n",
        util::format_number(summary.generation_total_kwh, 1),
        util::format_currency(summary.savings_total),
        util::format_number(summary.coverage_pct, 1),
        summary
            .peak_hour
            .map(util::hour_label)
            .unwrap_or_else(|| "-".to_string())
    );
}

fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let cfg = match Config::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    init_logging(&cfg.log_level);
    info!(config = %config_path.display(), "starting");
    {
        let mut state = state();
        state.cache.set_ttl(Duration::from_secs(cfg.cache.ttl_secs));
        state.filter = Filter::from_config(&cfg.filter);
    }

    loop {
        println!("Solar Generation vs Utility Consumption:");
        println!("[1] Load the data");
        println!("[2] Generate Reports");
        println!("[3] Set filter");
        println!("[4] Refresh data");
        println!("[5] Exit\n");
        match read_choice().as_str() {
            "1" => handle_load(&cfg),
            "2" => {
                println!();
                handle_generate_reports(&cfg);
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "3" => handle_set_filter(&cfg),
            "4" => handle_refresh(&cfg),
            "5" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 1 to 5.\n"),
        }
    }
}
