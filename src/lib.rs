// Normalization and reporting for solar generation and utility
// consumption spreadsheets.
//
// Four feeds (solar by month, day and hour, plus utility consumption) are
// fetched as CSV, normalized into canonical records and turned into
// savings, coverage and hourly-profile reports.

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod normalize;
pub mod output;
pub mod reports;
pub mod types;
pub mod util;
