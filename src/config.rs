// Runtime configuration, read from a TOML file.
//
// Every section is optional; a missing file means built-in defaults, which
// point at the production spreadsheets.
use crate::error::ConfigError;
use crate::types::CostTable;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "solar_report.toml";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub sheets: SheetsConfig,
    pub local: LocalConfig,
    pub costs: CostsConfig,
    pub cache: CacheConfig,
    pub filter: FilterConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SheetsConfig {
    pub solar_sheet_id: String,
    pub monthly_tab: String,
    pub daily_tab: String,
    pub hourly_tab: String,
    pub utility_sheet_id: String,
    pub utility_gid: String,
    pub timeout_secs: u64,
}

/// Local CSV files used when the remote export cannot be read, plus an
/// optional utility file that replaces the remote utility feed outright.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocalConfig {
    pub monthly: Option<PathBuf>,
    pub daily: Option<PathBuf>,
    pub hourly: Option<PathBuf>,
    pub utility: Option<PathBuf>,
    pub utility_override: Option<PathBuf>,
}

impl LocalConfig {
    pub fn is_empty(&self) -> bool {
        self.monthly.is_none()
            && self.daily.is_none()
            && self.hourly.is_none()
            && self.utility.is_none()
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CostsConfig {
    pub cafe: f64,
    pub mercado: f64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilterConfig {
    pub plants: Vec<String>,
    pub years: Vec<i32>,
    pub months: Vec<u32>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub preview_rows: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: "info".to_string(),
            sheets: SheetsConfig::default(),
            local: LocalConfig::default(),
            costs: CostsConfig::default(),
            cache: CacheConfig::default(),
            filter: FilterConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        SheetsConfig {
            solar_sheet_id: "1ceFwwFm6D1QRW4slPj67BlSDR9woGFFaOMLoN1FxVvs".to_string(),
            monthly_tab: "POR MES".to_string(),
            daily_tab: "POR DIA".to_string(),
            hourly_tab: "POR HORA".to_string(),
            utility_sheet_id: "1ANEtNlryqo_4wq1n6V5OlutpcDFMP_EdxxWXgjEhQ3c".to_string(),
            utility_gid: "2089036315".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for CostsConfig {
    fn default() -> Self {
        CostsConfig {
            cafe: 1033.0,
            mercado: 1077.0,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig { ttl_secs: 300 }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            dir: PathBuf::from("."),
            preview_rows: 5,
        }
    }
}

impl CostsConfig {
    pub fn to_table(&self) -> CostTable {
        CostTable::new(self.cafe, self.mercado)
    }
}

impl Config {
    pub fn from_toml_str(s: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read `path`; a file that does not exist yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(s) => Self::from_toml_str(&s, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no config file, using defaults");
                Ok(Config::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg = Config::from_toml_str("", Path::new("x.toml")).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.sheets.timeout_secs, 30);
        assert_eq!(cfg.cache.ttl_secs, 300);
        assert_eq!(cfg.costs.to_table(), CostTable::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = Config::from_toml_str(
            r#"
log_level = "debug"

[costs]
cafe = 1200

[local]
utility_override = "epm.csv"

[filter]
plants = ["CAFE"]
months = [1, 2]
date_from = "2025-01-01"
"#,
            Path::new("x.toml"),
        )
        .unwrap();
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.costs.cafe, 1200.0);
        assert_eq!(cfg.costs.mercado, 1077.0);
        assert_eq!(cfg.local.utility_override, Some(PathBuf::from("epm.csv")));
        assert!(cfg.local.is_empty());
        assert_eq!(cfg.filter.months, vec![1, 2]);
        assert_eq!(cfg.filter.date_from, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(cfg.sheets.monthly_tab, "POR MES");
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let err = Config::from_toml_str("costs = [", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = Config::load(Path::new("/nonexistent/solar_report.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }
}
