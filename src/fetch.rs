// Feed sources: where the raw CSV text of each table comes from.
//
// Production reads the spreadsheet CSV export endpoints with a blocking
// client and a fixed timeout. Local CSV files act as a fallback, and a
// utility file supplied by the user replaces the remote utility feed.
// Any failure aborts the whole load; there is no retry.
use crate::config::{Config, LocalConfig, SheetsConfig};
use crate::error::{Feed, FetchError};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const SHEETS_BASE_URL: &str = "https://docs.google.com/spreadsheets/d";

/// Bodies shorter than this are treated as empty exports.
const MIN_BODY_LEN: usize = 10;

pub trait FeedSource {
    /// Raw CSV text of `feed`.
    fn fetch(&self, feed: Feed) -> Result<String, FetchError>;
}

impl<T: FeedSource + ?Sized> FeedSource for Box<T> {
    fn fetch(&self, feed: Feed) -> Result<String, FetchError> {
        (**self).fetch(feed)
    }
}

// ---------------------------------------------------------------------------
// Remote spreadsheet export
// ---------------------------------------------------------------------------

/// URL plus query pairs of one export request.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub url: String,
    pub query: Vec<(&'static str, String)>,
}

/// Export of a tab addressed by its name.
pub fn tab_export(sheet_id: &str, tab: &str) -> ExportRequest {
    ExportRequest {
        url: format!("{}/{}/gviz/tq", SHEETS_BASE_URL, sheet_id),
        query: vec![("tqx", "out:csv".to_string()), ("sheet", tab.to_string())],
    }
}

/// Export of a tab addressed by its numeric gid.
pub fn gid_export(sheet_id: &str, gid: &str) -> ExportRequest {
    ExportRequest {
        url: format!("{}/{}/export", SHEETS_BASE_URL, sheet_id),
        query: vec![("format", "csv".to_string()), ("gid", gid.to_string())],
    }
}

/// Accept a response body only if it looks like CSV data.
pub fn check_body(feed: Feed, status: u16, body: String) -> Result<String, FetchError> {
    if status != 200 {
        return Err(FetchError::Status { feed, status });
    }
    let head = body.trim_start();
    if head.len() < MIN_BODY_LEN {
        return Err(FetchError::EmptyBody { feed });
    }
    let lower: String = head.chars().take(32).collect::<String>().to_lowercase();
    if lower.starts_with("<!doctype html") || lower.starts_with("<html") {
        return Err(FetchError::PermissionPage { feed });
    }
    Ok(body)
}

pub struct SheetsSource {
    client: reqwest::blocking::Client,
    sheets: SheetsConfig,
}

impl SheetsSource {
    pub fn new(sheets: &SheetsConfig) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(sheets.timeout_secs))
            .build()
            .map_err(FetchError::Client)?;
        Ok(SheetsSource {
            client,
            sheets: sheets.clone(),
        })
    }

    pub fn request_for(&self, feed: Feed) -> ExportRequest {
        let s = &self.sheets;
        match feed {
            Feed::SolarMonthly => tab_export(&s.solar_sheet_id, &s.monthly_tab),
            Feed::SolarDaily => tab_export(&s.solar_sheet_id, &s.daily_tab),
            Feed::SolarHourly => tab_export(&s.solar_sheet_id, &s.hourly_tab),
            Feed::Utility => gid_export(&s.utility_sheet_id, &s.utility_gid),
        }
    }
}

impl FeedSource for SheetsSource {
    fn fetch(&self, feed: Feed) -> Result<String, FetchError> {
        let req = self.request_for(feed);
        info!(%feed, url = %req.url, "fetching");

        let response = self
            .client
            .get(&req.url)
            .query(&req.query)
            .send()
            .map_err(|source| FetchError::Http { feed, source })?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|source| FetchError::Http { feed, source })?;

        let body = check_body(feed, status, body)?;
        info!(%feed, bytes = body.len(), "fetched");
        Ok(body)
    }
}

// ---------------------------------------------------------------------------
// Local files
// ---------------------------------------------------------------------------

fn read_file(feed: Feed, path: &Path) -> Result<String, FetchError> {
    std::fs::read_to_string(path).map_err(|source| FetchError::Io {
        feed,
        path: path.to_path_buf(),
        source,
    })
}

/// CSV files on disk, one per feed.
pub struct LocalSource {
    paths: LocalConfig,
}

impl LocalSource {
    pub fn new(paths: &LocalConfig) -> Self {
        LocalSource {
            paths: paths.clone(),
        }
    }

    fn path_for(&self, feed: Feed) -> Option<&PathBuf> {
        match feed {
            Feed::SolarMonthly => self.paths.monthly.as_ref(),
            Feed::SolarDaily => self.paths.daily.as_ref(),
            Feed::SolarHourly => self.paths.hourly.as_ref(),
            Feed::Utility => self.paths.utility.as_ref(),
        }
    }
}

impl FeedSource for LocalSource {
    fn fetch(&self, feed: Feed) -> Result<String, FetchError> {
        let path = self
            .path_for(feed)
            .ok_or(FetchError::NotConfigured { feed })?;
        info!(%feed, path = %path.display(), "reading local file");
        read_file(feed, path)
    }
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// Try `primary`; on failure, log it and try `secondary`. If both fail the
/// primary error is reported.
pub struct FallbackSource<P, S> {
    primary: P,
    secondary: S,
}

impl<P: FeedSource, S: FeedSource> FallbackSource<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        FallbackSource { primary, secondary }
    }
}

impl<P: FeedSource, S: FeedSource> FeedSource for FallbackSource<P, S> {
    fn fetch(&self, feed: Feed) -> Result<String, FetchError> {
        match self.primary.fetch(feed) {
            Ok(body) => Ok(body),
            Err(primary_err) => {
                warn!(%feed, error = %primary_err, "primary source failed, trying fallback");
                self.secondary.fetch(feed).map_err(|fallback_err| {
                    warn!(%feed, error = %fallback_err, "fallback source failed");
                    primary_err
                })
            }
        }
    }
}

/// Serve the utility feed from a user-supplied file, everything else from
/// `inner`.
pub struct UtilityOverride<S> {
    inner: S,
    path: PathBuf,
}

impl<S: FeedSource> UtilityOverride<S> {
    pub fn new(inner: S, path: PathBuf) -> Self {
        UtilityOverride { inner, path }
    }
}

impl<S: FeedSource> FeedSource for UtilityOverride<S> {
    fn fetch(&self, feed: Feed) -> Result<String, FetchError> {
        match feed {
            Feed::Utility => {
                info!(path = %self.path.display(), "using utility override file");
                read_file(feed, &self.path)
            }
            _ => self.inner.fetch(feed),
        }
    }
}

/// Remote export, with local files as fallback when configured and the
/// utility override applied last.
pub fn build_source(cfg: &Config) -> Result<Box<dyn FeedSource>, FetchError> {
    let remote = SheetsSource::new(&cfg.sheets)?;
    let base: Box<dyn FeedSource> = if cfg.local.is_empty() {
        Box::new(remote)
    } else {
        Box::new(FallbackSource::new(remote, LocalSource::new(&cfg.local)))
    };
    Ok(match &cfg.local.utility_override {
        Some(path) => Box::new(UtilityOverride::new(base, path.clone())),
        None => base,
    })
}

/// Cache key: everything that decides what a load would fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub solar_sheet_id: String,
    pub tabs: [String; 3],
    pub utility_sheet_id: String,
    pub utility_gid: String,
    pub local: [Option<PathBuf>; 5],
}

impl FetchKey {
    pub fn from_config(cfg: &Config) -> Self {
        let s = &cfg.sheets;
        let l = &cfg.local;
        FetchKey {
            solar_sheet_id: s.solar_sheet_id.clone(),
            tabs: [s.monthly_tab.clone(), s.daily_tab.clone(), s.hourly_tab.clone()],
            utility_sheet_id: s.utility_sheet_id.clone(),
            utility_gid: s.utility_gid.clone(),
            local: [
                l.monthly.clone(),
                l.daily.clone(),
                l.hourly.clone(),
                l.utility.clone(),
                l.utility_override.clone(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Fixed(Result<&'static str, u16>, Cell<usize>);

    impl FeedSource for Fixed {
        fn fetch(&self, feed: Feed) -> Result<String, FetchError> {
            self.1.set(self.1.get() + 1);
            match self.0 {
                Ok(body) => Ok(body.to_string()),
                Err(status) => Err(FetchError::Status { feed, status }),
            }
        }
    }

    #[test]
    fn export_requests() {
        let r = tab_export("abc", "POR MES");
        assert_eq!(r.url, "https://docs.google.com/spreadsheets/d/abc/gviz/tq");
        assert!(r.query.contains(&("sheet", "POR MES".to_string())));
        let r = gid_export("xyz", "42");
        assert_eq!(r.url, "https://docs.google.com/spreadsheets/d/xyz/export");
        assert!(r.query.contains(&("gid", "42".to_string())));
    }

    #[test]
    fn bodies_are_validated() {
        let csv = "anio,mes,planta,energia_kwh\n2025,1,CAFE,1".to_string();
        assert!(check_body(Feed::SolarMonthly, 200, csv).is_ok());
        assert!(matches!(
            check_body(Feed::SolarMonthly, 404, "x".repeat(20)),
            Err(FetchError::Status { status: 404, .. })
        ));
        assert!(matches!(
            check_body(Feed::Utility, 200, " a,b ".into()),
            Err(FetchError::EmptyBody { .. })
        ));
        assert!(matches!(
            check_body(Feed::Utility, 200, "<!DOCTYPE html><html><body>Sign in</body>".into()),
            Err(FetchError::PermissionPage { .. })
        ));
    }

    #[test]
    fn fallback_only_on_failure() {
        let ok = FallbackSource::new(Fixed(Ok("primary"), Cell::new(0)), Fixed(Ok("local"), Cell::new(0)));
        assert_eq!(ok.fetch(Feed::SolarDaily).unwrap(), "primary");
        assert_eq!(ok.secondary.1.get(), 0);

        let failing = FallbackSource::new(Fixed(Err(500), Cell::new(0)), Fixed(Ok("local"), Cell::new(0)));
        assert_eq!(failing.fetch(Feed::SolarDaily).unwrap(), "local");

        let both = FallbackSource::new(Fixed(Err(500), Cell::new(0)), Fixed(Err(404), Cell::new(0)));
        assert!(matches!(
            both.fetch(Feed::SolarDaily),
            Err(FetchError::Status { status: 500, .. })
        ));
    }

    #[test]
    fn override_replaces_only_utility() {
        let src = UtilityOverride::new(
            Fixed(Ok("remote"), Cell::new(0)),
            PathBuf::from("/nonexistent/epm.csv"),
        );
        assert_eq!(src.fetch(Feed::SolarHourly).unwrap(), "remote");
        assert!(matches!(src.fetch(Feed::Utility), Err(FetchError::Io { .. })));
        assert_eq!(src.inner.1.get(), 1);
    }

    #[test]
    fn local_source_reports_unconfigured_feeds() {
        let src = LocalSource::new(&LocalConfig::default());
        assert!(matches!(
            src.fetch(Feed::SolarMonthly),
            Err(FetchError::NotConfigured { feed: Feed::SolarMonthly })
        ));
    }

    #[test]
    fn fetch_key_tracks_sources() {
        let mut cfg = Config::default();
        let a = FetchKey::from_config(&cfg);
        cfg.local.utility_override = Some(PathBuf::from("epm.csv"));
        assert_ne!(a, FetchKey::from_config(&cfg));
    }
}
