// Error types for loading solar and utility data
//
// Only whole-load failures are errors. Individual cells that cannot be read
// are absorbed by the coercion helpers in `util` and counted in the
// `LoadReport` instead.
use std::path::PathBuf;
use thiserror::Error;

/// Which of the four input tables a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    SolarMonthly,
    SolarDaily,
    SolarHourly,
    Utility,
}

impl Feed {
    pub const ALL: [Feed; 4] = [
        Feed::SolarMonthly,
        Feed::SolarDaily,
        Feed::SolarHourly,
        Feed::Utility,
    ];
}

impl std::fmt::Display for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Feed::SolarMonthly => write!(f, "solar by month"),
            Feed::SolarDaily => write!(f, "solar by day"),
            Feed::SolarHourly => write!(f, "solar by hour"),
            Feed::Utility => write!(f, "utility consumption"),
        }
    }
}

/// Failure to obtain the raw CSV text of a feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport failure, including the request timeout
    #[error("request for {feed} failed: {source}")]
    Http {
        feed: Feed,
        #[source]
        source: reqwest::Error,
    },

    #[error("{feed} returned HTTP {status}")]
    Status { feed: Feed, status: u16 },

    #[error("{feed} returned an empty document")]
    EmptyBody { feed: Feed },

    /// The export endpoint answered with a sign-in or permission page.
    /// Usually the sheet is not shared as "anyone with the link can view".
    #[error("{feed} returned an HTML page instead of CSV (check the sheet's sharing settings)")]
    PermissionPage { feed: Feed },

    #[error("cannot read {feed} from {}: {source}", path.display())]
    Io {
        feed: Feed,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no source configured for {feed}")]
    NotConfigured { feed: Feed },

    #[error("cannot build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Failure of a whole data load. No partial dataset is produced.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("malformed CSV in {feed}: {source}")]
    Csv {
        feed: Feed,
        #[source]
        source: csv::Error,
    },

    /// Neither a plant nor an energy column could be found under any alias.
    #[error("{feed} has no usable columns (missing '{column}')")]
    MissingColumn { feed: Feed, column: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_converts_into_load_error() {
        let err: LoadError = FetchError::Status {
            feed: Feed::Utility,
            status: 403,
        }
        .into();
        match err {
            LoadError::Fetch(FetchError::Status { status, .. }) => assert_eq!(status, 403),
            other => panic!("Expected Fetch error, got {:?}", other),
        }
    }

    #[test]
    fn messages_name_the_feed() {
        let msg = FetchError::PermissionPage {
            feed: Feed::SolarDaily,
        }
        .to_string();
        assert!(msg.contains("solar by day"));
        assert!(msg.contains("sharing"));

        let msg = LoadError::MissingColumn {
            feed: Feed::SolarMonthly,
            column: "energia_kwh".into(),
        }
        .to_string();
        assert!(msg.contains("energia_kwh"));
    }
}
