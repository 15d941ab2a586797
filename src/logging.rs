//! Structured logging for the forecast ingest service.
//!
//! Thin layer over the `log` facade that tags every line with the data
//! source it concerns and, where relevant, the zip code being processed.
//! `init_logger` installs `env_logger` as the backend, writing to stderr or
//! appending to a log file.

use crate::model::IngestError;
use chrono::Utc;
use log::{Level, LevelFilter};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Geocoder,
    Forecast,
    Database,
    System,
}

impl DataSource {
    /// `log` target used for lines about this source.
    pub fn target(&self) -> &'static str {
        match self {
            DataSource::Geocoder => "forecast_ingest::geocoder",
            DataSource::Forecast => "forecast_ingest::forecast",
            DataSource::Database => "forecast_ingest::db",
            DataSource::System => "forecast_ingest",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Geocoder => write!(f, "GEO"),
            DataSource::Forecast => write!(f, "DARKSKY"),
            DataSource::Database => write!(f, "DB"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - bad input such as an unknown zip code
    Expected,
    /// Unexpected failure - service degradation, API change or misconfiguration
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classify a run-aborting error.
pub fn classify_failure(err: &IngestError) -> FailureType {
    match err {
        // The geocoder answers 404 for zip codes it does not know
        IngestError::HttpStatus { status: 404, .. } => FailureType::Expected,
        IngestError::HttpStatus { status, .. } if *status >= 500 => FailureType::Unknown,
        // Other 4xx usually means a revoked or mistyped key
        IngestError::HttpStatus { .. } => FailureType::Unexpected,
        // Parse errors suggest an API change
        IngestError::Decode { .. } | IngestError::InvalidTimestamp(_) => FailureType::Unexpected,
        IngestError::Config(_)
        | IngestError::Settings(_)
        | IngestError::SchemaMismatch { .. }
        | IngestError::Encode(_) => FailureType::Unexpected,
        IngestError::Transport { .. }
        | IngestError::Client(_)
        | IngestError::Io(_)
        | IngestError::Database(_) => FailureType::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Logger Initialization
// ---------------------------------------------------------------------------

/// Install `env_logger` as the global logger.
///
/// `RUST_LOG` still refines per-module filters on top of `min_level`.
/// Returns an error if the log file cannot be opened; calling this twice
/// leaves the first logger in place.
pub fn init_logger(min_level: LevelFilter, log_file: Option<&str>) -> std::io::Result<()> {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(min_level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} {}: {}",
                Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
                record.level(),
                record.target(),
                record.args()
            )
        });

    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    // Err only means a logger is already installed
    let _ = builder.try_init();
    Ok(())
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

fn emit(level: Level, source: DataSource, zipcode: Option<&str>, message: &str) {
    let zip_part = zipcode.map(|z| format!(" [{}]", z)).unwrap_or_default();
    log::log!(target: source.target(), level, "{}{}: {}", source, zip_part, message);
}

/// Log a general informational message
pub fn info(source: DataSource, zipcode: Option<&str>, message: &str) {
    emit(Level::Info, source, zipcode, message);
}

/// Log a warning message
pub fn warn(source: DataSource, zipcode: Option<&str>, message: &str) {
    emit(Level::Warn, source, zipcode, message);
}

/// Log an error message
pub fn error(source: DataSource, zipcode: Option<&str>, message: &str) {
    emit(Level::Error, source, zipcode, message);
}

/// Log a debug message
pub fn debug(source: DataSource, zipcode: Option<&str>, message: &str) {
    emit(Level::Debug, source, zipcode, message);
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a failure with automatic classification.
pub fn log_failure(source: DataSource, zipcode: Option<&str>, operation: &str, err: &IngestError) {
    let failure_type = classify_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => warn(source, zipcode, &message),
        FailureType::Unexpected | FailureType::Unknown => error(source, zipcode, &message),
    }
}

// ---------------------------------------------------------------------------
// Batch Summary Logging
// ---------------------------------------------------------------------------

/// Log how many projected rows survived the incomplete-row filter.
pub fn log_batch_summary(total: usize, kept: usize, dropped: usize) {
    let message = format!(
        "Batch assembled: {}/{} rows complete, {} dropped",
        kept, total, dropped
    );

    if dropped == 0 {
        info(DataSource::System, None, &message);
    } else if kept == 0 {
        error(DataSource::System, None, &message);
    } else {
        warn(DataSource::System, None, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_classification() {
        let not_found = IngestError::HttpStatus {
            url: "https://www.zipcodeapi.com/rest/****/info.json/00000/degrees".to_string(),
            status: 404,
        };
        assert_eq!(classify_failure(&not_found), FailureType::Expected);

        let forbidden = IngestError::HttpStatus {
            url: "https://api.darksky.net/forecast/****/37.5,-77.32".to_string(),
            status: 403,
        };
        assert_eq!(classify_failure(&forbidden), FailureType::Unexpected);

        let outage = IngestError::HttpStatus {
            url: "https://api.darksky.net/forecast/****/37.5,-77.32".to_string(),
            status: 503,
        };
        assert_eq!(classify_failure(&outage), FailureType::Unknown);

        let config = IngestError::Config("DARKSKY_KEY must be set".to_string());
        assert_eq!(classify_failure(&config), FailureType::Unexpected);
    }

    #[test]
    fn test_decode_failure_is_unexpected() {
        let source = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = IngestError::Decode {
            url: "https://api.darksky.net/forecast/****/37.5,-77.32".to_string(),
            source,
        };
        assert_eq!(classify_failure(&err), FailureType::Unexpected);
    }

    #[test]
    fn test_data_source_targets_are_distinct() {
        let sources = [
            DataSource::Geocoder,
            DataSource::Forecast,
            DataSource::Database,
            DataSource::System,
        ];
        let mut seen = std::collections::HashSet::new();
        for source in sources {
            assert!(seen.insert(source.target()));
            assert!(source.target().starts_with("forecast_ingest"));
        }
    }

    #[test]
    fn test_init_logger_appends_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ingest.log");
        assert!(init_logger(LevelFilter::Debug, path.to_str()).is_ok());
        assert!(path.exists());
    }
}
