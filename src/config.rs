//! Run configuration.
//!
//! A `Config` is assembled once at startup and passed by reference to the
//! resolver, the fetcher and the storage sink. Sources, lowest precedence
//! first:
//!
//! 1. built-in defaults (public API base URLs, `info` logging, no timeout)
//! 2. an optional TOML settings file for non-secret values
//! 3. environment variables (a `.env` file is loaded first if present)
//!
//! API keys only ever come from the environment.

use crate::model::IngestError;
use log::LevelFilter;
use serde::Deserialize;
use std::env;
use std::fs;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_FORECAST_URL: &str = "https://api.darksky.net/forecast";
pub const DEFAULT_GEOCODER_URL: &str = "https://www.zipcodeapi.com/rest";

pub const ENV_FORECAST_KEY: &str = "DARKSKY_KEY";
pub const ENV_GEOCODER_KEY: &str = "ZIPCODEAPI_KEY";
pub const ENV_FORECAST_URL: &str = "DARKSKY_URL";
pub const ENV_GEOCODER_URL: &str = "ZIPCODEAPI_URL";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_LOG_LEVEL: &str = "FORECAST_LOG_LEVEL";

const MASK: &str = "****";

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// A keyed HTTP API: requests are `<base_url>/<api_key>/<path>`.
#[derive(Debug, Clone)]
pub struct ApiEndpoint {
    pub base_url: String,
    pub api_key: String,
}

impl ApiEndpoint {
    /// Builds the request URL for `path` under this endpoint's key.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.api_key,
            path.trim_start_matches('/')
        )
    }

    /// Replaces the key segment of `url` so it can be logged or put in an
    /// error. Only the path segment right after `base_url` is touched; a URL
    /// not built by this endpoint is returned unchanged.
    pub fn mask(&self, url: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let key_segment = format!("{}/{}", base, self.api_key);
        match url.strip_prefix(&key_segment) {
            Some(rest) if !self.api_key.is_empty() && (rest.is_empty() || rest.starts_with('/')) => {
                format!("{}/{}{}", base, MASK, rest)
            }
            _ => url.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Dark Sky forecast API.
    pub forecast: ApiEndpoint,
    /// zipcodeapi.com geocoder.
    pub geocoder: ApiEndpoint,
    /// Postgres connection string. Only needed when writing to the database.
    pub database_url: Option<String>,
    /// Per-request timeout. `None` keeps the HTTP client's default.
    pub request_timeout: Option<Duration>,
    pub log_level: LevelFilter,
    /// Append log lines to this file instead of stderr.
    pub log_file: Option<String>,
}

impl Config {
    /// Loads `.env`, the optional settings file, then the process environment.
    pub fn load(settings_path: Option<&str>) -> Result<Config, IngestError> {
        dotenv::dotenv().ok();

        let settings = match settings_path {
            Some(path) => Some(fs::read_to_string(path)?),
            None => None,
        };

        Config::from_sources(settings.as_deref(), |name| env::var(name).ok())
    }

    /// Builds a config from settings text and an environment lookup.
    ///
    /// `lookup` returns the value of a variable, or `None` if unset.
    pub fn from_sources<F>(settings: Option<&str>, lookup: F) -> Result<Config, IngestError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings: Settings = match settings {
            Some(text) => toml::from_str(text)?,
            None => Settings::default(),
        };

        // Empty variables count as unset.
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &str| {
            var(name).ok_or_else(|| {
                IngestError::Config(format!("environment variable {} must be set", name))
            })
        };

        let forecast = ApiEndpoint {
            base_url: var(ENV_FORECAST_URL)
                .or(settings.forecast.base_url)
                .unwrap_or_else(|| DEFAULT_FORECAST_URL.to_string()),
            api_key: required(ENV_FORECAST_KEY)?,
        };

        let geocoder = ApiEndpoint {
            base_url: var(ENV_GEOCODER_URL)
                .or(settings.geocoder.base_url)
                .unwrap_or_else(|| DEFAULT_GEOCODER_URL.to_string()),
            api_key: required(ENV_GEOCODER_KEY)?,
        };

        let log_level = match var(ENV_LOG_LEVEL).or(settings.logging.level) {
            Some(level) => LevelFilter::from_str(level.trim())
                .map_err(|_| IngestError::Config(format!("unknown log level '{}'", level)))?,
            None => LevelFilter::Info,
        };

        Ok(Config {
            forecast,
            geocoder,
            database_url: var(ENV_DATABASE_URL).or(settings.database.url),
            request_timeout: settings.http.timeout_secs.map(Duration::from_secs),
            log_level,
            log_file: settings.logging.file,
        })
    }

    /// Returns the database URL, or a configuration error if none was given.
    pub fn require_database_url(&self) -> Result<&str, IngestError> {
        self.database_url.as_deref().ok_or_else(|| {
            IngestError::Config(format!(
                "environment variable {} must be set (or [database] url in the settings file)",
                ENV_DATABASE_URL
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// Settings file
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Settings {
    forecast: EndpointSettings,
    geocoder: EndpointSettings,
    database: DatabaseSettings,
    logging: LoggingSettings,
    http: HttpSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EndpointSettings {
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DatabaseSettings {
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoggingSettings {
    level: Option<String>,
    file: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HttpSettings {
    timeout_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
