//! Core data types for the forecast ingest service.
//!
//! This module defines the shared domain model imported by all other modules:
//! the zip code key, resolved coordinates, projected rows, and the crate-wide
//! error type. It contains no I/O.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;

/// Provider label stamped on every projected row.
pub const SOURCE_DARKSKY: &str = "Darksky";

// ---------------------------------------------------------------------------
// Location types
// ---------------------------------------------------------------------------

/// A postal code used as the location key for weather lookups.
///
/// The value is whitespace-trimmed on construction. Integer input is
/// formatted as-is, so a leading zero must be supplied as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ZipCode(String);

impl ZipCode {
    pub fn new(raw: impl fmt::Display) -> Self {
        ZipCode(raw.to_string().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZipCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ZipCode {
    fn from(raw: &str) -> Self {
        ZipCode::new(raw)
    }
}

impl From<String> for ZipCode {
    fn from(raw: String) -> Self {
        ZipCode::new(raw)
    }
}

impl From<u32> for ZipCode {
    fn from(raw: u32) -> Self {
        ZipCode::new(raw)
    }
}

/// Geographic coordinates resolved from a zip code. Lives for one run only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// One projected row, exactly as it lands in the in-memory table.
///
/// Provenance columns are always present. Per-day metrics are optional
/// because the forecast provider omits fields it has no value for; a row
/// with any gap is dropped before persistence (see `batch`).
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRow {
    pub source: String,
    pub date_fetched: NaiveDate,
    pub date: Option<NaiveDate>,
    pub zipcode: ZipCode,
    pub latitude: f64,
    pub longitude: f64,
    pub tmax: Option<f64>,
    pub tmin: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub pressure: Option<f64>,
    pub precip_total: Option<f64>,
    pub precip_prob: Option<f64>,
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
    pub cloud_cover: Option<f64>,
    pub heat_index: Option<f64>,
}

impl ForecastRow {
    /// Names of the columns that hold no value, in schema order.
    pub fn missing_columns(&self) -> Vec<&'static str> {
        let checks = [
            ("date", self.date.is_none()),
            ("tmax", self.tmax.is_none()),
            ("tmin", self.tmin.is_none()),
            ("humidity", self.humidity.is_none()),
            ("wind_speed", self.wind_speed.is_none()),
            ("pressure", self.pressure.is_none()),
            ("precip_total", self.precip_total.is_none()),
            ("precip_prob", self.precip_prob.is_none()),
            ("sunrise", self.sunrise.is_none()),
            ("sunset", self.sunset.is_none()),
            ("cloud_cover", self.cloud_cover.is_none()),
            ("heat_index", self.heat_index.is_none()),
        ];
        checks
            .into_iter()
            .filter(|(_, missing)| *missing)
            .map(|(name, _)| name)
            .collect()
    }

    /// Returns the fully populated record, or `None` if any column is empty.
    pub fn complete(&self) -> Option<ForecastRecord> {
        Some(ForecastRecord {
            source: self.source.clone(),
            date_fetched: self.date_fetched,
            date: self.date?,
            zipcode: self.zipcode.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            tmax: self.tmax?,
            tmin: self.tmin?,
            humidity: self.humidity?,
            wind_speed: self.wind_speed?,
            pressure: self.pressure?,
            precip_total: self.precip_total?,
            precip_prob: self.precip_prob?,
            sunrise: self.sunrise?,
            sunset: self.sunset?,
            cloud_cover: self.cloud_cover?,
            heat_index: self.heat_index?,
        })
    }
}

/// The unit of persistence: one forecast day for one zip code in one run.
///
/// Natural key: (date, date_fetched, zipcode, source).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRecord {
    pub source: String,
    pub date_fetched: NaiveDate,
    pub date: NaiveDate,
    pub zipcode: ZipCode,
    pub latitude: f64,
    pub longitude: f64,
    pub tmax: f64,
    pub tmin: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub pressure: f64,
    pub precip_total: f64,
    pub precip_prob: f64,
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
    pub cloud_cover: f64,
    pub heat_index: f64,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that abort an ingest run.
///
/// URLs carried by the variants are already masked (API keys replaced).
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The request never produced a response (DNS, connect, TLS, body read).
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// Non-2xx HTTP response from a collaborator API.
    #[error("HTTP error {status} from {url}")]
    HttpStatus { url: String, status: u16 },
    /// The response body did not match the expected shape.
    #[error("Parse error for {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    /// Records could not be rendered as JSON.
    #[error("Serialization error: {0}")]
    Encode(#[from] serde_json::Error),
    /// A Unix timestamp outside the range chrono can represent.
    #[error("Invalid Unix timestamp: {0}")]
    InvalidTimestamp(i64),
    /// The HTTP client itself could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Settings file error: {0}")]
    Settings(#[from] toml::de::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Database(#[from] postgres::Error),
    /// A uniform record does not carry the columns the schema declares.
    #[error("Record does not match schema {table}: {reason}")]
    SchemaMismatch { table: String, reason: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
