//! Dark Sky forecast API client (forecast fetcher).
//!
//! Retrieves the multi-day forecast for a coordinate pair. Only the
//! `daily` block is consumed; `currently`, `hourly` and `alerts` are ignored.
//!
//! API Documentation: https://darksky.net/dev/docs#forecast-request
//! Request: `<base>/<api_key>/<latitude>,<longitude>`

use super::get_json;
use crate::config::ApiEndpoint;
use crate::logging::{self, DataSource};
use crate::model::IngestError;
use chrono_tz::Tz;
use reqwest::blocking::Client;
use serde::Deserialize;

// ============================================================================
// API Response Structures
// ============================================================================

/// Forecast response. `daily.data` is required; a payload without it fails
/// to decode.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForecastPayload {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// IANA zone name of the requested point, e.g. "America/New_York".
    pub timezone: Option<String>,
    pub daily: DailyBlock,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DailyBlock {
    pub summary: Option<String>,
    pub data: Vec<DailyEntry>,
}

/// One calendar day of the forecast.
///
/// Dark Sky leaves out fields it has no value for, so every metric is
/// optional here. A present field of the wrong JSON type still fails the
/// decode. Times are Unix seconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyEntry {
    pub time: Option<i64>,
    pub temperature_high: Option<f64>,
    pub temperature_low: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub pressure: Option<f64>,
    pub precip_intensity_max: Option<f64>,
    pub precip_probability: Option<f64>,
    pub sunrise_time: Option<i64>,
    pub sunset_time: Option<i64>,
    pub cloud_cover: Option<f64>,
    pub apparent_temperature_high: Option<f64>,
}

impl ForecastPayload {
    /// Time zone of the forecast location, if reported and known to chrono-tz.
    ///
    /// The payload's top-level `offset` is not read: it holds only at request
    /// time, not across a DST change inside the forecast window.
    pub fn zone(&self) -> Option<Tz> {
        self.timezone.as_deref()?.trim().parse::<Tz>().ok()
    }
}

// ============================================================================
// API Client Functions
// ============================================================================

pub fn build_forecast_url(endpoint: &ApiEndpoint, latitude: f64, longitude: f64) -> String {
    endpoint.url(&format!("{},{}", latitude, longitude))
}

/// Fetch the forecast for one point. Note the longitude-first argument order.
pub fn fetch_forecast(
    client: &Client,
    endpoint: &ApiEndpoint,
    longitude: f64,
    latitude: f64,
) -> Result<ForecastPayload, IngestError> {
    let url = build_forecast_url(endpoint, latitude, longitude);
    let payload: ForecastPayload = get_json(client, endpoint, &url, DataSource::Forecast, None)?;

    logging::debug(
        DataSource::Forecast,
        None,
        &format!(
            "{} daily entries for {},{}",
            payload.daily.data.len(),
            latitude,
            longitude
        ),
    );

    Ok(payload)
}

// ============================================================================
// Tests
// ============================================================================
