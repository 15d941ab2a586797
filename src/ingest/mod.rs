//! HTTP collaborators: the zip code geocoder and the forecast API.
//!
//! Both are blocking, one request per call, no retry and no caching. The
//! `ForecastSource` trait is the seam the row projector depends on, so
//! projection can run against canned payloads without a network.

pub mod darksky;
pub mod zipcodeapi;

use crate::config::{ApiEndpoint, Config};
use crate::logging::{self, DataSource};
use crate::model::{IngestError, Location, ZipCode};
use darksky::ForecastPayload;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;

/// Where the row projector gets coordinates and forecasts from.
pub trait ForecastSource {
    /// Resolve a zip code to coordinates.
    fn locate(&self, zipcode: &ZipCode) -> Result<Location, IngestError>;

    /// Fetch the multi-day forecast for a point.
    fn forecast(&self, longitude: f64, latitude: f64) -> Result<ForecastPayload, IngestError>;
}

/// The live APIs, sharing one HTTP client for the whole run.
pub struct ApiClients<'a> {
    client: Client,
    config: &'a Config,
}

impl<'a> ApiClients<'a> {
    pub fn new(config: &'a Config) -> Result<Self, IngestError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(ApiClients {
            client: builder.build()?,
            config,
        })
    }
}

impl ForecastSource for ApiClients<'_> {
    fn locate(&self, zipcode: &ZipCode) -> Result<Location, IngestError> {
        zipcodeapi::fetch_location(&self.client, &self.config.geocoder, zipcode)
    }

    fn forecast(&self, longitude: f64, latitude: f64) -> Result<ForecastPayload, IngestError> {
        darksky::fetch_forecast(&self.client, &self.config.forecast, longitude, latitude)
    }
}

/// GET `url` and decode its JSON body into `T`.
///
/// The URL is logged and reported with the endpoint's key masked.
fn get_json<T: DeserializeOwned>(
    client: &Client,
    endpoint: &ApiEndpoint,
    url: &str,
    source: DataSource,
    zipcode: Option<&str>,
) -> Result<T, IngestError> {
    let masked = endpoint.mask(url);
    logging::info(source, zipcode, &format!("fetching {}", masked));

    let response = client
        .get(url)
        .header("Accept", "application/json")
        .send()
        .map_err(|e| IngestError::Transport {
            url: masked.clone(),
            source: e.without_url(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(IngestError::HttpStatus {
            url: masked,
            status: status.as_u16(),
        });
    }

    let body = response.text().map_err(|e| IngestError::Transport {
        url: masked.clone(),
        source: e.without_url(),
    })?;

    serde_json::from_str(&body).map_err(|source| IngestError::Decode { url: masked, source })
}
