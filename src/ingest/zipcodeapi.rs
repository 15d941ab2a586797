//! zipcodeapi.com client (location resolver).
//!
//! Converts a zip code to the coordinates of its centroid.
//!
//! API Documentation: https://www.zipcodeapi.com/API#zipToLoc
//! Request: `<base>/<api_key>/info.json/<zipcode>/degrees`

use super::get_json;
use crate::config::ApiEndpoint;
use crate::logging::{self, DataSource};
use crate::model::{IngestError, Location, ZipCode};
use reqwest::blocking::Client;
use serde::Deserialize;

// ============================================================================
// API Response Structures
// ============================================================================

/// `info.json` response. Only `lat` and `lng` are required.
#[derive(Debug, Deserialize)]
pub struct ZipInfoResponse {
    pub zip_code: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl From<&ZipInfoResponse> for Location {
    fn from(info: &ZipInfoResponse) -> Self {
        Location {
            latitude: info.lat,
            longitude: info.lng,
        }
    }
}

// ============================================================================
// API Client Functions
// ============================================================================

pub fn build_location_url(endpoint: &ApiEndpoint, zipcode: &ZipCode) -> String {
    endpoint.url(&format!("info.json/{}/degrees", zipcode))
}

/// Resolve one zip code. One request per call; nothing is cached.
pub fn fetch_location(
    client: &Client,
    endpoint: &ApiEndpoint,
    zipcode: &ZipCode,
) -> Result<Location, IngestError> {
    let url = build_location_url(endpoint, zipcode);
    let info: ZipInfoResponse = get_json(
        client,
        endpoint,
        &url,
        DataSource::Geocoder,
        Some(zipcode.as_str()),
    )?;

    let location = Location::from(&info);
    let place = match (&info.city, &info.state) {
        (Some(city), Some(state)) => format!(" ({}, {})", city, state),
        _ => String::new(),
    };
    logging::debug(
        DataSource::Geocoder,
        Some(zipcode.as_str()),
        &format!(
            "resolved to {}, {}{}",
            location.latitude, location.longitude, place
        ),
    );

    Ok(location)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> ApiEndpoint {
        ApiEndpoint {
            base_url: "https://www.zipcodeapi.com/rest".to_string(),
            api_key: "abc123".to_string(),
        }
    }

    #[test]
    fn test_build_location_url() {
        let url = build_location_url(&endpoint(), &ZipCode::from(" 23250 "));
        assert_eq!(
            url,
            "https://www.zipcodeapi.com/rest/abc123/info.json/23250/degrees"
        );
    }

    #[test]
    fn test_parse_full_response() {
        let json = r#"{
            "zip_code": "23250",
            "lat": 37.5,
            "lng": -77.32,
            "city": "Richmond",
            "state": "VA",
            "timezone": {"timezone_identifier": "America/New_York", "utc_offset_sec": -18000}
        }"#;
        let info: ZipInfoResponse = serde_json::from_str(json).unwrap();
        let location = Location::from(&info);

        assert_eq!(location.latitude, 37.5);
        assert_eq!(location.longitude, -77.32);
        assert_eq!(info.city.as_deref(), Some("Richmond"));
    }

    #[test]
    fn test_parse_minimal_response() {
        let info: ZipInfoResponse = serde_json::from_str(r#"{"lat": 37.5, "lng": -77.32}"#).unwrap();
        assert!(info.zip_code.is_none());
        assert_eq!(Location::from(&info).longitude, -77.32);
    }

    #[test]
    fn test_missing_coordinate_fails_decode() {
        let result = serde_json::from_str::<ZipInfoResponse>(r#"{"lat": 37.5}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_error_body_fails_decode() {
        // zipcodeapi reports bad keys with a 200-shaped error document
        let result = serde_json::from_str::<ZipInfoResponse>(
            r#"{"error_code": 401, "error_msg": "Invalid API key."}"#,
        );
        assert!(result.is_err());
    }
}
