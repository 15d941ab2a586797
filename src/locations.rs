//! Target location registry for the forecast ingest service.
//!
//! Defines the canonical list of zip codes fetched on every run. This is the
//! single source of truth for target locations; the list is deliberately an
//! in-process constant rather than a runtime flag.

use crate::model::ZipCode;

// ---------------------------------------------------------------------------
// Target metadata
// ---------------------------------------------------------------------------

/// A single zip code the service fetches forecasts for.
pub struct TargetLocation {
    /// 5-digit US zip code.
    pub zipcode: &'static str,
    /// Human-readable label for log lines.
    pub label: &'static str,
}

/// All zip codes fetched per run, in fetch order.
pub static TARGET_LOCATIONS: &[TargetLocation] = &[TargetLocation {
    zipcode: "23250",
    label: "Richmond International Airport, VA",
}];

/// Returns the target zip codes in registry order, ready for projection.
pub fn all_zipcodes() -> Vec<ZipCode> {
    TARGET_LOCATIONS
        .iter()
        .map(|t| ZipCode::from(t.zipcode))
        .collect()
}

/// Looks up a target by zip code. Returns `None` if not registered.
pub fn find_target(zipcode: &str) -> Option<&'static TargetLocation> {
    let zipcode = zipcode.trim();
    TARGET_LOCATIONS.iter().find(|t| t.zipcode == zipcode)
}

/// Zip code with its registry label, e.g. `23250 (Richmond International
/// Airport, VA)`. Unregistered codes are returned bare.
pub fn describe(zipcode: &ZipCode) -> String {
    match find_target(zipcode.as_str()) {
        Some(target) => format!("{} ({})", target.zipcode, target.label),
        None => zipcode.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
