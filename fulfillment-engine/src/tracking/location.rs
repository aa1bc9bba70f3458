//! Coordinate validation for periodic driver position updates.
//!
//! Location is a last-writer-wins point, not a track: only the latest
//! position is kept on the order. A consumer wanting a history must
//! sample and store it externally.

use shared::models::OrderStatus;
use shared::{CoreError, CoreResult};

/// Parse caller-supplied coordinates. Rejects anything non-numeric,
/// non-finite or outside WGS84 bounds before any state is touched.
pub fn parse_point(lat: &str, lng: &str) -> CoreResult<(f64, f64)> {
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| CoreError::Validation(format!("latitude '{}' is not a number", lat)))?;
    let lng: f64 = lng
        .trim()
        .parse()
        .map_err(|_| CoreError::Validation(format!("longitude '{}' is not a number", lng)))?;

    if !lat.is_finite() || !lng.is_finite() {
        return Err(CoreError::validation("coordinates must be finite"));
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(CoreError::Validation(format!(
            "latitude {} out of range [-90, 90]",
            lat
        )));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(CoreError::Validation(format!(
            "longitude {} out of range [-180, 180]",
            lng
        )));
    }
    Ok((lat, lng))
}

/// Position updates are only meaningful while the order is in active
/// transit.
pub fn is_in_transit(status: OrderStatus) -> bool {
    matches!(status, OrderStatus::Pickup | OrderStatus::Delivered)
}
