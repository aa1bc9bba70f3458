//! User directory records.
//!
//! The directory itself is an external collaborator; the core only reads
//! these records for existence checks, role checks and driver eligibility.

use serde::{Deserialize, Serialize};

/// Account role in the marketplace.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Buyer,
    /// Local merchant (UMKM) account.
    Merchant,
    Driver,
    Admin,
}

/// Geographic point (WGS84 degrees).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// User record as seen by the fulfillment core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: UserRole,
    pub active: bool,
    /// Account passed verification (drivers must be verified to receive
    /// the ready fan-out).
    #[serde(default)]
    pub verified: bool,
    /// Registered location (merchants: store address point).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

impl User {
    pub fn is_merchant(&self) -> bool {
        self.role == UserRole::Merchant
    }

    pub fn is_driver(&self) -> bool {
        self.role == UserRole::Driver
    }
}
