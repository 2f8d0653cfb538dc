//! Receipt and telemetry types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use yield_ledger_core::{Digest, MinorUnits};

/// WGS84 coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude
    pub lat: f64,
    /// Longitude
    pub lon: f64,
}

impl GeoPoint {
    /// Create new point
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Finite and within latitude/longitude range
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// One telemetry reading from a charger or vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Asset that produced the reading
    pub asset_id: String,

    /// Reading time (UTC)
    pub timestamp: DateTime<Utc>,

    /// Where the reading was taken
    pub location: GeoPoint,

    /// Energy delivered in mWh
    pub kwh_delivered: u64,

    /// Device status (e.g. `CHARGING`)
    pub status: String,

    /// HMRC digital links unbroken from device to return
    #[serde(default)]
    pub unbroken_lineage: bool,

    /// Vendor-specific extras
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Purchase receipt, as extracted by OCR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// Receipt identifier
    pub receipt_id: String,

    /// Merchant
    pub vendor: String,

    /// Total in minor units
    pub amount_minor: MinorUnits,

    /// ISO 4217 currency
    pub currency: String,

    /// Purchase time (UTC)
    pub timestamp: DateTime<Utc>,

    /// Purchase location; time-only matching when absent
    #[serde(default)]
    pub location: Option<GeoPoint>,

    /// OCR confidence in [0, 1]
    pub confidence: f64,
}

/// Receipt bound to its best telemetry event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Receipt the evidence is for
    pub receipt_id: String,

    /// Winning event
    pub event: TelemetryEvent,

    /// `SHA256("<receipt_id>:<asset_id>")`
    pub evidence_hash: Digest,

    /// Match score (lower is better)
    pub score: f64,

    /// Great-circle distance in meters
    pub distance_m: f64,

    /// Absolute time difference in seconds
    pub time_diff_s: i64,
}
