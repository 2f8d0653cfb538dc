//! Evidence Matcher for VoltYield
//!
//! Binds a purchase receipt to the telemetry event that proves it, and
//! derives the evidence hash claims are anchored to.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod stitcher;
pub mod types;

pub use error::{Error, Result};
pub use stitcher::{evidence_hash, haversine_meters, EvidenceMatcher, ReceiptStitcher, StitcherConfig};
pub use types::{Evidence, GeoPoint, Receipt, TelemetryEvent};
