//! Receipt ↔ telemetry stitching

use crate::{
    types::{Evidence, GeoPoint, Receipt, TelemetryEvent},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use yield_ledger_core::{crypto::hash_bytes, Digest};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Seconds of time difference worth one meter of distance
pub const SECONDS_PER_METER: f64 = 100.0;

/// Great-circle distance between two points
pub fn haversine_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let (phi1, phi2) = (a.lat.to_radians(), b.lat.to_radians());
    let dphi = (b.lat - a.lat).to_radians();
    let dlambda = (b.lon - a.lon).to_radians();

    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Evidence hash binding a receipt to an asset
pub fn evidence_hash(receipt_id: &str, asset_id: &str) -> Digest {
    hash_bytes(format!("{}:{}", receipt_id, asset_id).as_bytes())
}

/// Matcher interface
pub trait EvidenceMatcher: Send + Sync {
    /// Pick the event that best evidences the receipt
    fn stitch(&self, receipt: &Receipt, events: &[TelemetryEvent]) -> Result<Evidence>;

    /// Matcher name
    fn name(&self) -> &str;
}

/// Candidate filter windows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StitcherConfig {
    /// Reject events farther than this
    pub max_distance_m: Option<f64>,

    /// Reject events further apart in time than this
    pub max_time_diff_s: Option<i64>,
}

/// Deterministic nearest-event stitcher
///
/// Score is `distance_m + |Δt|_s / 100`. Ties fall back to Δt, distance,
/// asset id, then event time, so the winner never depends on input order.
#[derive(Debug, Clone, Default)]
pub struct ReceiptStitcher {
    config: StitcherConfig,
}

struct Candidate<'a> {
    score: f64,
    time_diff_s: i64,
    distance_m: f64,
    event: &'a TelemetryEvent,
}

impl Candidate<'_> {
    fn rank(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then(self.time_diff_s.cmp(&other.time_diff_s))
            .then(self.distance_m.total_cmp(&other.distance_m))
            .then_with(|| self.event.asset_id.cmp(&other.event.asset_id))
            .then(self.event.timestamp.cmp(&other.event.timestamp))
    }
}

impl ReceiptStitcher {
    /// Stitcher with no windows
    pub fn new() -> Self {
        Self::default()
    }

    /// Stitcher with filter windows
    pub fn with_config(config: StitcherConfig) -> Self {
        Self { config }
    }

    fn candidate<'a>(&self, receipt: &Receipt, event: &'a TelemetryEvent) -> Result<Option<Candidate<'a>>> {
        if !event.location.is_valid() {
            return Err(Error::InvalidInput(format!(
                "event for {} has invalid location {:?}",
                event.asset_id, event.location
            )));
        }

        let distance_m = receipt
            .location
            .map_or(0.0, |at| haversine_meters(at, event.location));
        let time_diff_s = (receipt.timestamp - event.timestamp).num_seconds().abs();

        if self.config.max_distance_m.is_some_and(|max| distance_m > max)
            || self.config.max_time_diff_s.is_some_and(|max| time_diff_s > max)
        {
            return Ok(None);
        }

        Ok(Some(Candidate {
            score: distance_m + time_diff_s as f64 / SECONDS_PER_METER,
            time_diff_s,
            distance_m,
            event,
        }))
    }
}

impl EvidenceMatcher for ReceiptStitcher {
    fn stitch(&self, receipt: &Receipt, events: &[TelemetryEvent]) -> Result<Evidence> {
        if let Some(at) = receipt.location {
            if !at.is_valid() {
                return Err(Error::InvalidInput(format!(
                    "receipt {} has invalid location {:?}",
                    receipt.receipt_id, at
                )));
            }
        }

        if events.is_empty() {
            return Err(Error::NoMatch {
                receipt_id: receipt.receipt_id.clone(),
                reason: "no telemetry events".to_string(),
            });
        }

        let mut best: Option<Candidate<'_>> = None;
        for event in events {
            let Some(candidate) = self.candidate(receipt, event)? else {
                continue;
            };
            if best.as_ref().map_or(true, |b| candidate.rank(b) == Ordering::Less) {
                best = Some(candidate);
            }
        }

        let best = best.ok_or_else(|| Error::NoMatch {
            receipt_id: receipt.receipt_id.clone(),
            reason: format!("all {} events outside match windows", events.len()),
        })?;

        let evidence = Evidence {
            receipt_id: receipt.receipt_id.clone(),
            evidence_hash: evidence_hash(&receipt.receipt_id, &best.event.asset_id),
            score: best.score,
            distance_m: best.distance_m,
            time_diff_s: best.time_diff_s,
            event: best.event.clone(),
        };

        tracing::info!(
            receipt_id = %evidence.receipt_id,
            asset_id = %evidence.event.asset_id,
            score = evidence.score,
            evidence_hash = %evidence.evidence_hash,
            "Stitched receipt to telemetry"
        );
        Ok(evidence)
    }

    fn name(&self) -> &str {
        "receipt-stitcher"
    }
}
