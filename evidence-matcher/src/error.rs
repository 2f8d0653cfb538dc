//! Error types for evidence matching

use thiserror::Error;

/// Evidence matcher error
#[derive(Debug, Error)]
pub enum Error {
    /// No telemetry event qualifies for the receipt
    #[error("No telemetry match for receipt {receipt_id}: {reason}")]
    NoMatch {
        /// Receipt being stitched
        receipt_id: String,
        /// Why nothing matched
        reason: String,
    },

    /// Malformed receipt or event
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
