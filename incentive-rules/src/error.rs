//! Error types for the rulepack

use thiserror::Error;

/// Rulepack error
#[derive(Debug, Error)]
pub enum Error {
    /// No calculator registered under this rule id
    #[error("Unknown rule: {0}")]
    UnknownRule(String),

    /// Parameters belong to a different rule
    #[error("Parameters for {params} passed to rule {rule}")]
    ParamsMismatch {
        /// Rule being evaluated
        rule: String,
        /// Rule the parameters were built for
        params: String,
    },

    /// Input outside what a rule can compute
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Ledger-side failure (fingerprinting, claim encoding)
    #[error("Ledger error: {0}")]
    Ledger(#[from] yield_ledger_core::Error),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
