//! Error types for the ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Idempotency key was already committed
    #[error("Idempotency violation: {0}")]
    IdempotencyViolation(String),

    /// Anti-double-count key was already committed
    #[error("Double-count protection triggered: {0}")]
    DoubleCountViolation(String),

    /// Payload cannot be canonically encoded
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Recomputed hashes disagree with the stored chain
    #[error("Chain integrity violated at entry {index}: {reason}")]
    ChainIntegrity {
        /// Position of the first broken entry
        index: usize,
        /// What failed to match
        reason: String,
    },

    /// Audit log line could not be replayed
    #[error("Audit log error at line {line}: {reason}")]
    AuditLog {
        /// 1-based line number
        line: usize,
        /// Why the line was rejected
        reason: String,
    },

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller may recover by choosing a different key, rule or evidence
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::IdempotencyViolation(_) | Error::DoubleCountViolation(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Encoding(err.to_string())
    }
}

impl serde::ser::Error for Error {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        Error::Encoding(msg.to_string())
    }
}
