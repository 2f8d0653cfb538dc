//! VoltYield Ledger Core
//!
//! Tamper-evident, append-only ledger for incentive claims, and the
//! deterministic optimizer that decides which claims to record.
//!
//! # Architecture
//!
//! - **Canonical encoding**: sorted keys, no whitespace; the only hash pre-image
//! - **Hash chain**: `chain_hash = SHA256(prev_hex || entry_hex)`
//! - **Exactly-once**: idempotency keys and anti-double-count keys checked
//!   before any mutation
//! - **Single writer**: `&mut` ownership, a mutex-wrapped [`SharedLedger`], or
//!   the [`actor`] task
//!
//! # Invariants
//!
//! - Deterministic: same payload sequence → byte-identical hashes
//! - Append-only: entries never modified or deleted
//! - Linked: `entries[i].prev_hash == entries[i-1].chain_hash`

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod audit_log;
pub mod canonical;
pub mod config;
pub mod crypto;
pub mod entry;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod optimizer;
pub mod shared;
pub mod types;

// Re-exports
pub use canonical::{canonical_encode, Payload};
pub use config::Config;
pub use crypto::Digest;
pub use entry::{verify_chain, LedgerEntry};
pub use error::{Error, Result};
pub use ledger::ForensicLedger;
pub use optimizer::{BasisBudget, YieldOptimizer, YieldPlan};
pub use shared::SharedLedger;
pub use types::{AdcKey, AuditState, ClaimPayload, MinorUnits, RuleResult};
