//! Thread-shared ledger
//!
//! [`SharedLedger`] puts one exclusive lock around each whole operation, so a
//! commit's three mutations (append, idempotency key, ADC key) are never
//! observed half-done. Hold times are short: hashing and set lookups only.

use crate::{
    canonical::Payload, crypto::Digest, entry::LedgerEntry, ledger::ForensicLedger, Result,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Cloneable handle to one ledger shared across threads
#[derive(Clone, Debug, Default)]
pub struct SharedLedger {
    inner: Arc<Mutex<ForensicLedger>>,
}

impl SharedLedger {
    /// Share an existing ledger
    pub fn new(ledger: ForensicLedger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    /// Commit under the lock
    pub fn commit(
        &self,
        payload: Payload,
        idempotency_key: &str,
        adc_key: Option<&str>,
    ) -> Result<LedgerEntry> {
        self.inner.lock().commit(payload, idempotency_key, adc_key)
    }

    /// Snapshot of all entries
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.inner.lock().entries().to_vec()
    }

    /// Current chain head
    pub fn chain_head(&self) -> Option<Digest> {
        self.inner.lock().chain_head().copied()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether nothing has been committed
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Verify the whole chain
    pub fn verify(&self) -> Result<()> {
        self.inner.lock().verify()
    }

    /// Run a read-only closure against a consistent view
    pub fn with_ledger<R>(&self, f: impl FnOnce(&ForensicLedger) -> R) -> R {
        f(&self.inner.lock())
    }
}
