//! Forensic ledger: append-only, hash-chained, exactly-once
//!
//! Every commit is checked against two key sets before anything changes:
//!
//! - **idempotency keys** reject a re-submitted logical request
//! - **anti-double-count (ADC) keys** reject funding the same (rule, evidence)
//!   pair twice
//!
//! A rejected commit leaves the entries and both key sets exactly as they
//! were. A successful commit appends one [`LedgerEntry`] whose `prev_hash` is
//! the previous `chain_hash` (or genesis), so
//! `entries[i].prev_hash == entries[i-1].chain_hash` always holds.
//!
//! # Example
//!
//! ```
//! use yield_ledger_core::{canonical::to_payload, ForensicLedger};
//! use serde_json::json;
//!
//! let mut ledger = ForensicLedger::new();
//! let payload = to_payload(&json!({"rule_id": "US_45W", "amount": 750000})).unwrap();
//! let entry = ledger.commit(payload, "req-1", Some("US_45W:evidence")).unwrap();
//!
//! assert!(entry.is_genesis());
//! assert_eq!(ledger.chain_head(), Some(entry.chain_hash()));
//! ```

use crate::{
    audit_log::AuditRecord,
    canonical::{to_payload, Payload},
    crypto::Digest,
    entry::{verify_chain, LedgerEntry},
    metrics::Metrics,
    Error, Result,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Instant;

/// Append-only store of ledger entries (single writer)
#[derive(Default)]
pub struct ForensicLedger {
    /// Entries in commit order
    entries: Vec<LedgerEntry>,

    /// Idempotency key -> index of the entry it produced
    idempotency_keys: HashMap<String, usize>,

    /// Committed anti-double-count keys
    adc_keys: HashSet<String>,

    /// Keys each entry was committed under, aligned with `entries`
    commit_keys: Vec<(String, Option<String>)>,

    /// Optional Prometheus collector
    metrics: Option<Metrics>,
}

impl ForensicLedger {
    /// Create an empty ledger at genesis
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a metrics collector
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        metrics.chain_length.set(self.entries.len() as i64);
        self.metrics = Some(metrics);
        self
    }

    /// Commit a payload
    ///
    /// An empty `adc_key` is treated as absent. Returns a copy of the new
    /// entry; the ledger's own copy cannot be reached through it.
    pub fn commit(
        &mut self,
        payload: Payload,
        idempotency_key: &str,
        adc_key: Option<&str>,
    ) -> Result<LedgerEntry> {
        let started = Instant::now();
        let entry = self.prepare(payload, idempotency_key, adc_key)?;
        self.append_prepared(entry.clone(), idempotency_key, adc_key, started);
        Ok(entry)
    }

    /// Check both keys and build the entry the next commit would append
    ///
    /// Nothing is mutated. Used directly by callers that must persist the
    /// entry elsewhere before admitting it.
    pub fn prepare(
        &self,
        payload: Payload,
        idempotency_key: &str,
        adc_key: Option<&str>,
    ) -> Result<LedgerEntry> {
        if let Err(err) = self.check_keys(idempotency_key, normalize_adc(adc_key)) {
            self.record_rejection(&err);
            return Err(err);
        }
        Ok(LedgerEntry::new(payload, self.chain_head().copied()))
    }

    /// Append an entry returned by [`prepare`](Self::prepare) with no commit in between
    pub(crate) fn append_prepared(
        &mut self,
        entry: LedgerEntry,
        idempotency_key: &str,
        adc_key: Option<&str>,
        started: Instant,
    ) {
        let adc_key = normalize_adc(adc_key);
        let chain_hash = *entry.chain_hash();
        self.push(entry, idempotency_key, adc_key);

        tracing::info!(
            index = self.entries.len() - 1,
            idempotency_key,
            adc_key = adc_key.unwrap_or(""),
            chain_hash = %chain_hash,
            "Committed ledger entry"
        );

        if let Some(ref metrics) = self.metrics {
            metrics.record_commit(self.entries.len(), started.elapsed().as_secs_f64());
        }
    }

    /// Serialize a record to a payload and commit it
    ///
    /// Fails with [`Error::Encoding`] before touching the ledger if the record
    /// is not a string-keyed mapping.
    pub fn commit_record<T: Serialize + ?Sized>(
        &mut self,
        record: &T,
        idempotency_key: &str,
        adc_key: Option<&str>,
    ) -> Result<LedgerEntry> {
        let payload = to_payload(record)?;
        self.commit(payload, idempotency_key, adc_key)
    }

    /// Read-only view of all entries in chain order
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Chain hash of the last entry, `None` at genesis
    pub fn chain_head(&self) -> Option<&Digest> {
        self.entries.last().map(LedgerEntry::chain_hash)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been committed
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an idempotency key has been committed
    pub fn contains_idempotency_key(&self, key: &str) -> bool {
        self.idempotency_keys.contains_key(key)
    }

    /// Whether an ADC key has been committed
    pub fn contains_adc_key(&self, key: &str) -> bool {
        self.adc_keys.contains(key)
    }

    /// Entry originally produced under an idempotency key
    ///
    /// Lets a caller that hit [`Error::IdempotencyViolation`] fetch the
    /// original result instead of retrying.
    pub fn entry_for_key(&self, idempotency_key: &str) -> Option<&LedgerEntry> {
        self.idempotency_keys
            .get(idempotency_key)
            .and_then(|&index| self.entries.get(index))
    }

    /// Entries paired with the keys they were committed under
    pub fn audit_records(&self) -> impl Iterator<Item = AuditRecord> + '_ {
        self.entries
            .iter()
            .zip(&self.commit_keys)
            .map(|(entry, (idempotency_key, adc_key))| AuditRecord {
                entry: entry.clone(),
                idempotency_key: idempotency_key.clone(),
                adc_key: adc_key.clone(),
            })
    }

    /// Recompute every hash and link from genesis
    pub fn verify(&self) -> Result<()> {
        verify_chain(&self.entries)
    }

    /// Append a record read back from an audit log
    ///
    /// The entry must link to the current head and its hashes must verify.
    pub(crate) fn restore(&mut self, record: AuditRecord) -> Result<()> {
        let AuditRecord {
            entry,
            idempotency_key,
            adc_key,
        } = record;
        let idempotency_key = idempotency_key.as_str();
        let index = self.entries.len();
        let adc_key = normalize_adc(adc_key.as_deref());

        self.check_keys(idempotency_key, adc_key)?;

        if entry.prev_hash() != self.chain_head() {
            return Err(Error::ChainIntegrity {
                index,
                reason: "entry does not link to the current chain head".to_string(),
            });
        }
        entry
            .verify()
            .map_err(|reason| Error::ChainIntegrity { index, reason })?;

        self.push(entry, idempotency_key, adc_key);
        if let Some(ref metrics) = self.metrics {
            metrics.chain_length.set(self.entries.len() as i64);
        }
        Ok(())
    }

    // Both checks run before any mutation; no logging or metrics
    fn check_keys(&self, idempotency_key: &str, adc_key: Option<&str>) -> Result<()> {
        if self.idempotency_keys.contains_key(idempotency_key) {
            return Err(Error::IdempotencyViolation(idempotency_key.to_string()));
        }

        match adc_key {
            Some(adc_key) if self.adc_keys.contains(adc_key) => {
                Err(Error::DoubleCountViolation(adc_key.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn record_rejection(&self, err: &Error) {
        match err {
            Error::IdempotencyViolation(key) => {
                tracing::warn!(idempotency_key = %key, "Rejected commit: idempotency key reused");
                if let Some(ref metrics) = self.metrics {
                    metrics.record_idempotency_rejection();
                }
            }
            Error::DoubleCountViolation(key) => {
                tracing::warn!(adc_key = %key, "Rejected commit: evidence already funds this rule");
                if let Some(ref metrics) = self.metrics {
                    metrics.record_double_count_rejection();
                }
            }
            _ => {}
        }
    }

    fn push(&mut self, entry: LedgerEntry, idempotency_key: &str, adc_key: Option<&str>) {
        let index = self.entries.len();
        self.entries.push(entry);
        self.idempotency_keys
            .insert(idempotency_key.to_string(), index);
        if let Some(adc_key) = adc_key {
            self.adc_keys.insert(adc_key.to_string());
        }
        self.commit_keys
            .push((idempotency_key.to_string(), adc_key.map(str::to_string)));
    }
}

fn normalize_adc(adc_key: Option<&str>) -> Option<&str> {
    adc_key.filter(|k| !k.is_empty())
}

impl fmt::Debug for ForensicLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForensicLedger")
            .field("entries", &self.entries.len())
            .field("chain_head", &self.chain_head())
            .field("adc_keys", &self.adc_keys.len())
            .finish()
    }
}
