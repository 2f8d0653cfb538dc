//! Actor-based single writer for async callers
//!
//! One Tokio task owns the [`ForensicLedger`]; every other task talks to it
//! through a cloneable [`LedgerHandle`]. Commits are processed one message at
//! a time, so each is atomic without any lock.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │   prepare() → AuditLogWriter::append() → append      │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! With an audit log attached, an entry is admitted only after its line has
//! been written and synced. A failed write leaves the ledger unchanged and is
//! cut back out of the log.

use crate::{
    audit_log::{AuditLogWriter, AuditRecord},
    canonical::Payload,
    crypto::Digest,
    entry::LedgerEntry,
    ledger::ForensicLedger,
    Error, Result,
};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Commit a payload
    Commit {
        payload: Payload,
        idempotency_key: String,
        adc_key: Option<String>,
        response: oneshot::Sender<Result<LedgerEntry>>,
    },

    /// Snapshot of all entries
    Entries {
        response: oneshot::Sender<Vec<LedgerEntry>>,
    },

    /// Current chain head
    ChainHead {
        response: oneshot::Sender<Option<Digest>>,
    },

    /// Entry produced under an idempotency key
    EntryForKey {
        idempotency_key: String,
        response: oneshot::Sender<Option<LedgerEntry>>,
    },

    /// Verify the whole chain
    Verify {
        response: oneshot::Sender<Result<()>>,
    },

    /// Stop the actor and hand the ledger back
    Shutdown {
        response: oneshot::Sender<ForensicLedger>,
    },
}

/// Actor that owns the ledger
#[derive(Debug)]
pub struct LedgerActor {
    /// The ledger
    ledger: ForensicLedger,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,

    /// Durable log, written before an entry is admitted
    audit_log: Option<AuditLogWriter>,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        ledger: ForensicLedger,
        mailbox: mpsc::Receiver<LedgerMessage>,
        audit_log: Option<AuditLogWriter>,
    ) -> Self {
        Self {
            ledger,
            mailbox,
            audit_log,
        }
    }

    /// Run the actor event loop until shutdown or every handle is dropped
    pub async fn run(mut self) -> ForensicLedger {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Shutdown { response } => {
                    tracing::info!(entries = self.ledger.len(), "Ledger actor shutting down");
                    let _ = response.send(self.ledger);
                    return ForensicLedger::new();
                }
                msg => self.handle_message(msg),
            }
        }

        self.ledger
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::Commit {
                payload,
                idempotency_key,
                adc_key,
                response,
            } => {
                let result = self.commit(payload, &idempotency_key, adc_key.as_deref());
                let _ = response.send(result);
            }

            LedgerMessage::Entries { response } => {
                let _ = response.send(self.ledger.entries().to_vec());
            }

            LedgerMessage::ChainHead { response } => {
                let _ = response.send(self.ledger.chain_head().copied());
            }

            LedgerMessage::EntryForKey {
                idempotency_key,
                response,
            } => {
                let _ = response.send(self.ledger.entry_for_key(&idempotency_key).cloned());
            }

            LedgerMessage::Verify { response } => {
                let _ = response.send(self.ledger.verify());
            }

            LedgerMessage::Shutdown { .. } => {
                // Handled in run loop
            }
        }
    }

    fn commit(
        &mut self,
        payload: Payload,
        idempotency_key: &str,
        adc_key: Option<&str>,
    ) -> Result<LedgerEntry> {
        let Some(audit_log) = self.audit_log.as_mut() else {
            return self.ledger.commit(payload, idempotency_key, adc_key);
        };

        let started = Instant::now();
        let entry = self.ledger.prepare(payload, idempotency_key, adc_key)?;

        let record = AuditRecord {
            entry: entry.clone(),
            idempotency_key: idempotency_key.to_string(),
            adc_key: adc_key.filter(|k| !k.is_empty()).map(str::to_string),
        };
        if let Err(e) = audit_log.append(&record) {
            tracing::error!("Audit log write failed, entry not admitted: {}", e);
            return Err(e);
        }

        self.ledger
            .append_prepared(entry.clone(), idempotency_key, adc_key, started);
        Ok(entry)
    }
}

/// Handle for sending messages to the actor
#[derive(Clone, Debug)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    /// Commit a payload
    pub async fn commit(
        &self,
        payload: Payload,
        idempotency_key: impl Into<String>,
        adc_key: Option<String>,
    ) -> Result<LedgerEntry> {
        let (tx, rx) = oneshot::channel();
        self.send(LedgerMessage::Commit {
            payload,
            idempotency_key: idempotency_key.into(),
            adc_key,
            response: tx,
        })
        .await?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Snapshot of all entries
    pub async fn entries(&self) -> Result<Vec<LedgerEntry>> {
        let (tx, rx) = oneshot::channel();
        self.send(LedgerMessage::Entries { response: tx }).await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Current chain head (`None` at genesis)
    pub async fn chain_head(&self) -> Result<Option<Digest>> {
        let (tx, rx) = oneshot::channel();
        self.send(LedgerMessage::ChainHead { response: tx }).await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Entry produced under an idempotency key
    pub async fn entry_for_key(
        &self,
        idempotency_key: impl Into<String>,
    ) -> Result<Option<LedgerEntry>> {
        let (tx, rx) = oneshot::channel();
        self.send(LedgerMessage::EntryForKey {
            idempotency_key: idempotency_key.into(),
            response: tx,
        })
        .await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Verify the whole chain
    pub async fn verify(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(LedgerMessage::Verify { response: tx }).await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Stop the actor and take the ledger back
    pub async fn shutdown(self) -> Result<ForensicLedger> {
        let (tx, rx) = oneshot::channel();
        self.send(LedgerMessage::Shutdown { response: tx }).await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    async fn send(&self, msg: LedgerMessage) -> Result<()> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(
    ledger: ForensicLedger,
    audit_log: Option<AuditLogWriter>,
    mailbox_capacity: usize,
) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity.max(1)); // Bounded channel for backpressure
    let actor = LedgerActor::new(ledger, rx, audit_log);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}
