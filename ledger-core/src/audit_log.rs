//! JSON Lines audit log
//!
//! One line per committed entry:
//!
//! ```text
//! {"payload":{..},"entry_hash":"..","prev_hash":null,"chain_hash":"..","idempotency_key":"..","adc_key":".."}
//! ```
//!
//! Replay does not trust the stored hashes: every payload is re-canonicalized
//! and re-hashed, every link is checked against the running chain head, and
//! the key sets are rebuilt through the same checks a live commit runs. The
//! log is an export/replay format, not a storage engine.

use crate::{entry::LedgerEntry, ledger::ForensicLedger, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// One audit log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Committed entry
    #[serde(flatten)]
    pub entry: LedgerEntry,

    /// Idempotency key the entry was committed under
    pub idempotency_key: String,

    /// Anti-double-count key, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adc_key: Option<String>,
}

/// File-like target of an [`AuditLogWriter`]
///
/// Appends go through [`Write`]; `byte_len` and `truncate` let a failed append be
/// rolled back to the last complete line.
pub trait AuditSink: Write + Send + fmt::Debug {
    /// Current length in bytes
    fn byte_len(&self) -> io::Result<u64>;

    /// Cut the sink back to `len` bytes
    fn truncate(&mut self, len: u64) -> io::Result<()>;

    /// Flush written bytes to durable storage
    fn sync(&mut self) -> io::Result<()>;
}

impl AuditSink for File {
    fn byte_len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.sync_data()
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Append-only writer, durably flushed after each record
///
/// A record whose write or sync fails is cut back out of the sink, so the
/// log never holds a line the ledger did not admit. If that rollback also
/// fails the writer refuses every later append.
#[derive(Debug)]
pub struct AuditLogWriter {
    sink: Box<dyn AuditSink>,
    poisoned: bool,
}

impl AuditLogWriter {
    /// Open (or create) a log for appending
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        tracing::info!("Opened audit log at {:?}", path.as_ref());
        Ok(Self::from_sink(file))
    }

    /// Write to any sink
    pub fn from_sink(sink: impl AuditSink + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            poisoned: false,
        }
    }

    /// Append one record and fsync
    pub fn append(&mut self, record: &AuditRecord) -> Result<()> {
        if self.poisoned {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                "audit log holds a partial record from an earlier failed append",
            )));
        }

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let start = self.sink.byte_len()?;
        let written = self
            .sink
            .write_all(&line)
            .and_then(|()| self.sink.flush())
            .and_then(|()| self.sink.sync());

        if let Err(err) = written {
            if let Err(rollback) = self.sink.truncate(start) {
                tracing::error!(
                    offset = start,
                    "Audit log rollback failed, refusing further appends: {}",
                    rollback
                );
                self.poisoned = true;
            }
            return Err(err.into());
        }
        Ok(())
    }
}

/// Write every entry of a ledger as JSON lines
pub fn write_records<W: Write>(writer: W, ledger: &ForensicLedger) -> Result<usize> {
    let mut writer = BufWriter::new(writer);
    let mut count = 0;

    for record in ledger.audit_records() {
        serde_json::to_writer(&mut writer, &record)?;
        writer.write_all(b"\n")?;
        count += 1;
    }

    writer.flush()?;
    Ok(count)
}

/// Rebuild a ledger from JSON lines, verifying every record
pub fn replay<R: BufRead>(reader: R) -> Result<ForensicLedger> {
    let mut ledger = ForensicLedger::new();

    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let record: AuditRecord = serde_json::from_str(&line).map_err(|e| Error::AuditLog {
            line: line_no,
            reason: e.to_string(),
        })?;

        ledger.restore(record).map_err(|e| Error::AuditLog {
            line: line_no,
            reason: e.to_string(),
        })?;
    }

    tracing::debug!(entries = ledger.len(), "Replayed audit log");
    Ok(ledger)
}

/// Export a ledger to a file, replacing its contents
pub fn save(path: impl AsRef<Path>, ledger: &ForensicLedger) -> Result<usize> {
    let file = File::create(path)?;
    let count = write_records(&file, ledger)?;
    file.sync_all()?;
    Ok(count)
}

/// Replay a ledger from a file
pub fn load(path: impl AsRef<Path>) -> Result<ForensicLedger> {
    let file = File::open(path)?;
    replay(BufReader::new(file))
}

/// In-memory sink that fails on demand
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct FlakySink {
    pub(crate) data: std::sync::Arc<parking_lot::Mutex<Vec<u8>>>,
    /// Fail the sync of the n-th append (1-based)
    pub(crate) fail_sync_on: Option<usize>,
    /// Accept only this many bytes of the n-th append, then fail
    pub(crate) tear_write_on: Option<(usize, usize)>,
    /// Refuse to truncate
    pub(crate) fail_truncate: bool,
    appends: usize,
    written_this_append: usize,
    sync_failed: bool,
}

#[cfg(test)]
impl FlakySink {
    pub(crate) fn failing_sync_on(append: usize) -> Self {
        Self {
            fail_sync_on: Some(append),
            ..Default::default()
        }
    }

    pub(crate) fn bytes(&self) -> Vec<u8> {
        self.data.lock().clone()
    }
}

#[cfg(test)]
impl Write for FlakySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some((n, keep)) = self.tear_write_on {
            if n == self.appends + 1 {
                let room = keep.saturating_sub(self.written_this_append).min(buf.len());
                if room == 0 {
                    return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
                }
                self.data.lock().extend_from_slice(&buf[..room]);
                self.written_this_append += room;
                return Ok(room);
            }
        }
        self.data.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
impl AuditSink for FlakySink {
    fn byte_len(&self) -> io::Result<u64> {
        Ok(self.data.lock().len() as u64)
    }

    // Ends the current append unless its sync already did
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        if !self.sync_failed {
            self.appends += 1;
        }
        self.sync_failed = false;
        self.written_this_append = 0;
        if self.fail_truncate {
            return Err(io::Error::new(io::ErrorKind::Other, "read-only"));
        }
        self.data.lock().truncate(len as usize);
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.appends += 1;
        self.written_this_append = 0;
        if self.fail_sync_on == Some(self.appends) {
            self.sync_failed = true;
            return Err(io::Error::new(io::ErrorKind::Other, "fsync failed"));
        }
        Ok(())
    }
}
