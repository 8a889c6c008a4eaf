use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use ga_schemas::AuditLogEntry;

use crate::AuditWriter;

/// Receives every committed audit entry after the store has accepted it.
///
/// A failing sink never undoes the transition; callers log and move on.
/// `record` may block on file I/O, so async callers run it on the blocking
/// pool.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditLogEntry) -> Result<()>;
}

/// Thread-safe wrapper over [`AuditWriter`].
pub struct JsonlAuditSink {
    writer: Mutex<AuditWriter>,
}

impl JsonlAuditSink {
    pub fn open(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        Ok(Self {
            writer: Mutex::new(AuditWriter::open(path, hash_chain)?),
        })
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, entry: &AuditLogEntry) -> Result<()> {
        let mut w = self
            .writer
            .lock()
            .map_err(|_| anyhow!("audit writer lock poisoned"))?;
        w.append(entry)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditLogEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditLogEntry> {
        match self.entries.lock() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: &AuditLogEntry) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("memory audit sink lock poisoned"))?
            .push(entry.clone());
        Ok(())
    }
}
