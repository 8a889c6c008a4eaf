//! Append-only mirror of committed audit-log entries.
//!
//! The database table is the system of record. This crate writes the same
//! entries to a JSON Lines file (one entry per line) with an optional SHA-256
//! hash chain so an exported trail can be checked for tampering offline.

use anyhow::{Context, Result};
use ga_schemas::AuditLogEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

mod sink;

pub use sink::{AuditSink, JsonlAuditSink, MemoryAuditSink};

/// One line of the mirror file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// 0-based position in the file.
    pub seq: u64,
    pub entry: AuditLogEntry,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

/// Append-only JSONL writer.
pub struct AuditWriter {
    path: PathBuf,
    hash_chain: bool,
    last_hash: Option<String>,
    seq: u64,
}

impl AuditWriter {
    /// Creates the writer and ensures parent dirs exist. An existing file is
    /// resumed: the sequence and chain continue from its last record.
    pub fn open(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create_dir_all {:?}", parent))?;
            }
        }

        let mut w = Self {
            path,
            hash_chain,
            last_hash: None,
            seq: 0,
        };

        if w.path.exists() {
            let content = fs::read_to_string(&w.path)
                .with_context(|| format!("read audit log {:?}", w.path))?;
            let mut last: Option<AuditRecord> = None;
            for (i, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let rec: AuditRecord = serde_json::from_str(line.trim())
                    .with_context(|| format!("parse audit record at line {}", i + 1))?;
                last = Some(rec);
            }
            if let Some(rec) = last {
                w.seq = rec.seq + 1;
                w.last_hash = rec.hash_self;
            }
        }

        Ok(w)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }

    /// Number of records written so far, including resumed ones.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn append(&mut self, entry: &AuditLogEntry) -> Result<AuditRecord> {
        let mut rec = AuditRecord {
            seq: self.seq,
            entry: entry.clone(),
            hash_prev: None,
            hash_self: None,
        };

        if self.hash_chain {
            rec.hash_prev = self.last_hash.clone();
            rec.hash_self = Some(compute_record_hash(&rec)?);
        }

        let line = canonical_json_line(&rec)?;
        append_line(&self.path, &line)?;

        self.seq += 1;
        if self.hash_chain {
            self.last_hash = rec.hash_self.clone();
        }
        Ok(rec)
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open audit log {:?}", path))?;
    f.write_all(line.as_bytes())
        .context("write audit line failed")?;
    f.write_all(b"\n").context("write newline failed")?;
    Ok(())
}

/// Compact JSON with object keys sorted recursively.
fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize audit record failed")?;
    serde_json::to_string(&sort_keys(&raw)).context("json stringify failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for k in keys {
                out.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// SHA-256 of the canonical record with `hash_self` cleared.
pub fn compute_record_hash(rec: &AuditRecord) -> Result<String> {
    let mut clone = rec.clone();
    clone.hash_self = None;

    let canonical = canonical_json_line(&clone)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Outcome of [`verify_hash_chain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { lines: usize },
    /// First broken line (1-based) and why.
    Broken { line: usize, reason: String },
}

impl VerifyResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResult::Valid { .. })
    }
}

pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read audit log {:?}", path.as_ref()))?;
    verify_hash_chain_str(&content)
}

/// Checks sequence continuity, `hash_prev` linkage and every `hash_self`.
///
/// Once a file is chained (a record links back, or an earlier record carried
/// `hash_self`), every later record must carry `hash_self`.
pub fn verify_hash_chain_str(content: &str) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut chained = false;
    let mut expected_seq = 0u64;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let rec: AuditRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("parse audit record at line {}", i + 1))?;

        if rec.seq != expected_seq {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: format!("seq gap: expected {expected_seq}, got {}", rec.seq),
            });
        }

        if rec.hash_prev != prev_hash {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: format!(
                    "hash_prev mismatch: expected {:?}, got {:?}",
                    prev_hash, rec.hash_prev
                ),
            });
        }

        chained |= rec.hash_prev.is_some();
        if chained && rec.hash_self.is_none() {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: "hash_self missing in chained log".to_string(),
            });
        }

        if let Some(ref claimed) = rec.hash_self {
            chained = true;
            let recomputed = compute_record_hash(&rec)?;
            if *claimed != recomputed {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: format!("hash_self mismatch: claimed {claimed}, recomputed {recomputed}"),
                });
            }
        }

        prev_hash = rec.hash_self;
        expected_seq += 1;
    }

    Ok(VerifyResult::Valid {
        lines: expected_seq as usize,
    })
}
