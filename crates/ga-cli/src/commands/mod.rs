//! Command handler modules for ga-cli.
//!
//! Shared loaders used by several commands live here. Command-specific
//! logic lives in the submodules.

pub mod decide;
pub mod reconcile;

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use ga_audit::{AuditSink, JsonlAuditSink};
use ga_config::{load_layered_yaml, report_unused_keys, EngineConfig, UnusedKeyPolicy};
use ga_schemas::{normalize_guide, normalize_guide_json, Procedure, RawGuide, RawProcedure};
use serde::Deserialize;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Layered config in merge order. No paths means all defaults.
pub fn load_engine_config(paths: &[String]) -> Result<EngineConfig> {
    if paths.is_empty() {
        return Ok(EngineConfig::default());
    }
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&refs)?;
    info!(config_hash = %loaded.config_hash, "config loaded");

    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        warn!(unused = ?report.unused_leaf_pointers, "CONFIG_UNUSED_KEYS");
    }
    EngineConfig::from_config_json(&loaded.config_json)
}

/// `--as-of YYYY-MM-DD`, defaulting to today (UTC).
pub fn parse_as_of(as_of: Option<&str>) -> Result<NaiveDate> {
    match as_of {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid --as-of '{raw}'; expected YYYY-MM-DD")),
        None => Ok(chrono::Utc::now().date_naive()),
    }
}

pub fn open_audit_mirror(cfg: &EngineConfig) -> Result<Option<Arc<dyn AuditSink>>> {
    match &cfg.audit_jsonl_path {
        Some(path) => {
            let sink = JsonlAuditSink::open(path, cfg.audit_hash_chain)?;
            Ok(Some(Arc::new(sink)))
        }
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Guide files
// ---------------------------------------------------------------------------

/// Load and normalize one guide from a `.csv` or JSON file.
pub fn load_guide_file(path: &str) -> Result<Vec<Procedure>> {
    let is_csv = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    if is_csv {
        let file = File::open(path).with_context(|| format!("open guide csv failed: {path}"))?;
        let raw = raw_guide_from_csv(file).with_context(|| format!("invalid guide csv: {path}"))?;
        return normalize_guide(&raw).with_context(|| format!("guide rejected: {path}"));
    }

    let bytes = std::fs::read(path).with_context(|| format!("read guide failed: {path}"))?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    let raw = std::str::from_utf8(bytes).context("guide file must be UTF-8 text")?;
    normalize_guide_json(raw).with_context(|| format!("guide rejected: {path}"))
}

/// One CSV row per procedure; every row repeats the guide header columns.
#[derive(Debug, Deserialize)]
struct CsvProcedureRow {
    guide_id: String,
    operator_id: String,
    procedure_id: String,
    sequence_number: Option<i32>,
    tariff_code: String,
    description: Option<String>,
    executed_quantity: Option<i64>,
    unit_value: Option<String>,
    total_value: Option<String>,
    surgical_tier: Option<String>,
    status: Option<String>,
}

pub fn raw_guide_from_csv<R: Read>(reader: R) -> Result<RawGuide> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut guide: Option<(String, String)> = None;
    let mut procedures = Vec::new();

    for (i, rec) in rdr.deserialize::<CsvProcedureRow>().enumerate() {
        let row = rec.with_context(|| format!("csv row {}", i + 1))?;

        match &guide {
            None => guide = Some((row.guide_id.clone(), row.operator_id.clone())),
            Some((gid, op)) => {
                if gid.trim() != row.guide_id.trim() || op.trim() != row.operator_id.trim() {
                    bail!(
                        "csv row {}: guide {}/{} differs from {}/{}; one guide per file",
                        i + 1,
                        row.guide_id,
                        row.operator_id,
                        gid,
                        op
                    );
                }
            }
        }

        procedures.push(RawProcedure {
            procedure_id: row.procedure_id,
            sequence_number: row.sequence_number,
            tariff_code: row.tariff_code,
            description: row.description,
            executed_quantity: row.executed_quantity,
            unit_value: row.unit_value,
            total_value: row.total_value,
            surgical_tier: row.surgical_tier,
            status: row.status,
        });
    }

    let (guide_id, operator_id) = guide.context("csv has no procedure rows")?;
    Ok(RawGuide {
        guide_id,
        operator_id,
        procedures,
    })
}
