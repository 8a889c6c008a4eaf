use anyhow::{bail, Context, Result};
use ga_reconcile::{DuplicatePolicy, ReconcileSettings, ReferenceTables, ValueTolerance};
use ga_schemas::Contract;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATABASE_URL_ENV: &str = "GA_DATABASE_URL";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8899";

/// 100% expressed in basis points.
const MAX_TOLERANCE_BPS: u64 = 10_000;

/// Typed view of the merged config. Every field has a default, so an empty
/// document is a valid configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub value_tolerance: ValueTolerance,
    pub duplicate_policy: DuplicatePolicy,
    pub reference_tables_path: Option<PathBuf>,
    /// YAML contract list, used when no database is configured.
    pub contracts_path: Option<PathBuf>,
    pub audit_jsonl_path: Option<PathBuf>,
    pub audit_hash_chain: bool,
    /// NAME of the env var holding the database URL.
    pub database_url_env: String,
    pub bind_addr: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            value_tolerance: ValueTolerance::default(),
            duplicate_policy: DuplicatePolicy::default(),
            reference_tables_path: None,
            contracts_path: None,
            audit_jsonl_path: None,
            audit_hash_chain: true,
            database_url_env: DEFAULT_DATABASE_URL_ENV.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        let mut cfg = EngineConfig::default();

        if let Some(v) = config_json.pointer("/reconcile/value_tolerance_bps") {
            let bps = v
                .as_u64()
                .context("CONFIG_INVALID /reconcile/value_tolerance_bps must be a non-negative integer")?;
            if bps > MAX_TOLERANCE_BPS {
                bail!("CONFIG_INVALID /reconcile/value_tolerance_bps={bps} exceeds {MAX_TOLERANCE_BPS}");
            }
            // Bounded by MAX_TOLERANCE_BPS above.
            cfg.value_tolerance = ValueTolerance::from_bps(bps as u32);
        }

        cfg.duplicate_policy = parse_duplicate_policy(config_json)?;

        cfg.reference_tables_path = read_str_at(config_json, "/reference/tables_path").map(PathBuf::from);
        cfg.contracts_path = read_str_at(config_json, "/contracts/path").map(PathBuf::from);
        cfg.audit_jsonl_path = read_str_at(config_json, "/audit/jsonl_path").map(PathBuf::from);

        if let Some(v) = config_json.pointer("/audit/hash_chain") {
            cfg.audit_hash_chain = v
                .as_bool()
                .context("CONFIG_INVALID /audit/hash_chain must be a boolean")?;
        }

        if let Some(name) = read_str_at(config_json, "/database/url_env") {
            cfg.database_url_env = name;
        }
        if let Some(addr) = read_str_at(config_json, "/daemon/bind_addr") {
            cfg.bind_addr = addr;
        }

        Ok(cfg)
    }

    pub fn reconcile_settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            value_tolerance: self.value_tolerance,
            duplicate_policy: self.duplicate_policy,
        }
    }

    /// Tables from `reference_tables_path`, or empty tables when unset.
    pub fn load_reference_tables(&self) -> Result<ReferenceTables> {
        match &self.reference_tables_path {
            Some(p) => load_reference_tables(p),
            None => Ok(ReferenceTables::default()),
        }
    }
}

fn parse_duplicate_policy(config_json: &Value) -> Result<DuplicatePolicy> {
    let window = match config_json.pointer("/reconcile/duplicate_window") {
        None => None,
        Some(v) => {
            let w = v
                .as_u64()
                .and_then(|w| u32::try_from(w).ok())
                .context("CONFIG_INVALID /reconcile/duplicate_window must be a non-negative integer")?;
            Some(w)
        }
    };

    let policy = read_str_at(config_json, "/reconcile/duplicate_policy");
    match policy.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("same_tariff_code") => Ok(DuplicatePolicy::SameTariffCode),
        Some("sequence_window") => match window {
            Some(window) => Ok(DuplicatePolicy::SequenceWindow { window }),
            None => bail!(
                "CONFIG_INVALID /reconcile/duplicate_policy=sequence_window requires /reconcile/duplicate_window"
            ),
        },
        Some(other) => bail!(
            "CONFIG_INVALID /reconcile/duplicate_policy='{other}'; expected same_tariff_code | sequence_window"
        ),
    }
}

fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Reference tables YAML: `surgical_tiers`, `tier_bands`, `guidelines`,
/// `packages`. Missing sections are empty.
pub fn load_reference_tables(path: &Path) -> Result<ReferenceTables> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read reference tables: {}", path.display()))?;
    let tables: ReferenceTables = serde_yaml::from_str(&raw)
        .with_context(|| format!("invalid reference tables yaml: {}", path.display()))?;

    for band in &tables.tier_bands {
        if band.from > band.to {
            bail!(
                "invalid reference tables {}: tier band {}..{} is inverted",
                path.display(),
                band.from,
                band.to
            );
        }
    }
    Ok(tables)
}

/// Contract list YAML (a sequence of contracts with their items).
pub fn load_contracts(path: &Path) -> Result<Vec<Contract>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read contracts: {}", path.display()))?;
    let contracts: Vec<Contract> = serde_yaml::from_str(&raw)
        .with_context(|| format!("invalid contracts yaml: {}", path.display()))?;

    for c in &contracts {
        if c.end_date < c.start_date {
            bail!(
                "invalid contracts {}: contract {} ends before it starts",
                path.display(),
                c.contract_id
            );
        }
    }
    Ok(contracts)
}
