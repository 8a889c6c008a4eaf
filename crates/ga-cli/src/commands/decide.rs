//! Database-backed commands: decisions, export and loading guides or
//! contracts.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ga_config::{load_contracts, resolve_database_url, EngineConfig};
use ga_db::PgProcedureStore;
use ga_decision::{DecisionEngine, ProcedureStore};
use ga_export::{export_guide, JsonExportSerializer};
use ga_schemas::AuditLogEntry;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{load_guide_file, open_audit_mirror, parse_as_of};

pub async fn connect(cfg: &EngineConfig) -> Result<PgPool> {
    let db = resolve_database_url(cfg);
    ga_db::connect(db.require()?).await
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

pub enum DecideAction {
    Approve,
    Reject { category: String, reason: String },
    Reset,
}

pub async fn decide(
    cfg: &EngineConfig,
    procedure_id: &str,
    actor: &str,
    action: DecideAction,
    as_of: Option<&str>,
) -> Result<()> {
    let procedure_id = Uuid::parse_str(procedure_id.trim()).context("invalid procedure_id uuid")?;
    let pool = connect(cfg).await?;
    let book = ga_db::load_contract_book(&pool, parse_as_of(as_of)?).await?;

    let mut engine = DecisionEngine::new(Arc::new(PgProcedureStore::new(pool)), Arc::new(book))
        .with_value_tolerance(cfg.value_tolerance);
    if let Some(mirror) = open_audit_mirror(cfg)? {
        engine = engine.with_audit_sink(mirror);
    }

    let res = match action {
        DecideAction::Approve => engine.approve(procedure_id, actor).await,
        DecideAction::Reject { category, reason } => {
            engine.reject(procedure_id, &category, &reason, actor).await
        }
        DecideAction::Reset => engine.reset(procedure_id, actor).await,
    };

    match res {
        Ok(entry) => {
            print_entry(&entry);
            Ok(())
        }
        Err(e) => {
            // Re-read so the operator sees the current state next to the error.
            if let Ok(current) = engine.refresh(procedure_id).await {
                println!(
                    "current_status={} procedure_id={}",
                    current.status, current.procedure_id
                );
            }
            Err(anyhow::Error::new(e).context("decision refused"))
        }
    }
}

fn print_entry(entry: &AuditLogEntry) {
    println!("committed=true entry_id={}", entry.entry_id);
    println!("procedure_id={}", entry.procedure_id);
    println!("action={}", entry.action.as_str());
    println!("status={}->{}", entry.previous_status, entry.new_status);
    if let Some(v) = entry.approved_value {
        println!("approved_value={} billed_value={}", v, entry.billed_value);
    }
    if let Some(c) = entry.rejection_category {
        println!("rejection_category={}", c);
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

pub async fn export(cfg: &EngineConfig, guide_id: &str, out: Option<&str>) -> Result<()> {
    let guide_id = Uuid::parse_str(guide_id.trim()).context("invalid guide_id uuid")?;
    let pool = connect(cfg).await?;
    let store = PgProcedureStore::new(pool);

    let procedures = store
        .list_guide(guide_id)
        .await
        .context("list guide procedures failed")?;
    if procedures.is_empty() {
        anyhow::bail!("guide {guide_id} not found");
    }

    let body = export_guide(guide_id, &procedures, &JsonExportSerializer)?;
    match out {
        Some(path) => {
            std::fs::write(path, &body).with_context(|| format!("write export failed: {path}"))?;
            println!("exported=true guide_id={} path={}", guide_id, path);
        }
        None => println!("{}", String::from_utf8_lossy(&body)),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

pub async fn load_guide(cfg: &EngineConfig, file: &str) -> Result<()> {
    let procedures = load_guide_file(file)?;
    let first = procedures.first().context("guide has no procedures")?;
    let (guide_id, operator_id) = (first.guide_id, first.operator_id.clone());

    let pool = connect(cfg).await?;
    ga_db::insert_guide(&pool, guide_id, &operator_id, &procedures).await?;
    info!(guide_id = %guide_id, procedures = procedures.len(), "guide stored");
    println!("guide_loaded=true guide_id={} procedures={}", guide_id, procedures.len());
    Ok(())
}

pub async fn load_contract_file(cfg: &EngineConfig, file: &str) -> Result<()> {
    let contracts = load_contracts(Path::new(file))?;
    let pool = connect(cfg).await?;
    for c in &contracts {
        ga_db::insert_contract(&pool, c).await?;
    }
    println!("contracts_loaded={}", contracts.len());
    Ok(())
}
