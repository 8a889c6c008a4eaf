//! DB-backed: decision transitions commit the status change and the audit
//! entry together, and only from the expected status.
//!
//! Skipped if GA_DATABASE_URL is not set.

use std::sync::Arc;

use ga_db::PgProcedureStore;
use ga_decision::{DecisionEngine, DecisionError, ProcedureStore};
use ga_schemas::{AuditAction, Micros, ProcedureStatus};
use ga_testkit::{fixture_contract_book, ProcedureBuilder, CONSULT_CODE, FIXTURE_OPERATOR};
use uuid::Uuid;

async fn pool_or_skip() -> anyhow::Result<Option<sqlx::PgPool>> {
    let url = match std::env::var(ga_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: GA_DATABASE_URL not set");
            return Ok(None);
        }
    };
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await?;
    ga_db::migrate(&pool).await?;
    Ok(Some(pool))
}

#[tokio::test]
async fn approve_then_conflict_then_reset() -> anyhow::Result<()> {
    let Some(pool) = pool_or_skip().await? else {
        return Ok(());
    };

    let g = Uuid::new_v4();
    let p = ProcedureBuilder::new(g, CONSULT_CODE)
        .unit(Micros::from_units(150))
        .build();
    let id = p.procedure_id;
    ga_db::insert_guide(&pool, g, FIXTURE_OPERATOR, &[p]).await?;

    let store = Arc::new(PgProcedureStore::new(pool.clone()));
    let engine = DecisionEngine::new(store.clone(), Arc::new(fixture_contract_book()));

    let entry = engine.approve(id, "auditor.ana").await?;
    assert!(entry.entry_id > 0);
    assert_eq!(entry.approved_value, Some(Micros::from_units(100)));

    let loaded = store.load(id).await?;
    assert_eq!(loaded.status, ProcedureStatus::Approved);
    assert_eq!(loaded.operator_id, FIXTURE_OPERATOR);

    let err = engine.approve(id, "auditor.ana").await.unwrap_err();
    assert!(matches!(err, DecisionError::Conflict { status: ProcedureStatus::Approved, .. }));

    engine.reset(id, "auditor.ana").await?;
    let log = store.audit_log(id).await?;
    assert_eq!(
        log.iter().map(|e| e.action).collect::<Vec<_>>(),
        vec![AuditAction::Approve, AuditAction::Reset]
    );
    assert!(log[0].entry_id < log[1].entry_id);
    assert!(store.load(id).await?.is_pending());
    Ok(())
}

#[tokio::test]
async fn unknown_procedure_is_not_found() -> anyhow::Result<()> {
    let Some(pool) = pool_or_skip().await? else {
        return Ok(());
    };
    let store = PgProcedureStore::new(pool);
    let id = Uuid::new_v4();
    assert!(matches!(
        store.load(id).await,
        Err(ga_decision::StoreError::NotFound { procedure_id }) if procedure_id == id
    ));
    Ok(())
}

#[tokio::test]
async fn audit_log_rows_cannot_be_deleted() -> anyhow::Result<()> {
    let Some(pool) = pool_or_skip().await? else {
        return Ok(());
    };
    let g = Uuid::new_v4();
    let p = ProcedureBuilder::new(g, CONSULT_CODE).build();
    let id = p.procedure_id;
    ga_db::insert_guide(&pool, g, FIXTURE_OPERATOR, &[p]).await?;
    let engine = DecisionEngine::new(
        Arc::new(PgProcedureStore::new(pool.clone())),
        Arc::new(fixture_contract_book()),
    );
    let entry = engine.approve(id, "auditor.ana").await?;

    let res = sqlx::query("delete from audit_log where entry_id = $1")
        .bind(entry.entry_id)
        .execute(&pool)
        .await;
    assert!(res.is_err(), "audit_log must be append-only");
    Ok(())
}
