//! PostgreSQL persistence: procedures, contracts and the audit log.
//!
//! Money columns are integer micros. Every decision transition is one
//! transaction: a conditional UPDATE on the expected status plus the
//! audit_log INSERT.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use ga_decision::{ProcedureStore, ProcedureUpdate, StoreError};
use ga_schemas::{
    AuditAction, AuditLogEntry, Contract, ContractBook, ContractItem, ContractStatus, Micros,
    NewAuditLogEntry, Procedure, ProcedureStatus, Rejection, RejectionCategory,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, warn};
use uuid::Uuid;

pub const ENV_DB_URL: &str = "GA_DATABASE_URL";

/// Connect to Postgres using GA_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_procedures_table: bool,
}

/// Connectivity plus schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='procedures'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_procedures_table: exists,
    })
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// Insert a guide and its procedures in one transaction.
pub async fn insert_guide(
    pool: &PgPool,
    guide_id: Uuid,
    operator_id: &str,
    procedures: &[Procedure],
) -> Result<()> {
    let mut tx = pool.begin().await.context("insert_guide begin failed")?;

    sqlx::query("insert into guides (guide_id, operator_id) values ($1, $2)")
        .bind(guide_id)
        .bind(operator_id)
        .execute(&mut *tx)
        .await
        .context("insert_guide guide row failed")?;

    for p in procedures {
        sqlx::query(
            r#"
            insert into procedures (
              procedure_id, guide_id, sequence_number, tariff_code, description,
              executed_quantity, unit_value_micros, total_value_micros, surgical_tier,
              status, approved_value_micros, rejection_category, rejection_reason
            ) values (
              $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13
            )
            "#,
        )
        .bind(p.procedure_id)
        .bind(guide_id)
        .bind(p.sequence_number)
        .bind(&p.tariff_code)
        .bind(&p.description)
        .bind(p.executed_quantity)
        .bind(p.unit_value.raw())
        .bind(p.total_value.raw())
        .bind(&p.surgical_tier)
        .bind(p.status.as_str())
        .bind(p.approved_value.map(Micros::raw))
        .bind(p.rejection.as_ref().map(|r| r.category.as_str()))
        .bind(p.rejection.as_ref().map(|r| r.reason.as_str()))
        .execute(&mut *tx)
        .await
        .with_context(|| format!("insert_guide procedure {} failed", p.procedure_id))?;
    }

    tx.commit().await.context("insert_guide commit failed")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

pub async fn insert_contract(pool: &PgPool, contract: &Contract) -> Result<()> {
    let mut tx = pool.begin().await.context("insert_contract begin failed")?;

    sqlx::query(
        r#"
        insert into contracts (contract_id, operator_id, status, start_date, end_date)
        values ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(contract.contract_id)
    .bind(&contract.operator_id)
    .bind(contract.status.as_str())
    .bind(contract.start_date)
    .bind(contract.end_date)
    .execute(&mut *tx)
    .await
    .context("insert_contract contract row failed")?;

    for item in &contract.items {
        sqlx::query(
            r#"
            insert into contract_items (
              contract_id, tariff_code, contracted_value_micros, max_value_micros,
              max_quantity, package_id
            ) values ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(contract.contract_id)
        .bind(&item.tariff_code)
        .bind(item.contracted_value.raw())
        .bind(item.max_value.map(Micros::raw))
        .bind(item.max_quantity)
        .bind(&item.package_id)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("insert_contract item {} failed", item.tariff_code))?;
    }

    tx.commit().await.context("insert_contract commit failed")?;
    Ok(())
}

/// Every contract with its items, evaluated at `as_of`. Inactive contracts
/// are loaded too; the book filters them on lookup.
pub async fn load_contract_book(pool: &PgPool, as_of: NaiveDate) -> Result<ContractBook> {
    let rows = sqlx::query(
        r#"
        select contract_id, operator_id, status, start_date, end_date
        from contracts
        order by contract_id
        "#,
    )
    .fetch_all(pool)
    .await
    .context("load_contract_book contracts query failed")?;

    let mut contracts = Vec::with_capacity(rows.len());
    for row in rows {
        let raw_status: String = row.try_get("status")?;
        let status = ContractStatus::parse(&raw_status)
            .with_context(|| format!("invalid contract status in db: {raw_status}"))?;
        contracts.push(Contract {
            contract_id: row.try_get("contract_id")?,
            operator_id: row.try_get("operator_id")?,
            status,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            items: Vec::new(),
        });
    }

    let item_rows = sqlx::query(
        r#"
        select contract_id, tariff_code, contracted_value_micros, max_value_micros,
               max_quantity, package_id
        from contract_items
        order by contract_id, tariff_code
        "#,
    )
    .fetch_all(pool)
    .await
    .context("load_contract_book items query failed")?;

    for row in item_rows {
        let contract_id: Uuid = row.try_get("contract_id")?;
        let item = ContractItem {
            tariff_code: row.try_get("tariff_code")?,
            contracted_value: Micros::new(row.try_get("contracted_value_micros")?),
            max_value: row
                .try_get::<Option<i64>, _>("max_value_micros")?
                .map(Micros::new),
            max_quantity: row.try_get("max_quantity")?,
            package_id: row.try_get("package_id")?,
        };
        if let Some(c) = contracts.iter_mut().find(|c| c.contract_id == contract_id) {
            c.items.push(item);
        }
    }

    debug!(contracts = contracts.len(), as_of = %as_of, "contract book loaded");
    Ok(ContractBook::new(as_of, contracts))
}

// ---------------------------------------------------------------------------
// ProcedureStore
// ---------------------------------------------------------------------------

/// [`ProcedureStore`] over PostgreSQL.
#[derive(Clone)]
pub struct PgProcedureStore {
    pool: PgPool,
}

impl PgProcedureStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn transient(context: &str, e: sqlx::Error) -> StoreError {
    warn!(error = %e, "{context}");
    StoreError::Transient(format!("{context}: {e}"))
}

fn corrupt(what: &str, raw: &str) -> StoreError {
    StoreError::Transient(format!("corrupt row: invalid {what} '{raw}'"))
}

fn parse_status(raw: &str) -> Result<ProcedureStatus, StoreError> {
    ProcedureStatus::parse(raw).ok_or_else(|| corrupt("status", raw))
}

fn parse_category(raw: Option<String>) -> Result<Option<RejectionCategory>, StoreError> {
    match raw {
        None => Ok(None),
        Some(s) => RejectionCategory::parse(&s)
            .map(Some)
            .ok_or_else(|| corrupt("rejection category", &s)),
    }
}

const PROCEDURE_COLUMNS: &str = r#"
    p.procedure_id, p.guide_id, g.operator_id, p.sequence_number, p.tariff_code,
    p.description, p.executed_quantity, p.unit_value_micros, p.total_value_micros,
    p.surgical_tier, p.status, p.approved_value_micros, p.rejection_category,
    p.rejection_reason
"#;

fn procedure_from_row(row: &PgRow) -> Result<Procedure, StoreError> {
    let get = |e: sqlx::Error| transient("decode procedure row", e);

    let status = parse_status(&row.try_get::<String, _>("status").map_err(get)?)?;
    let category = parse_category(row.try_get("rejection_category").map_err(get)?)?;
    let reason: Option<String> = row.try_get("rejection_reason").map_err(get)?;
    let rejection = match (category, reason) {
        (Some(category), Some(reason)) => Some(Rejection { category, reason }),
        _ => None,
    };

    Ok(Procedure {
        procedure_id: row.try_get("procedure_id").map_err(get)?,
        guide_id: row.try_get("guide_id").map_err(get)?,
        operator_id: row.try_get("operator_id").map_err(get)?,
        sequence_number: row.try_get("sequence_number").map_err(get)?,
        tariff_code: row.try_get("tariff_code").map_err(get)?,
        description: row.try_get("description").map_err(get)?,
        executed_quantity: row.try_get("executed_quantity").map_err(get)?,
        unit_value: Micros::new(row.try_get("unit_value_micros").map_err(get)?),
        total_value: Micros::new(row.try_get("total_value_micros").map_err(get)?),
        surgical_tier: row.try_get("surgical_tier").map_err(get)?,
        status,
        approved_value: row
            .try_get::<Option<i64>, _>("approved_value_micros")
            .map_err(get)?
            .map(Micros::new),
        rejection,
    })
}

fn audit_entry_from_row(row: &PgRow) -> Result<AuditLogEntry, StoreError> {
    let get = |e: sqlx::Error| transient("decode audit_log row", e);

    let raw_action: String = row.try_get("action").map_err(get)?;
    let action = AuditAction::parse(&raw_action).ok_or_else(|| corrupt("action", &raw_action))?;
    let ts_utc: DateTime<Utc> = row.try_get("ts_utc").map_err(get)?;

    Ok(AuditLogEntry {
        entry_id: row.try_get("entry_id").map_err(get)?,
        guide_id: row.try_get("guide_id").map_err(get)?,
        procedure_id: row.try_get("procedure_id").map_err(get)?,
        tariff_code: row.try_get("tariff_code").map_err(get)?,
        action,
        previous_status: parse_status(&row.try_get::<String, _>("previous_status").map_err(get)?)?,
        new_status: parse_status(&row.try_get::<String, _>("new_status").map_err(get)?)?,
        billed_value: Micros::new(row.try_get("billed_value_micros").map_err(get)?),
        approved_value: row
            .try_get::<Option<i64>, _>("approved_value_micros")
            .map_err(get)?
            .map(Micros::new),
        rejection_category: parse_category(row.try_get("rejection_category").map_err(get)?)?,
        rejection_reason: row.try_get("rejection_reason").map_err(get)?,
        actor: row.try_get("actor").map_err(get)?,
        ts_utc,
    })
}

#[async_trait]
impl ProcedureStore for PgProcedureStore {
    async fn load(&self, procedure_id: Uuid) -> Result<Procedure, StoreError> {
        let sql = format!(
            "select {PROCEDURE_COLUMNS} from procedures p join guides g on g.guide_id = p.guide_id \
             where p.procedure_id = $1"
        );
        let row = sqlx::query(&sql)
            .bind(procedure_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| transient("load procedure failed", e))?;

        match row {
            Some(row) => procedure_from_row(&row),
            None => Err(StoreError::NotFound { procedure_id }),
        }
    }

    async fn list_guide(&self, guide_id: Uuid) -> Result<Vec<Procedure>, StoreError> {
        let sql = format!(
            "select {PROCEDURE_COLUMNS} from procedures p join guides g on g.guide_id = p.guide_id \
             where p.guide_id = $1 order by p.sequence_number, p.procedure_id"
        );
        let rows = sqlx::query(&sql)
            .bind(guide_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| transient("list_guide failed", e))?;

        rows.iter().map(procedure_from_row).collect()
    }

    async fn commit(
        &self,
        procedure_id: Uuid,
        expected: ProcedureStatus,
        update: ProcedureUpdate,
        entry: NewAuditLogEntry,
    ) -> Result<AuditLogEntry, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| transient("commit begin failed", e))?;

        let res = sqlx::query(
            r#"
            update procedures
            set status = $3,
                approved_value_micros = $4,
                rejection_category = $5,
                rejection_reason = $6,
                updated_at_utc = now()
            where procedure_id = $1
              and status = $2
            "#,
        )
        .bind(procedure_id)
        .bind(expected.as_str())
        .bind(update.status.as_str())
        .bind(update.approved_value.map(Micros::raw))
        .bind(update.rejection.as_ref().map(|r| r.category.as_str()))
        .bind(update.rejection.as_ref().map(|r| r.reason.as_str()))
        .execute(&mut *tx)
        .await
        .map_err(|e| transient("commit update failed", e))?;

        if res.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| transient("commit rollback failed", e))?;

            let actual: Option<(String,)> =
                sqlx::query_as("select status from procedures where procedure_id = $1")
                    .bind(procedure_id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| transient("commit re-read failed", e))?;

            return match actual {
                None => Err(StoreError::NotFound { procedure_id }),
                Some((raw,)) => Err(StoreError::Conflict {
                    procedure_id,
                    actual: parse_status(&raw)?,
                }),
            };
        }

        let (entry_id,): (i64,) = sqlx::query_as(
            r#"
            insert into audit_log (
              guide_id, procedure_id, tariff_code, action, previous_status, new_status,
              billed_value_micros, approved_value_micros, rejection_category,
              rejection_reason, actor, ts_utc
            ) values (
              $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12
            )
            returning entry_id
            "#,
        )
        .bind(entry.guide_id)
        .bind(entry.procedure_id)
        .bind(&entry.tariff_code)
        .bind(entry.action.as_str())
        .bind(entry.previous_status.as_str())
        .bind(entry.new_status.as_str())
        .bind(entry.billed_value.raw())
        .bind(entry.approved_value.map(Micros::raw))
        .bind(entry.rejection_category.map(RejectionCategory::as_str))
        .bind(&entry.rejection_reason)
        .bind(&entry.actor)
        .bind(entry.ts_utc)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| transient("commit audit insert failed", e))?;

        tx.commit()
            .await
            .map_err(|e| transient("commit failed", e))?;

        Ok(entry.with_id(entry_id))
    }

    async fn audit_log(&self, procedure_id: Uuid) -> Result<Vec<AuditLogEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            select entry_id, guide_id, procedure_id, tariff_code, action, previous_status,
                   new_status, billed_value_micros, approved_value_micros, rejection_category,
                   rejection_reason, actor, ts_utc
            from audit_log
            where procedure_id = $1
            order by entry_id
            "#,
        )
        .bind(procedure_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| transient("audit_log query failed", e))?;

        rows.iter().map(audit_entry_from_row).collect()
    }
}
