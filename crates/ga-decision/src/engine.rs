use std::sync::Arc;

use chrono::Utc;
use ga_audit::AuditSink;
use ga_reconcile::{validate_value, OutcomeDetail, ValueTolerance};
use ga_schemas::{
    AuditAction, AuditLogEntry, ContractLookup, Micros, NewAuditLogEntry, Procedure,
    ProcedureStatus, Rejection,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::DecisionError;
use crate::store::ProcedureStore;
use crate::transition::{plan_transition, validate_actor, validate_rejection, DecisionEvent};

/// The only writer of procedure decision fields.
///
/// Every transition takes the acting auditor explicitly, re-reads the
/// procedure, plans the change, and commits it with its audit entry in one
/// compare-and-set store call. Nothing is assumed applied until the store
/// confirms it.
#[derive(Clone)]
pub struct DecisionEngine {
    store: Arc<dyn ProcedureStore>,
    contracts: Arc<dyn ContractLookup>,
    value_tolerance: ValueTolerance,
    sink: Option<Arc<dyn AuditSink>>,
}

impl DecisionEngine {
    pub fn new(store: Arc<dyn ProcedureStore>, contracts: Arc<dyn ContractLookup>) -> Self {
        Self {
            store,
            contracts,
            value_tolerance: ValueTolerance::default(),
            sink: None,
        }
    }

    pub fn with_value_tolerance(mut self, tolerance: ValueTolerance) -> Self {
        self.value_tolerance = tolerance;
        self
    }

    /// Mirrors every committed entry to `sink` (e.g. a JSONL file).
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn store(&self) -> &Arc<dyn ProcedureStore> {
        &self.store
    }

    pub fn contracts(&self) -> &Arc<dyn ContractLookup> {
        &self.contracts
    }

    /// Approve a PENDING procedure at its contracted value.
    ///
    /// The approved value is the contracted value for the executed quantity
    /// when the code is contracted, otherwise the billed total unchanged.
    pub async fn approve(&self, procedure_id: Uuid, actor: &str) -> Result<AuditLogEntry, DecisionError> {
        let actor = validate_actor(actor)?;
        let p = self.load(procedure_id).await?;
        let approved_value = self.approval_value(&p);
        self.transition(p, DecisionEvent::Approve { approved_value }, actor)
            .await
    }

    /// Reject a PENDING procedure. Category and reason are checked before
    /// the store is touched.
    pub async fn reject(
        &self,
        procedure_id: Uuid,
        category: &str,
        reason: &str,
        actor: &str,
    ) -> Result<AuditLogEntry, DecisionError> {
        let rejection = validate_rejection(category, reason)?;
        let actor = validate_actor(actor)?;
        self.reject_validated(procedure_id, rejection, actor).await
    }

    pub(crate) async fn reject_validated(
        &self,
        procedure_id: Uuid,
        rejection: Rejection,
        actor: String,
    ) -> Result<AuditLogEntry, DecisionError> {
        let p = self.load(procedure_id).await?;
        self.transition(p, DecisionEvent::Reject(rejection), actor)
            .await
    }

    /// Return an APPROVED or REJECTED procedure to PENDING, clearing the
    /// approved value and rejection.
    pub async fn reset(&self, procedure_id: Uuid, actor: &str) -> Result<AuditLogEntry, DecisionError> {
        let actor = validate_actor(actor)?;
        let p = self.load(procedure_id).await?;
        self.transition(p, DecisionEvent::Reset, actor).await
    }

    /// Re-read a procedure from the store, e.g. after a failed transition.
    pub async fn refresh(&self, procedure_id: Uuid) -> Result<Procedure, DecisionError> {
        self.load(procedure_id).await
    }

    fn approval_value(&self, p: &Procedure) -> Micros {
        let item = self.contracts.contract_item(&p.operator_id, &p.tariff_code);
        match validate_value(p, item, self.value_tolerance).detail {
            OutcomeDetail::Value {
                expected: Some(contracted),
                ..
            } => contracted,
            _ => p.total_value,
        }
    }

    async fn load(&self, procedure_id: Uuid) -> Result<Procedure, DecisionError> {
        self.store
            .load(procedure_id)
            .await
            .map_err(|e| DecisionError::from_store(e, "load"))
    }

    async fn transition(
        &self,
        p: Procedure,
        event: DecisionEvent,
        actor: String,
    ) -> Result<AuditLogEntry, DecisionError> {
        let action = event.action();
        let verb = match action {
            AuditAction::Approve => "approve",
            AuditAction::Reject => "reject",
            AuditAction::Reset => "reset",
        };

        let update = plan_transition(p.status, event).map_err(|e| DecisionError::Conflict {
            procedure_id: p.procedure_id,
            status: e.from,
            action: verb,
        })?;

        let entry = NewAuditLogEntry {
            guide_id: p.guide_id,
            procedure_id: p.procedure_id,
            tariff_code: p.tariff_code.clone(),
            action,
            previous_status: p.status,
            new_status: update.status,
            billed_value: p.total_value,
            approved_value: update.approved_value,
            rejection_category: update.rejection.as_ref().map(|r| r.category),
            rejection_reason: update.rejection.as_ref().map(|r| r.reason.clone()),
            actor,
            ts_utc: Utc::now(),
        };

        let committed = match self
            .store
            .commit(p.procedure_id, p.status, update, entry)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    procedure_id = %p.procedure_id,
                    guide_id = %p.guide_id,
                    action = verb,
                    error = %e,
                    "decision commit failed"
                );
                return Err(DecisionError::from_store(e, verb));
            }
        };

        let outcome = match committed.new_status {
            ProcedureStatus::Approved => "approved",
            ProcedureStatus::Rejected => "rejected",
            ProcedureStatus::Pending => "reset",
        };
        info!(
            procedure_id = %committed.procedure_id,
            guide_id = %committed.guide_id,
            actor = %committed.actor,
            status = %committed.new_status,
            auto_corrected = committed.is_auto_corrected(),
            "procedure {outcome}"
        );

        if let Some(sink) = &self.sink {
            // File sinks block; keep them off the async workers.
            let (sink, entry) = (Arc::clone(sink), committed.clone());
            match tokio::task::spawn_blocking(move || sink.record(&entry)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(entry_id = committed.entry_id, error = %e, "audit mirror write failed")
                }
                Err(e) => {
                    warn!(entry_id = committed.entry_id, error = %e, "audit mirror task failed")
                }
            }
        }

        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::store::MemoryProcedureStore;
    use chrono::NaiveDate;
    use ga_audit::MemoryAuditSink;
    use ga_schemas::{Contract, ContractBook, ContractItem, ContractStatus, RejectionCategory};

    fn procedure(code: &str, total: Micros) -> Procedure {
        Procedure {
            procedure_id: Uuid::new_v4(),
            guide_id: Uuid::new_v4(),
            operator_id: "OP-1".to_string(),
            sequence_number: 1,
            tariff_code: code.to_string(),
            description: String::new(),
            executed_quantity: 1,
            unit_value: total,
            total_value: total,
            surgical_tier: None,
            status: ProcedureStatus::Pending,
            approved_value: None,
            rejection: None,
        }
    }

    fn book() -> ContractBook {
        ContractBook::new(
            NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            vec![Contract {
                contract_id: Uuid::new_v4(),
                operator_id: "OP-1".to_string(),
                status: ContractStatus::Active,
                start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
                items: vec![ContractItem {
                    tariff_code: "10101012".to_string(),
                    contracted_value: Micros::from_units(100),
                    max_value: None,
                    max_quantity: None,
                    package_id: None,
                }],
            }],
        )
    }

    fn engine(procs: Vec<Procedure>) -> (DecisionEngine, Arc<MemoryAuditSink>) {
        let sink = Arc::new(MemoryAuditSink::new());
        let e = DecisionEngine::new(
            Arc::new(MemoryProcedureStore::with_procedures(procs)),
            Arc::new(book()),
        )
        .with_audit_sink(sink.clone());
        (e, sink)
    }

    #[tokio::test]
    async fn approve_corrects_to_contracted_value() {
        let p = procedure("10101012", Micros::from_units(150));
        let (e, sink) = engine(vec![p.clone()]);

        let entry = e.approve(p.procedure_id, "ana").await.unwrap();
        assert_eq!(entry.billed_value, Micros::from_units(150));
        assert_eq!(entry.approved_value, Some(Micros::from_units(100)));
        assert!(entry.is_auto_corrected());

        let after = e.refresh(p.procedure_id).await.unwrap();
        assert_eq!(after.status, ProcedureStatus::Approved);
        assert_eq!(after.approved_value, Some(Micros::from_units(100)));
        assert_eq!(sink.entries(), vec![entry]);
    }

    #[tokio::test]
    async fn approve_uncontracted_keeps_billed_value() {
        let p = procedure("20104065", Micros::from_units(42));
        let (e, _) = engine(vec![p.clone()]);
        let entry = e.approve(p.procedure_id, "ana").await.unwrap();
        assert_eq!(entry.approved_value, Some(Micros::from_units(42)));
        assert!(!entry.is_auto_corrected());
    }

    #[tokio::test]
    async fn reject_validation_happens_before_any_store_call() {
        let missing = Uuid::new_v4();
        let (e, sink) = engine(vec![]);
        let err = e.reject(missing, "OTHER", "short", "ana").await.unwrap_err();
        assert_eq!(
            err,
            DecisionError::Validation(ValidationError::ReasonTooShort { len: 5 })
        );
        assert!(sink.entries().is_empty());
    }

    #[tokio::test]
    async fn reject_then_reset_clears_fields() {
        let p = procedure("10101012", Micros::from_units(100));
        let (e, _) = engine(vec![p.clone()]);

        let entry = e
            .reject(p.procedure_id, "missing-documentation", "no surgical report attached", "ana")
            .await
            .unwrap();
        assert_eq!(entry.rejection_category, Some(RejectionCategory::MissingDocumentation));

        let reset = e.reset(p.procedure_id, "bruno").await.unwrap();
        assert_eq!(reset.previous_status, ProcedureStatus::Rejected);
        assert_eq!(reset.new_status, ProcedureStatus::Pending);

        let after = e.refresh(p.procedure_id).await.unwrap();
        assert_eq!(after.status, ProcedureStatus::Pending);
        assert_eq!(after.approved_value, None);
        assert_eq!(after.rejection, None);
        assert_eq!(e.store().audit_log(p.procedure_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reset_of_pending_is_conflict() {
        let p = procedure("10101012", Micros::from_units(100));
        let (e, _) = engine(vec![p.clone()]);
        let err = e.reset(p.procedure_id, "ana").await.unwrap_err();
        assert!(matches!(
            err,
            DecisionError::Conflict { status: ProcedureStatus::Pending, action: "reset", .. }
        ));
    }

    #[tokio::test]
    async fn blank_actor_is_refused() {
        let p = procedure("10101012", Micros::from_units(100));
        let (e, _) = engine(vec![p.clone()]);
        let err = e.approve(p.procedure_id, "   ").await.unwrap_err();
        assert_eq!(err, DecisionError::Validation(ValidationError::MissingActor));
        assert!(e.refresh(p.procedure_id).await.unwrap().is_pending());
    }

    #[tokio::test]
    async fn unknown_procedure_is_not_found() {
        let (e, _) = engine(vec![]);
        let id = Uuid::new_v4();
        assert_eq!(
            e.approve(id, "ana").await.unwrap_err(),
            DecisionError::NotFound { procedure_id: id }
        );
    }
}
