//! Scenario: single-procedure decisions against the fixture contract book.

use std::sync::Arc;

use ga_decision::{DecisionEngine, DecisionError, MemoryProcedureStore, ProcedureStore, ValidationError};
use ga_schemas::{AuditAction, Micros, ProcedureStatus, RejectionCategory};
use ga_testkit::*;
use uuid::Uuid;

fn engine_with(procs: Vec<ga_schemas::Procedure>) -> (DecisionEngine, Arc<MemoryProcedureStore>) {
    let store = Arc::new(MemoryProcedureStore::with_procedures(procs));
    let engine = DecisionEngine::new(store.clone(), Arc::new(fixture_contract_book()));
    (engine, store)
}

#[tokio::test]
async fn approval_auto_corrects_to_contracted_value() {
    let p = ProcedureBuilder::new(Uuid::new_v4(), CONSULT_CODE)
        .unit(Micros::from_units(150))
        .build();
    let id = p.procedure_id;
    let (engine, _) = engine_with(vec![p]);

    let entry = engine.approve(id, "auditor.ana").await.unwrap();
    assert_eq!(entry.action, AuditAction::Approve);
    assert_eq!(entry.billed_value, Micros::from_units(150));
    assert_eq!(entry.approved_value, Some(Micros::from_units(100)));
    assert!(entry.is_auto_corrected());

    let p = engine.refresh(id).await.unwrap();
    assert_eq!(p.status, ProcedureStatus::Approved);
    assert_eq!(p.approved_value, Some(Micros::from_units(100)));
    assert_eq!(p.total_value, Micros::from_units(150));
}

#[tokio::test]
async fn approval_uses_contract_for_quantity() {
    let p = ProcedureBuilder::new(Uuid::new_v4(), GUIDELINE_CODE)
        .qty(2)
        .unit(Micros::parse_decimal("15.00").unwrap())
        .build();
    let id = p.procedure_id;
    let (engine, _) = engine_with(vec![p]);

    let entry = engine.approve(id, "auditor.ana").await.unwrap();
    assert_eq!(entry.approved_value, Some(Micros::parse_decimal("25.00").unwrap()));
}

#[tokio::test]
async fn uncontracted_approval_keeps_billed_value() {
    let p = ProcedureBuilder::new(Uuid::new_v4(), UNCONTRACTED_CODE)
        .unit(Micros::from_units(70))
        .build();
    let id = p.procedure_id;
    let (engine, _) = engine_with(vec![p]);

    let entry = engine.approve(id, "auditor.ana").await.unwrap();
    assert_eq!(entry.approved_value, Some(Micros::from_units(70)));
    assert!(!entry.is_auto_corrected());
}

#[tokio::test]
async fn second_approval_conflicts_without_a_new_entry() {
    let p = ProcedureBuilder::new(Uuid::new_v4(), CONSULT_CODE).build();
    let id = p.procedure_id;
    let (engine, store) = engine_with(vec![p]);

    engine.approve(id, "auditor.ana").await.unwrap();
    let err = engine.approve(id, "auditor.bia").await.unwrap_err();
    assert!(matches!(
        err,
        DecisionError::Conflict {
            status: ProcedureStatus::Approved,
            ..
        }
    ));
    assert_eq!(store.audit_log(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn reset_clears_decision_and_allows_a_new_one() {
    let p = ProcedureBuilder::new(Uuid::new_v4(), CONSULT_CODE).build();
    let id = p.procedure_id;
    let (engine, store) = engine_with(vec![p]);

    engine
        .reject(id, "value_divergence", "billed above the contract table", "auditor.ana")
        .await
        .unwrap();
    let rejected = engine.refresh(id).await.unwrap();
    assert_eq!(rejected.status, ProcedureStatus::Rejected);
    assert_eq!(
        rejected.rejection.as_ref().map(|r| r.category),
        Some(RejectionCategory::ValueDivergence)
    );

    let reset = engine.reset(id, "auditor.bia").await.unwrap();
    assert_eq!(reset.previous_status, ProcedureStatus::Rejected);
    assert_eq!(reset.new_status, ProcedureStatus::Pending);

    let pending = engine.refresh(id).await.unwrap();
    assert!(pending.is_pending());
    assert_eq!(pending.rejection, None);
    assert_eq!(pending.approved_value, None);

    engine.approve(id, "auditor.bia").await.unwrap();

    let actions: Vec<AuditAction> = store
        .audit_log(id)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(actions, vec![AuditAction::Reject, AuditAction::Reset, AuditAction::Approve]);
}

#[tokio::test]
async fn reset_of_pending_conflicts() {
    let p = ProcedureBuilder::new(Uuid::new_v4(), CONSULT_CODE).build();
    let id = p.procedure_id;
    let (engine, _) = engine_with(vec![p]);

    let err = engine.reset(id, "auditor.ana").await.unwrap_err();
    assert!(matches!(err, DecisionError::Conflict { status: ProcedureStatus::Pending, .. }));
}

#[tokio::test]
async fn invalid_rejection_never_reaches_the_store() {
    let p = ProcedureBuilder::new(Uuid::new_v4(), CONSULT_CODE).build();
    let id = p.procedure_id;
    let (engine, store) = engine_with(vec![p]);

    let short = engine.reject(id, "other", "too short", "auditor.ana").await.unwrap_err();
    assert_eq!(short, DecisionError::Validation(ValidationError::ReasonTooShort { len: 9 }));

    let unknown = engine
        .reject(id, "wrong_colour", "a sufficiently long reason", "auditor.ana")
        .await
        .unwrap_err();
    assert!(matches!(
        unknown,
        DecisionError::Validation(ValidationError::UnknownCategory { .. })
    ));

    let no_actor = engine.approve(id, "   ").await.unwrap_err();
    assert_eq!(no_actor, DecisionError::Validation(ValidationError::MissingActor));

    assert!(store.all_entries().await.is_empty());
    assert!(engine.refresh(id).await.unwrap().is_pending());
}

#[tokio::test]
async fn unknown_procedure_is_not_found() {
    let (engine, _) = engine_with(vec![]);
    let id = Uuid::new_v4();
    assert_eq!(
        engine.approve(id, "auditor.ana").await.unwrap_err(),
        DecisionError::NotFound { procedure_id: id }
    );
}

#[tokio::test]
async fn racing_approvals_commit_exactly_once() {
    let p = ProcedureBuilder::new(Uuid::new_v4(), CONSULT_CODE)
        .unit(Micros::from_units(150))
        .build();
    let id = p.procedure_id;
    let (engine, store) = engine_with(vec![p]);

    let actors = ["auditor.ana", "auditor.bia", "auditor.caio", "auditor.duda"];
    let results =
        futures_util::future::join_all(actors.iter().map(|a| engine.approve(id, a))).await;

    let committed: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(committed.len(), 1);
    for r in results.iter().filter(|r| r.is_err()) {
        match r {
            Err(DecisionError::Conflict { status, .. }) => {
                assert_eq!(*status, ProcedureStatus::Approved)
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
    }
    assert_eq!(store.audit_log(id).await.unwrap().len(), 1);
}
