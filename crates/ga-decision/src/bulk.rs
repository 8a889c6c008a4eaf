//! Best-effort batch decisions.
//!
//! Members run concurrently and commit independently: one failure never rolls
//! back another. Failures are collected per id so the caller can retry just
//! that subset.

use std::collections::BTreeSet;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::engine::DecisionEngine;
use crate::error::{DecisionError, ValidationError};
use crate::transition::{validate_actor, validate_rejection};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum BulkDecision {
    Approve,
    Reject { category: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkFailureKind {
    NotFound,
    Conflict,
    Transient,
    Validation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub procedure_id: Uuid,
    pub kind: BulkFailureKind,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub succeeded: usize,
    pub succeeded_ids: Vec<Uuid>,
    pub failed: Vec<BulkFailure>,
}

impl BulkOutcome {
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

fn failure(procedure_id: Uuid, e: &DecisionError) -> BulkFailure {
    let kind = match e {
        DecisionError::Validation(_) => BulkFailureKind::Validation,
        DecisionError::NotFound { .. } => BulkFailureKind::NotFound,
        DecisionError::Conflict { .. } => BulkFailureKind::Conflict,
        DecisionError::Transient(_) => BulkFailureKind::Transient,
    };
    BulkFailure {
        procedure_id,
        kind,
        reason: e.to_string(),
    }
}

/// Apply one decision to every id. Repeated ids are attempted once.
///
/// A reject decision is validated once up front; an invalid category or
/// reason fails the whole call before any store access.
pub async fn bulk_apply(
    engine: &DecisionEngine,
    decision: &BulkDecision,
    procedure_ids: &[Uuid],
    actor: &str,
) -> Result<BulkOutcome, ValidationError> {
    let actor = validate_actor(actor)?;
    let rejection = match decision {
        BulkDecision::Approve => None,
        BulkDecision::Reject { category, reason } => Some(validate_rejection(category, reason)?),
    };

    let mut seen = BTreeSet::new();
    let ids: Vec<Uuid> = procedure_ids
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect();

    let attempts = ids.iter().map(|id| {
        let actor = actor.clone();
        let rejection = rejection.clone();
        async move {
            let res = match rejection {
                None => engine.approve(*id, &actor).await,
                Some(r) => engine.reject_validated(*id, r, actor).await,
            };
            (*id, res)
        }
    });

    let mut outcome = BulkOutcome::default();
    for (id, res) in join_all(attempts).await {
        match res {
            Ok(_) => {
                outcome.succeeded += 1;
                outcome.succeeded_ids.push(id);
            }
            Err(e) => outcome.failed.push(failure(id, &e)),
        }
    }

    let decision_name = match decision {
        BulkDecision::Approve => "approve",
        BulkDecision::Reject { .. } => "reject",
    };
    info!(
        actor = %actor,
        decision = decision_name,
        requested = ids.len(),
        succeeded = outcome.succeeded,
        failed = outcome.failed_count(),
        "bulk decision applied"
    );

    Ok(outcome)
}

/// Ids of the guide's procedures that are PENDING right now.
pub async fn select_all_pending(
    engine: &DecisionEngine,
    guide_id: Uuid,
) -> Result<Vec<Uuid>, DecisionError> {
    let procs = engine
        .store()
        .list_guide(guide_id)
        .await
        .map_err(|e| DecisionError::from_store(e, "list"))?;
    Ok(procs
        .into_iter()
        .filter(|p| p.is_pending())
        .map(|p| p.procedure_id)
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuideApproval {
    pub guide_id: Uuid,
    pub outcome: BulkOutcome,
    /// The guide may now be finalized by its own lifecycle. Nothing is
    /// finalized here.
    pub finalization_available: bool,
}

/// Bulk-approve every currently pending procedure of a guide.
pub async fn approve_guide(
    engine: &DecisionEngine,
    guide_id: Uuid,
    actor: &str,
) -> Result<GuideApproval, DecisionError> {
    let ids = select_all_pending(engine, guide_id).await?;
    let outcome = bulk_apply(engine, &BulkDecision::Approve, &ids, actor).await?;
    let finalization_available = outcome.is_complete_success() && outcome.succeeded > 0;
    Ok(GuideApproval {
        guide_id,
        outcome,
        finalization_available,
    })
}
