//! Per-procedure audit status machine.
//!
//! ```text
//!            approve               reset
//!   PENDING ─────────► APPROVED ─────────┐
//!      │  ▲                               │
//!      │  └───────────────────────────────┘
//!      │ reject                reset
//!      └─────────► REJECTED ─────────► PENDING
//! ```
//!
//! No terminal state: guide finalization lives outside this machine.
//! Planning is pure; the store applies the resulting [`ProcedureUpdate`]
//! atomically with its audit entry.

use ga_schemas::{
    AuditAction, Micros, Procedure, ProcedureStatus, Rejection, RejectionCategory,
    MIN_REJECTION_REASON_LEN,
};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionEvent {
    Approve { approved_value: Micros },
    Reject(Rejection),
    Reset,
}

impl DecisionEvent {
    pub fn action(&self) -> AuditAction {
        match self {
            DecisionEvent::Approve { .. } => AuditAction::Approve,
            DecisionEvent::Reject(_) => AuditAction::Reject,
            DecisionEvent::Reset => AuditAction::Reset,
        }
    }
}

/// Decision fields after a transition. Always written as a whole, so
/// stale approval or rejection data cannot survive a status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureUpdate {
    pub status: ProcedureStatus,
    pub approved_value: Option<Micros>,
    pub rejection: Option<Rejection>,
}

impl ProcedureUpdate {
    pub fn apply_to(&self, p: &mut Procedure) {
        p.status = self.status;
        p.approved_value = self.approved_value;
        p.rejection = self.rejection.clone();
    }
}

/// Illegal (status, action) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: ProcedureStatus,
    pub action: AuditAction,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "illegal audit transition: {} + {}",
            self.from,
            self.action.as_str()
        )
    }
}

impl std::error::Error for TransitionError {}

pub fn plan_transition(
    from: ProcedureStatus,
    event: DecisionEvent,
) -> Result<ProcedureUpdate, TransitionError> {
    use ProcedureStatus::*;

    match (from, event) {
        (Pending, DecisionEvent::Approve { approved_value }) => Ok(ProcedureUpdate {
            status: Approved,
            approved_value: Some(approved_value),
            rejection: None,
        }),
        (Pending, DecisionEvent::Reject(rejection)) => Ok(ProcedureUpdate {
            status: Rejected,
            approved_value: None,
            rejection: Some(rejection),
        }),
        (Approved | Rejected, DecisionEvent::Reset) => Ok(ProcedureUpdate {
            status: Pending,
            approved_value: None,
            rejection: None,
        }),
        (from, ev) => Err(TransitionError {
            from,
            action: ev.action(),
        }),
    }
}

/// Parses the category and checks the reason length (trimmed, in chars).
pub fn validate_rejection(category: &str, reason: &str) -> Result<Rejection, ValidationError> {
    if category.trim().is_empty() {
        return Err(ValidationError::MissingCategory);
    }
    let category = RejectionCategory::parse(category).ok_or_else(|| {
        ValidationError::UnknownCategory {
            raw: category.to_string(),
        }
    })?;

    let reason = reason.trim();
    let len = reason.chars().count();
    if len < MIN_REJECTION_REASON_LEN {
        return Err(ValidationError::ReasonTooShort { len });
    }

    Ok(Rejection {
        category,
        reason: reason.to_string(),
    })
}

pub fn validate_actor(actor: &str) -> Result<String, ValidationError> {
    let actor = actor.trim();
    if actor.is_empty() {
        return Err(ValidationError::MissingActor);
    }
    Ok(actor.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejection() -> Rejection {
        Rejection {
            category: RejectionCategory::Duplicate,
            reason: "billed twice on the same day".to_string(),
        }
    }

    #[test]
    fn pending_accepts_approve_and_reject() {
        let u = plan_transition(
            ProcedureStatus::Pending,
            DecisionEvent::Approve {
                approved_value: Micros::from_units(100),
            },
        )
        .unwrap();
        assert_eq!(u.status, ProcedureStatus::Approved);
        assert_eq!(u.approved_value, Some(Micros::from_units(100)));

        let u = plan_transition(ProcedureStatus::Pending, DecisionEvent::Reject(rejection())).unwrap();
        assert_eq!(u.status, ProcedureStatus::Rejected);
        assert_eq!(u.rejection, Some(rejection()));
        assert_eq!(u.approved_value, None);
    }

    #[test]
    fn decided_states_only_accept_reset() {
        for from in [ProcedureStatus::Approved, ProcedureStatus::Rejected] {
            let u = plan_transition(from, DecisionEvent::Reset).unwrap();
            assert_eq!(
                u,
                ProcedureUpdate {
                    status: ProcedureStatus::Pending,
                    approved_value: None,
                    rejection: None
                }
            );

            let err = plan_transition(
                from,
                DecisionEvent::Approve {
                    approved_value: Micros::ZERO,
                },
            )
            .unwrap_err();
            assert_eq!(err.action, AuditAction::Approve);
            assert!(plan_transition(from, DecisionEvent::Reject(rejection())).is_err());
        }
    }

    #[test]
    fn reset_from_pending_is_illegal() {
        let err = plan_transition(ProcedureStatus::Pending, DecisionEvent::Reset).unwrap_err();
        assert_eq!(err.from, ProcedureStatus::Pending);
        assert_eq!(err.to_string(), "illegal audit transition: PENDING + RESET");
    }

    #[test]
    fn rejection_validation() {
        assert_eq!(
            validate_rejection("  ", "long enough reason"),
            Err(ValidationError::MissingCategory)
        );
        assert!(matches!(
            validate_rejection("FRAUD", "long enough reason"),
            Err(ValidationError::UnknownCategory { .. })
        ));
        assert_eq!(
            validate_rejection("OTHER", "   too short   "),
            Err(ValidationError::ReasonTooShort { len: 9 })
        );
        let r = validate_rejection("other", "  exactly10c  ").unwrap();
        assert_eq!(r.reason, "exactly10c");
        assert_eq!(r.category, RejectionCategory::Other);
    }

    #[test]
    fn actor_must_be_non_blank() {
        assert_eq!(validate_actor(" \t"), Err(ValidationError::MissingActor));
        assert_eq!(validate_actor(" ana ").unwrap(), "ana");
    }
}
