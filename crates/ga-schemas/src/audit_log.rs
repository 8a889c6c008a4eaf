use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Micros;
use crate::procedure::{ProcedureStatus, RejectionCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Approve,
    Reject,
    Reset,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Approve => "APPROVE",
            AuditAction::Reject => "REJECT",
            AuditAction::Reset => "RESET",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "APPROVE" => Some(AuditAction::Approve),
            "REJECT" => Some(AuditAction::Reject),
            "RESET" => Some(AuditAction::Reset),
            _ => None,
        }
    }
}

/// Audit record before the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAuditLogEntry {
    pub guide_id: Uuid,
    pub procedure_id: Uuid,
    pub tariff_code: String,
    pub action: AuditAction,
    pub previous_status: ProcedureStatus,
    pub new_status: ProcedureStatus,
    pub billed_value: Micros,
    pub approved_value: Option<Micros>,
    pub rejection_category: Option<RejectionCategory>,
    pub rejection_reason: Option<String>,
    pub actor: String,
    pub ts_utc: DateTime<Utc>,
}

impl NewAuditLogEntry {
    pub fn with_id(self, entry_id: i64) -> AuditLogEntry {
        AuditLogEntry {
            entry_id,
            guide_id: self.guide_id,
            procedure_id: self.procedure_id,
            tariff_code: self.tariff_code,
            action: self.action,
            previous_status: self.previous_status,
            new_status: self.new_status,
            billed_value: self.billed_value,
            approved_value: self.approved_value,
            rejection_category: self.rejection_category,
            rejection_reason: self.rejection_reason,
            actor: self.actor,
            ts_utc: self.ts_utc,
        }
    }
}

/// Immutable record of one approve/reject/reset transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub entry_id: i64,
    pub guide_id: Uuid,
    pub procedure_id: Uuid,
    pub tariff_code: String,
    pub action: AuditAction,
    pub previous_status: ProcedureStatus,
    pub new_status: ProcedureStatus,
    pub billed_value: Micros,
    pub approved_value: Option<Micros>,
    pub rejection_category: Option<RejectionCategory>,
    pub rejection_reason: Option<String>,
    pub actor: String,
    pub ts_utc: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Approval whose approved value differs from the billed total.
    pub fn is_auto_corrected(&self) -> bool {
        self.action == AuditAction::Approve
            && self.approved_value.is_some_and(|v| v != self.billed_value)
    }
}
