//! Request and response types for the ga-daemon HTTP endpoints.
//!
//! No business logic lives here.

use ga_decision::BulkDecision;
use ga_reconcile::{PendencyStats, ProcedureReconciliation};
use ga_schemas::{AuditLogEntry, Procedure};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of every non-2xx response except a blocked export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// "validation" | "not_found" | "conflict" | "transient" | "ingest"
    pub kind: String,
    /// Store state re-read after a failed transition, when it still exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedure: Option<Procedure>,
}

// ---------------------------------------------------------------------------
// Guides
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub guide_id: Uuid,
    pub procedures: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuideProceduresResponse {
    pub guide_id: Uuid,
    pub procedures: Vec<Procedure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuideReconcileResponse {
    pub guide_id: Uuid,
    pub procedures: Vec<ProcedureReconciliation>,
    pub pendencies: PendencyStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuidePendenciesResponse {
    pub guide_id: Uuid,
    pub pendencies: PendencyStats,
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorRequest {
    pub actor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectRequest {
    pub actor: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub entry: AuditLogEntry,
    /// Procedure as re-read after the commit.
    pub procedure: Procedure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkRequest {
    pub actor: String,
    pub procedure_ids: Vec<Uuid>,
    #[serde(flatten)]
    pub decision: BulkDecision,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogResponse {
    pub procedure_id: Uuid,
    pub entries: Vec<AuditLogEntry>,
}
