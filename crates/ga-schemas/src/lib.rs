//! Shared data model for guide auditing.
//!
//! Strict shapes only: every type here has already passed the ingestion
//! boundary in [`ingest`]. Money is always [`Micros`].

pub mod audit_log;
pub mod contract;
pub mod ingest;
pub mod money;
pub mod procedure;

pub use audit_log::{AuditAction, AuditLogEntry, NewAuditLogEntry};
pub use contract::{Contract, ContractBook, ContractItem, ContractLookup, ContractStatus};
pub use ingest::{normalize_guide, normalize_guide_json, IngestError, RawGuide, RawProcedure};
pub use money::{Micros, MoneyParseError, MICROS_PER_UNIT};
pub use procedure::{
    Procedure, ProcedureStatus, Rejection, RejectionCategory, MIN_REJECTION_REASON_LEN,
};
