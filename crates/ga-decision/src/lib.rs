//! ga-decision
//!
//! Audit decision state machine (approve, reject, reset) and the bulk
//! coordinator built on it. Persistence sits behind [`ProcedureStore`];
//! the engine never assumes a transition landed until the store confirms.

mod bulk;
mod engine;
mod error;
mod store;
mod transition;

pub use bulk::{
    approve_guide, bulk_apply, select_all_pending, BulkDecision, BulkFailure, BulkFailureKind,
    BulkOutcome, GuideApproval,
};
pub use engine::DecisionEngine;
pub use error::{DecisionError, GuideInsertError, StoreError, ValidationError};
pub use store::{MemoryProcedureStore, ProcedureStore};
pub use transition::{
    plan_transition, validate_actor, validate_rejection, DecisionEvent, ProcedureUpdate,
    TransitionError,
};
