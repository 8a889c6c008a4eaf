//! ga-reconcile
//!
//! Billed procedures against contract and reference data:
//! - five stateless validators, one per divergence category
//! - per-procedure reconciler with a fixed validator order
//! - guide-level pendency aggregation
//!
//! Deterministic, pure logic. No IO. No store calls.

mod duplicate;
mod engine;
mod reference;
mod types;
mod validators;

pub use duplicate::{DuplicateIndex, DuplicatePolicy};
pub use engine::{
    aggregate_pendencies, reconcile_guide, reconcile_procedure, GuideContext, ReconcileSettings,
};
pub use reference::{Guideline, ReferenceTables, TierBand};
pub use types::*;
pub use validators::{
    contracted_total, is_surgical_code, validate_duplicate, validate_guideline, validate_package,
    validate_surgical_tier, validate_value, ValueTolerance, NOT_FOUND, NOT_INFORMED,
    SURGICAL_CODE_MAX, SURGICAL_CODE_MIN, UNDETERMINED,
};
