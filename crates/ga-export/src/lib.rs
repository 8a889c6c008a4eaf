//! ga-export
//!
//! Export gate: only APPROVED procedures reach the serializer, and they reach
//! it carrying their approved value. Billed values of pending or rejected
//! lines never leave this crate.
//!
//! Pure and deterministic apart from the serializer the caller supplies.

mod gate;

pub use gate::{
    check_export_gate, export_eligible, export_guide, is_export_allowed, ExportBatch, ExportError,
    ExportGate, ExportLine, ExportRefusal, ExportRefusalReason, ExportSerializer,
    JsonExportSerializer,
};
