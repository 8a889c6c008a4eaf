use ga_schemas::{ContractItem, ContractLookup, Procedure};
use serde::{Deserialize, Serialize};

use crate::duplicate::{DuplicateIndex, DuplicatePolicy};
use crate::reference::ReferenceTables;
use crate::types::{GuideReconciliation, PendencyStats, ProcedureReconciliation, ValidationOutcome};
use crate::validators::{
    validate_duplicate, validate_guideline, validate_package, validate_surgical_tier,
    validate_value, ValueTolerance,
};

/// Tunables shared by every reconciliation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSettings {
    pub value_tolerance: ValueTolerance,
    pub duplicate_policy: DuplicatePolicy,
}

/// Guide-wide inputs for reconciling any one of its procedures.
#[derive(Clone, Debug)]
pub struct GuideContext<'a> {
    pub refs: &'a ReferenceTables,
    pub value_tolerance: ValueTolerance,
    pub duplicates: DuplicateIndex,
}

impl<'a> GuideContext<'a> {
    pub fn new(
        procedures: &[Procedure],
        refs: &'a ReferenceTables,
        settings: &ReconcileSettings,
    ) -> Self {
        Self {
            refs,
            value_tolerance: settings.value_tolerance,
            duplicates: DuplicateIndex::build(procedures, settings.duplicate_policy),
        }
    }
}

/// Runs every validator for one procedure, in the fixed order
/// SURGICAL_TIER, GUIDELINE, PACKAGE, VALUE, DUPLICATE. Abstaining validators
/// contribute nothing.
pub fn reconcile_procedure(
    procedure: &Procedure,
    item: Option<&ContractItem>,
    ctx: &GuideContext<'_>,
) -> Vec<ValidationOutcome> {
    let mut out = Vec::with_capacity(5);
    out.extend(validate_surgical_tier(procedure, ctx.refs));
    out.extend(validate_guideline(procedure, ctx.refs));
    out.push(validate_package(procedure, item, ctx.refs));
    out.push(validate_value(procedure, item, ctx.value_tolerance));
    out.push(validate_duplicate(procedure, &ctx.duplicates));
    out
}

/// One pass over a guide: per-procedure outcomes plus the pendency summary.
///
/// Procedures keep their input order. A missing contract item is the
/// uncontracted case, not an error.
pub fn reconcile_guide<L: ContractLookup + ?Sized>(
    procedures: &[Procedure],
    lookup: &L,
    refs: &ReferenceTables,
    settings: &ReconcileSettings,
) -> GuideReconciliation {
    let ctx = GuideContext::new(procedures, refs, settings);
    let mut pendencies = PendencyStats::default();
    let mut rows = Vec::with_capacity(procedures.len());

    for p in procedures {
        let item = lookup.contract_item(&p.operator_id, &p.tariff_code);
        let outcomes = reconcile_procedure(p, item, &ctx);
        for o in &outcomes {
            pendencies.record(o);
        }
        rows.push(ProcedureReconciliation {
            procedure_id: p.procedure_id,
            sequence_number: p.sequence_number,
            tariff_code: p.tariff_code.clone(),
            outcomes,
        });
    }

    GuideReconciliation {
        procedures: rows,
        pendencies,
    }
}

/// Pendency counts for a guide. `total` always equals the sum of the
/// per-category counters.
pub fn aggregate_pendencies<L: ContractLookup + ?Sized>(
    procedures: &[Procedure],
    lookup: &L,
    refs: &ReferenceTables,
    settings: &ReconcileSettings,
) -> PendencyStats {
    reconcile_guide(procedures, lookup, refs, settings).pendencies
}
