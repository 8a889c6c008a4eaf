//! The five divergence validators.
//!
//! Each is a pure function of the procedure plus whatever contract or
//! reference data it needs. A validator whose precondition does not hold
//! returns `None` rather than a forced CONFORMANT.

use ga_schemas::{ContractItem, Micros, Procedure};
use serde::{Deserialize, Serialize};

use crate::duplicate::DuplicateIndex;
use crate::reference::ReferenceTables;
use crate::types::{OutcomeDetail, OutcomeStatus, ValidationCategory, ValidationOutcome};

/// Inclusive numeric range of surgical tariff codes (8 digits).
pub const SURGICAL_CODE_MIN: u32 = 30_000_000;
pub const SURGICAL_CODE_MAX: u32 = 31_999_999;

pub const NOT_FOUND: &str = "not found";
pub const NOT_INFORMED: &str = "not informed";
pub const UNDETERMINED: &str = "UNDETERMINED";

/// VALUE tolerance band in basis points (500 = 5%).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueTolerance(u32);

impl ValueTolerance {
    pub const DEFAULT_BPS: u32 = 500;

    pub const fn from_bps(bps: u32) -> Self {
        ValueTolerance(bps)
    }

    pub const fn bps(self) -> u32 {
        self.0
    }
}

impl Default for ValueTolerance {
    fn default() -> Self {
        ValueTolerance(Self::DEFAULT_BPS)
    }
}

pub fn is_surgical_code(tariff_code: &str) -> bool {
    tariff_code.len() == 8
        && tariff_code
            .parse::<u32>()
            .map(|n| (SURGICAL_CODE_MIN..=SURGICAL_CODE_MAX).contains(&n))
            .unwrap_or(false)
}

fn outcome(
    p: &Procedure,
    category: ValidationCategory,
    status: OutcomeStatus,
    message: String,
    detail: OutcomeDetail,
) -> ValidationOutcome {
    ValidationOutcome {
        procedure_id: p.procedure_id,
        category,
        status,
        message,
        detail,
    }
}

// ---------------------------------------------------------------------------
// SURGICAL_TIER
// ---------------------------------------------------------------------------

pub fn validate_surgical_tier(p: &Procedure, refs: &ReferenceTables) -> Option<ValidationOutcome> {
    if !is_surgical_code(&p.tariff_code) {
        return None;
    }
    let cat = ValidationCategory::SurgicalTier;

    let Some(expected) = refs.tier_on_file(&p.tariff_code) else {
        let derived = refs.derived_tier(&p.tariff_code).unwrap_or(UNDETERMINED);
        return Some(outcome(
            p,
            cat,
            OutcomeStatus::Alert,
            format!(
                "no surgical tier on file for {}; expected tier derived as {derived}",
                p.tariff_code
            ),
            OutcomeDetail::Tier {
                expected: derived.to_string(),
                found: NOT_FOUND.to_string(),
            },
        ));
    };

    match p.surgical_tier.as_deref() {
        Some(found) if found == expected => Some(outcome(
            p,
            cat,
            OutcomeStatus::Conformant,
            format!("surgical tier {found} matches"),
            OutcomeDetail::Tier {
                expected: expected.to_string(),
                found: found.to_string(),
            },
        )),
        billed => {
            let found = billed.unwrap_or(NOT_INFORMED);
            Some(outcome(
                p,
                cat,
                OutcomeStatus::NonConformant,
                format!("surgical tier mismatch: expected {expected}, found {found}"),
                OutcomeDetail::Tier {
                    expected: expected.to_string(),
                    found: found.to_string(),
                },
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// GUIDELINE
// ---------------------------------------------------------------------------

pub fn validate_guideline(p: &Procedure, refs: &ReferenceTables) -> Option<ValidationOutcome> {
    let g = refs.guideline(&p.tariff_code)?;
    let conforms = g.max_quantity.map_or(true, |max| p.executed_quantity <= max);

    let (status, message) = if conforms {
        (
            OutcomeStatus::Conformant,
            format!("conforms to guideline {}", g.reference),
        )
    } else {
        (
            OutcomeStatus::Alert,
            format!(
                "executed quantity {} exceeds guideline {} maximum of {}",
                p.executed_quantity,
                g.reference,
                g.max_quantity.unwrap_or_default()
            ),
        )
    };

    Some(outcome(
        p,
        ValidationCategory::Guideline,
        status,
        message,
        OutcomeDetail::Guideline {
            reference: g.reference.clone(),
            max_quantity: g.max_quantity,
            executed_quantity: p.executed_quantity,
        },
    ))
}

// ---------------------------------------------------------------------------
// PACKAGE
// ---------------------------------------------------------------------------

pub fn validate_package(
    p: &Procedure,
    item: Option<&ContractItem>,
    refs: &ReferenceTables,
) -> ValidationOutcome {
    let cat = ValidationCategory::Package;
    let package_id = item.and_then(|i| i.package_id.clone());

    let (status, message) = match (item, package_id.as_deref()) {
        (None, _) => (
            OutcomeStatus::NonConformant,
            format!("{} is not contracted; possible denial risk", p.tariff_code),
        ),
        (Some(_), None) => (
            OutcomeStatus::Conformant,
            format!("{} is individually contracted", p.tariff_code),
        ),
        (Some(_), Some(pkg)) => match refs.package_contains(pkg, &p.tariff_code) {
            Some(true) => (
                OutcomeStatus::Conformant,
                format!("{} is included in package {pkg}", p.tariff_code),
            ),
            Some(false) => (
                OutcomeStatus::NonConformant,
                format!(
                    "{} is not included in package {pkg}; possible denial risk",
                    p.tariff_code
                ),
            ),
            None => (
                OutcomeStatus::NonConformant,
                format!("package {pkg} is not on file; possible denial risk"),
            ),
        },
    };

    outcome(p, cat, status, message, OutcomeDetail::Package { package_id })
}

// ---------------------------------------------------------------------------
// VALUE
// ---------------------------------------------------------------------------

/// Contracted value for the billed quantity, or `None` when uncontracted
/// (or the product overflows).
pub fn contracted_total(p: &Procedure, item: Option<&ContractItem>) -> Option<Micros> {
    item.and_then(|i| i.contracted_value.checked_mul_qty(p.executed_quantity))
}

pub fn validate_value(
    p: &Procedure,
    item: Option<&ContractItem>,
    tolerance: ValueTolerance,
) -> ValidationOutcome {
    let cat = ValidationCategory::Value;
    let found = p.total_value;

    let Some(expected) = contracted_total(p, item) else {
        return outcome(
            p,
            cat,
            OutcomeStatus::Alert,
            format!("{} is uncontracted; billed {found}", p.tariff_code),
            OutcomeDetail::Value {
                expected: None,
                found,
                difference: None,
                difference_bps: None,
            },
        );
    };

    let diff = i128::from(found.raw()) - i128::from(expected.raw());
    let difference = i64::try_from(diff).ok().map(Micros::new);

    if expected.is_zero() {
        let status = if found.is_zero() {
            OutcomeStatus::Conformant
        } else {
            OutcomeStatus::Alert
        };
        return outcome(
            p,
            cat,
            status,
            format!("contracted value is zero; billed {found}"),
            OutcomeDetail::Value {
                expected: Some(expected),
                found,
                difference,
                difference_bps: None,
            },
        );
    }

    let contracted = i128::from(expected.raw());
    let difference_bps = i64::try_from(diff * 10_000 / contracted).ok();
    let within = diff.abs() * 10_000 <= i128::from(tolerance.bps()) * contracted.abs();

    let (status, message) = if within {
        (
            OutcomeStatus::Conformant,
            format!("billed {found} within tolerance of contracted {expected}"),
        )
    } else if diff > 0 {
        (
            OutcomeStatus::Alert,
            format!("billed {found} above contracted {expected}"),
        )
    } else {
        (
            OutcomeStatus::NonConformant,
            format!("billed {found} below contracted {expected}; potential loss"),
        )
    };

    outcome(
        p,
        cat,
        status,
        message,
        OutcomeDetail::Value {
            expected: Some(expected),
            found,
            difference,
            difference_bps,
        },
    )
}

// ---------------------------------------------------------------------------
// DUPLICATE
// ---------------------------------------------------------------------------

pub fn validate_duplicate(p: &Procedure, index: &DuplicateIndex) -> ValidationOutcome {
    let partners = index.partners_of(p.procedure_id);
    let (status, message) = if partners.is_empty() {
        (OutcomeStatus::Conformant, "no duplicate billing".to_string())
    } else {
        (
            OutcomeStatus::NonConformant,
            format!(
                "{} billed more than once on this guide ({} other line(s))",
                p.tariff_code,
                partners.len()
            ),
        )
    };
    outcome(
        p,
        ValidationCategory::Duplicate,
        status,
        message,
        OutcomeDetail::Duplicate { partners },
    )
}
