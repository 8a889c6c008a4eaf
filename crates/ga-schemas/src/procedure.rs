use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Micros;

/// Minimum length of a trimmed rejection reason.
pub const MIN_REJECTION_REASON_LEN: usize = 10;

/// Audit status of a single billed procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcedureStatus {
    Pending,
    Approved,
    Rejected,
}

impl ProcedureStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcedureStatus::Pending => "PENDING",
            ProcedureStatus::Approved => "APPROVED",
            ProcedureStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(ProcedureStatus::Pending),
            "APPROVED" => Some(ProcedureStatus::Approved),
            "REJECTED" => Some(ProcedureStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProcedureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of reasons an auditor may give when rejecting a procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionCategory {
    ValueDivergence,
    IncorrectCode,
    OutOfPackage,
    MissingDocumentation,
    NonConformantGuideline,
    Duplicate,
    QuantityExceeded,
    Other,
}

impl RejectionCategory {
    pub const ALL: [RejectionCategory; 8] = [
        RejectionCategory::ValueDivergence,
        RejectionCategory::IncorrectCode,
        RejectionCategory::OutOfPackage,
        RejectionCategory::MissingDocumentation,
        RejectionCategory::NonConformantGuideline,
        RejectionCategory::Duplicate,
        RejectionCategory::QuantityExceeded,
        RejectionCategory::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RejectionCategory::ValueDivergence => "VALUE_DIVERGENCE",
            RejectionCategory::IncorrectCode => "INCORRECT_CODE",
            RejectionCategory::OutOfPackage => "OUT_OF_PACKAGE",
            RejectionCategory::MissingDocumentation => "MISSING_DOCUMENTATION",
            RejectionCategory::NonConformantGuideline => "NON_CONFORMANT_GUIDELINE",
            RejectionCategory::Duplicate => "DUPLICATE",
            RejectionCategory::QuantityExceeded => "QUANTITY_EXCEEDED",
            RejectionCategory::Other => "OTHER",
        }
    }

    /// Case-insensitive lookup; accepts `-` or `_` separators.
    pub fn parse(raw: &str) -> Option<Self> {
        let norm = raw.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL.into_iter().find(|c| c.as_str() == norm)
    }
}

impl std::fmt::Display for RejectionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category and free-text justification attached to a rejected procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub category: RejectionCategory,
    pub reason: String,
}

/// One billed line item on a guide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Procedure {
    pub procedure_id: Uuid,
    pub guide_id: Uuid,
    /// Payer whose contract governs this guide.
    pub operator_id: String,
    pub sequence_number: i32,
    pub tariff_code: String,
    pub description: String,
    pub executed_quantity: i64,
    pub unit_value: Micros,
    pub total_value: Micros,
    /// Complexity tier declared by the provider (surgical codes only).
    pub surgical_tier: Option<String>,
    pub status: ProcedureStatus,
    pub approved_value: Option<Micros>,
    pub rejection: Option<Rejection>,
}

impl Procedure {
    pub fn is_pending(&self) -> bool {
        self.status == ProcedureStatus::Pending
    }

    /// Returns a description of the first broken status invariant, if any.
    ///
    /// REJECTED carries a category and a reason of at least
    /// [`MIN_REJECTION_REASON_LEN`] trimmed chars; APPROVED carries an
    /// approved value; PENDING carries neither.
    pub fn invariant_violation(&self) -> Option<&'static str> {
        match self.status {
            ProcedureStatus::Pending => {
                if self.approved_value.is_some() {
                    return Some("pending procedure has an approved value");
                }
                if self.rejection.is_some() {
                    return Some("pending procedure has a rejection");
                }
            }
            ProcedureStatus::Approved => {
                if self.approved_value.is_none() {
                    return Some("approved procedure has no approved value");
                }
                if self.rejection.is_some() {
                    return Some("approved procedure has a rejection");
                }
            }
            ProcedureStatus::Rejected => match &self.rejection {
                None => return Some("rejected procedure has no rejection"),
                Some(r) if r.reason.trim().chars().count() < MIN_REJECTION_REASON_LEN => {
                    return Some("rejected procedure has a reason that is too short")
                }
                Some(_) => {}
            },
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> Procedure {
        Procedure {
            procedure_id: Uuid::new_v4(),
            guide_id: Uuid::new_v4(),
            operator_id: "OP-1".to_string(),
            sequence_number: 1,
            tariff_code: "10101012".to_string(),
            description: "consulta".to_string(),
            executed_quantity: 1,
            unit_value: Micros::from_units(100),
            total_value: Micros::from_units(100),
            surgical_tier: None,
            status: ProcedureStatus::Pending,
            approved_value: None,
            rejection: None,
        }
    }

    #[test]
    fn category_parse_is_lenient_on_case_and_separator() {
        assert_eq!(
            RejectionCategory::parse("value-divergence"),
            Some(RejectionCategory::ValueDivergence)
        );
        assert_eq!(
            RejectionCategory::parse(" OUT_OF_PACKAGE "),
            Some(RejectionCategory::OutOfPackage)
        );
        assert_eq!(RejectionCategory::parse(""), None);
        assert_eq!(RejectionCategory::parse("fraud"), None);
    }

    #[test]
    fn category_serde_matches_as_str() {
        for c in RejectionCategory::ALL {
            let json = serde_json::to_string(&c).unwrap();
            assert_eq!(json, format!("\"{}\"", c.as_str()));
        }
    }

    #[test]
    fn invariants_hold_for_each_status() {
        let mut p = pending();
        assert_eq!(p.invariant_violation(), None);

        p.status = ProcedureStatus::Approved;
        assert!(p.invariant_violation().is_some());
        p.approved_value = Some(Micros::from_units(100));
        assert_eq!(p.invariant_violation(), None);

        p.status = ProcedureStatus::Rejected;
        p.approved_value = None;
        p.rejection = Some(Rejection {
            category: RejectionCategory::Other,
            reason: "  short   ".to_string(),
        });
        assert!(p.invariant_violation().is_some());
        p.rejection = Some(Rejection {
            category: RejectionCategory::Other,
            reason: "missing surgical report".to_string(),
        });
        assert_eq!(p.invariant_violation(), None);
    }
}
