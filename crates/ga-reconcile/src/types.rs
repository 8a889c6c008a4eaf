use ga_schemas::Micros;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Divergence category, one validator each. Declaration order is the order
/// the reconciler runs them in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCategory {
    SurgicalTier,
    Guideline,
    Package,
    Value,
    Duplicate,
}

impl ValidationCategory {
    pub const ORDERED: [ValidationCategory; 5] = [
        ValidationCategory::SurgicalTier,
        ValidationCategory::Guideline,
        ValidationCategory::Package,
        ValidationCategory::Value,
        ValidationCategory::Duplicate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ValidationCategory::SurgicalTier => "SURGICAL_TIER",
            ValidationCategory::Guideline => "GUIDELINE",
            ValidationCategory::Package => "PACKAGE",
            ValidationCategory::Value => "VALUE",
            ValidationCategory::Duplicate => "DUPLICATE",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Conformant,
    NonConformant,
    Alert,
}

impl OutcomeStatus {
    /// NON_CONFORMANT and ALERT count as pendencies.
    pub fn is_pendency(self) -> bool {
        !matches!(self, OutcomeStatus::Conformant)
    }
}

/// Category-specific evidence carried by an outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeDetail {
    Tier {
        expected: String,
        found: String,
    },
    Guideline {
        reference: String,
        max_quantity: Option<i64>,
        executed_quantity: i64,
    },
    Package {
        package_id: Option<String>,
    },
    Value {
        /// `None` when the code is uncontracted.
        expected: Option<Micros>,
        found: Micros,
        difference: Option<Micros>,
        /// Signed `difference / expected` in basis points, truncated.
        difference_bps: Option<i64>,
    },
    Duplicate {
        partners: Vec<Uuid>,
    },
}

/// Result of one validator for one procedure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub procedure_id: Uuid,
    pub category: ValidationCategory,
    pub status: OutcomeStatus,
    pub message: String,
    pub detail: OutcomeDetail,
}

impl ValidationOutcome {
    pub fn is_pendency(&self) -> bool {
        self.status.is_pendency()
    }
}

/// Per-guide count of NON_CONFORMANT and ALERT outcomes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendencyStats {
    pub total: u32,
    pub surgical_tier: u32,
    pub guideline: u32,
    pub package: u32,
    pub value: u32,
    pub duplicate: u32,
}

impl PendencyStats {
    pub fn record(&mut self, outcome: &ValidationOutcome) {
        if !outcome.is_pendency() {
            return;
        }
        self.total += 1;
        match outcome.category {
            ValidationCategory::SurgicalTier => self.surgical_tier += 1,
            ValidationCategory::Guideline => self.guideline += 1,
            ValidationCategory::Package => self.package += 1,
            ValidationCategory::Value => self.value += 1,
            ValidationCategory::Duplicate => self.duplicate += 1,
        }
    }

    pub fn category(&self, category: ValidationCategory) -> u32 {
        match category {
            ValidationCategory::SurgicalTier => self.surgical_tier,
            ValidationCategory::Guideline => self.guideline,
            ValidationCategory::Package => self.package,
            ValidationCategory::Value => self.value,
            ValidationCategory::Duplicate => self.duplicate,
        }
    }

    pub fn category_sum(&self) -> u32 {
        ValidationCategory::ORDERED
            .iter()
            .map(|c| self.category(*c))
            .sum()
    }

    pub fn is_clean(&self) -> bool {
        self.total == 0
    }
}

/// Outcomes for one procedure, in validator order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureReconciliation {
    pub procedure_id: Uuid,
    pub sequence_number: i32,
    pub tariff_code: String,
    pub outcomes: Vec<ValidationOutcome>,
}

/// Per-procedure outcomes plus the guide pendency summary from one pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuideReconciliation {
    pub procedures: Vec<ProcedureReconciliation>,
    pub pendencies: PendencyStats,
}
