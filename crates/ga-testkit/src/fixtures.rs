//! Documented fixture data.
//!
//! Operator `OP-001`, evaluated on 2026-01-15.
//!
//! Contract book (one ACTIVE contract 2025-01-01..=2026-12-31):
//!
//! | code       | contracted | package      |
//! |------------|-----------:|--------------|
//! | `10101012` |     100.00 |              |
//! | `30602122` |    1500.00 |              |
//! | `31009336` |    2200.00 |              |
//! | `30911028` |     800.00 | `PKG-CARDIO` |
//! | `40301630` |      12.50 | `PKG-CARDIO` |
//! | `40304361` |      20.00 | `PKG-RENAL`  |
//!
//! A TERMINATED contract of the same operator lists `10101039` at 50.00;
//! lookups never see it.
//!
//! Reference tables:
//! - surgical tiers on file: `30602122` -> "3", `31009336` -> "5"
//! - tier bands: 30000000..=30499999 -> "2", 30500000..=31999999 -> "4"
//! - guidelines: `40301630` "DUT 65" max 2 per guide, `40304361` "DUT 110" unbounded
//! - packages: `PKG-CARDIO` = {`30911028`, `40301630`}; `PKG-RENAL` is not on file

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use ga_reconcile::{Guideline, ReferenceTables, TierBand};
use ga_schemas::{
    Contract, ContractBook, ContractItem, ContractStatus, Micros, Procedure, ProcedureStatus,
    Rejection, RejectionCategory,
};
use uuid::Uuid;

pub const FIXTURE_OPERATOR: &str = "OP-001";

pub const CONSULT_CODE: &str = "10101012";
pub const SURGICAL_CODE: &str = "30602122";
pub const SURGICAL_CODE_TIER5: &str = "31009336";
pub const PACKAGED_SURGICAL_CODE: &str = "30911028";
pub const GUIDELINE_CODE: &str = "40301630";
pub const UNKNOWN_PACKAGE_CODE: &str = "40304361";
pub const TERMINATED_ONLY_CODE: &str = "10101039";
pub const UNCONTRACTED_CODE: &str = "20104014";

pub fn fixture_as_of() -> NaiveDate {
    date(2026, 1, 15)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
}

fn item(code: &str, units_cents: i64, package_id: Option<&str>) -> ContractItem {
    ContractItem {
        tariff_code: code.to_string(),
        contracted_value: Micros::new(units_cents * 10_000),
        max_value: None,
        max_quantity: None,
        package_id: package_id.map(str::to_string),
    }
}

pub fn fixture_contracts() -> Vec<Contract> {
    vec![
        Contract {
            contract_id: Uuid::from_u128(0xC0_01),
            operator_id: FIXTURE_OPERATOR.to_string(),
            status: ContractStatus::Active,
            start_date: date(2025, 1, 1),
            end_date: date(2026, 12, 31),
            items: vec![
                item(CONSULT_CODE, 10_000, None),
                item(SURGICAL_CODE, 150_000, None),
                item(SURGICAL_CODE_TIER5, 220_000, None),
                item(PACKAGED_SURGICAL_CODE, 80_000, Some("PKG-CARDIO")),
                item(GUIDELINE_CODE, 1_250, Some("PKG-CARDIO")),
                item(UNKNOWN_PACKAGE_CODE, 2_000, Some("PKG-RENAL")),
            ],
        },
        Contract {
            contract_id: Uuid::from_u128(0xC0_02),
            operator_id: FIXTURE_OPERATOR.to_string(),
            status: ContractStatus::Terminated,
            start_date: date(2024, 1, 1),
            end_date: date(2027, 12, 31),
            items: vec![item(TERMINATED_ONLY_CODE, 5_000, None)],
        },
    ]
}

pub fn fixture_contract_book() -> ContractBook {
    ContractBook::new(fixture_as_of(), fixture_contracts())
}

pub fn fixture_reference_tables() -> ReferenceTables {
    let surgical_tiers = BTreeMap::from([
        (SURGICAL_CODE.to_string(), "3".to_string()),
        (SURGICAL_CODE_TIER5.to_string(), "5".to_string()),
    ]);
    let tier_bands = vec![
        TierBand {
            from: 30_000_000,
            to: 30_499_999,
            tier: "2".to_string(),
        },
        TierBand {
            from: 30_500_000,
            to: 31_999_999,
            tier: "4".to_string(),
        },
    ];
    let guidelines = BTreeMap::from([
        (
            GUIDELINE_CODE.to_string(),
            Guideline {
                reference: "DUT 65".to_string(),
                max_quantity: Some(2),
            },
        ),
        (
            UNKNOWN_PACKAGE_CODE.to_string(),
            Guideline {
                reference: "DUT 110".to_string(),
                max_quantity: None,
            },
        ),
    ]);
    let packages = BTreeMap::from([(
        "PKG-CARDIO".to_string(),
        BTreeSet::from([PACKAGED_SURGICAL_CODE.to_string(), GUIDELINE_CODE.to_string()]),
    )]);

    ReferenceTables {
        surgical_tiers,
        tier_bands,
        guidelines,
        packages,
    }
}

/// Builds a fixture-operator procedure. Total defaults to unit x quantity.
#[derive(Clone, Debug)]
pub struct ProcedureBuilder {
    p: Procedure,
    explicit_total: bool,
}

impl ProcedureBuilder {
    pub fn new(guide_id: Uuid, tariff_code: &str) -> Self {
        Self {
            p: Procedure {
                procedure_id: Uuid::new_v4(),
                guide_id,
                operator_id: FIXTURE_OPERATOR.to_string(),
                sequence_number: 1,
                tariff_code: tariff_code.to_string(),
                description: format!("procedure {tariff_code}"),
                executed_quantity: 1,
                unit_value: Micros::from_units(100),
                total_value: Micros::from_units(100),
                surgical_tier: None,
                status: ProcedureStatus::Pending,
                approved_value: None,
                rejection: None,
            },
            explicit_total: false,
        }
    }

    pub fn id(mut self, procedure_id: Uuid) -> Self {
        self.p.procedure_id = procedure_id;
        self
    }

    pub fn operator(mut self, operator_id: &str) -> Self {
        self.p.operator_id = operator_id.to_string();
        self
    }

    pub fn seq(mut self, sequence_number: i32) -> Self {
        self.p.sequence_number = sequence_number;
        self
    }

    pub fn qty(mut self, executed_quantity: i64) -> Self {
        self.p.executed_quantity = executed_quantity;
        self
    }

    pub fn unit(mut self, unit_value: Micros) -> Self {
        self.p.unit_value = unit_value;
        self
    }

    pub fn total(mut self, total_value: Micros) -> Self {
        self.p.total_value = total_value;
        self.explicit_total = true;
        self
    }

    pub fn tier(mut self, tier: &str) -> Self {
        self.p.surgical_tier = Some(tier.to_string());
        self
    }

    pub fn approved(mut self, approved_value: Micros) -> Self {
        self.p.status = ProcedureStatus::Approved;
        self.p.approved_value = Some(approved_value);
        self.p.rejection = None;
        self
    }

    pub fn rejected(mut self, category: RejectionCategory, reason: &str) -> Self {
        self.p.status = ProcedureStatus::Rejected;
        self.p.approved_value = None;
        self.p.rejection = Some(Rejection {
            category,
            reason: reason.to_string(),
        });
        self
    }

    pub fn build(mut self) -> Procedure {
        if !self.explicit_total {
            self.p.total_value = self
                .p
                .unit_value
                .checked_mul_qty(self.p.executed_quantity)
                .unwrap_or(self.p.unit_value);
        }
        self.p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ga_schemas::ContractLookup;

    #[test]
    fn terminated_contract_is_invisible() {
        let book = fixture_contract_book();
        assert!(book.contract_item(FIXTURE_OPERATOR, TERMINATED_ONLY_CODE).is_none());
        assert_eq!(
            book.contract_item(FIXTURE_OPERATOR, GUIDELINE_CODE)
                .map(|i| i.contracted_value),
            Some(Micros::parse_decimal("12.50").unwrap())
        );
    }

    #[test]
    fn builder_derives_total_from_unit_and_quantity() {
        let p = ProcedureBuilder::new(Uuid::nil(), CONSULT_CODE)
            .qty(3)
            .unit(Micros::from_units(40))
            .build();
        assert_eq!(p.total_value, Micros::from_units(120));
        assert!(p.invariant_violation().is_none());
    }
}
