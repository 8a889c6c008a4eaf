use chrono::NaiveDate;
use ga_reconcile::*;
use ga_schemas::{
    Contract, ContractBook, ContractItem, ContractStatus, Micros, Procedure, ProcedureStatus,
};
use uuid::Uuid;

const OP: &str = "OP-1";

fn line(seq: i32, code: &str, qty: i64, total_units: i64, tier: Option<&str>) -> Procedure {
    Procedure {
        procedure_id: Uuid::new_v4(),
        guide_id: Uuid::nil(),
        operator_id: OP.to_string(),
        sequence_number: seq,
        tariff_code: code.to_string(),
        description: String::new(),
        executed_quantity: qty,
        unit_value: Micros::from_units(total_units / qty),
        total_value: Micros::from_units(total_units),
        surgical_tier: tier.map(str::to_string),
        status: ProcedureStatus::Pending,
        approved_value: None,
        rejection: None,
    }
}

fn item(code: &str, units: i64, pkg: Option<&str>) -> ContractItem {
    ContractItem {
        tariff_code: code.to_string(),
        contracted_value: Micros::from_units(units),
        max_value: None,
        max_quantity: None,
        package_id: pkg.map(str::to_string),
    }
}

fn book() -> ContractBook {
    ContractBook::new(
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
        vec![Contract {
            contract_id: Uuid::new_v4(),
            operator_id: OP.to_string(),
            status: ContractStatus::Active,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
            items: vec![
                item("10101012", 100, None),
                item("31003079", 2_000, Some("PKG-APPY")),
                item("40901114", 50, None),
            ],
        }],
    )
}

fn refs() -> ReferenceTables {
    let mut r = ReferenceTables::default();
    r.surgical_tiers.insert("31003079".to_string(), "4".to_string());
    r.guidelines.insert(
        "40901114".to_string(),
        Guideline {
            reference: "DUT-65".to_string(),
            max_quantity: Some(1),
        },
    );
    r.packages.insert(
        "PKG-APPY".to_string(),
        ["31003079".to_string()].into_iter().collect(),
    );
    r
}

#[test]
fn scenario_outcomes_follow_fixed_validator_order() {
    let procs = vec![line(1, "31003079", 1, 2_000, Some("4"))];
    let r = reconcile_guide(&procs, &book(), &refs(), &ReconcileSettings::default());

    let cats: Vec<_> = r.procedures[0].outcomes.iter().map(|o| o.category).collect();
    assert_eq!(
        cats,
        vec![
            ValidationCategory::SurgicalTier,
            ValidationCategory::Package,
            ValidationCategory::Value,
            ValidationCategory::Duplicate,
        ]
    );
    assert!(r.pendencies.is_clean());
}

#[test]
fn scenario_total_equals_sum_of_categories() {
    let procs = vec![
        // clean
        line(1, "10101012", 1, 100, None),
        // overbilled + duplicate of line 1
        line(2, "10101012", 1, 150, None),
        // tier mismatch
        line(3, "31003079", 1, 2_000, Some("2")),
        // guideline exceeded, value scaled by qty is exact
        line(4, "40901114", 2, 100, None),
        // uncontracted: PACKAGE non-conformant + VALUE alert
        line(5, "20104065", 1, 30, None),
    ];

    let stats = aggregate_pendencies(&procs, &book(), &refs(), &ReconcileSettings::default());

    assert_eq!(stats.surgical_tier, 1);
    assert_eq!(stats.guideline, 1);
    assert_eq!(stats.package, 1);
    assert_eq!(stats.value, 2);
    assert_eq!(stats.duplicate, 2);
    assert_eq!(stats.total, 7);
    assert_eq!(stats.total, stats.category_sum());
}

#[test]
fn scenario_tolerance_is_configurable() {
    let procs = vec![line(1, "10101012", 1, 108, None)];
    let strict = aggregate_pendencies(&procs, &book(), &refs(), &ReconcileSettings::default());
    assert_eq!(strict.value, 1);

    let loose = ReconcileSettings {
        value_tolerance: ValueTolerance::from_bps(1_000),
        ..Default::default()
    };
    let relaxed = aggregate_pendencies(&procs, &book(), &refs(), &loose);
    assert_eq!(relaxed.value, 0);
}

#[test]
fn scenario_empty_guide_has_no_pendencies() {
    let stats = aggregate_pendencies(&[], &book(), &refs(), &ReconcileSettings::default());
    assert_eq!(stats, PendencyStats::default());
}
