use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Micros;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractStatus {
    Active,
    Suspended,
    Terminated,
}

impl ContractStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ContractStatus::Active => "ACTIVE",
            ContractStatus::Suspended => "SUSPENDED",
            ContractStatus::Terminated => "TERMINATED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(ContractStatus::Active),
            "SUSPENDED" => Some(ContractStatus::Suspended),
            "TERMINATED" => Some(ContractStatus::Terminated),
            _ => None,
        }
    }
}

/// One tariff code priced by a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractItem {
    pub tariff_code: String,
    /// Per-unit contracted price.
    pub contracted_value: Micros,
    pub max_value: Option<Micros>,
    pub max_quantity: Option<i64>,
    /// Clinical package this code is billed under, if any.
    pub package_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub contract_id: Uuid,
    pub operator_id: String,
    pub status: ContractStatus,
    pub start_date: NaiveDate,
    /// Inclusive.
    pub end_date: NaiveDate,
    pub items: Vec<ContractItem>,
}

impl Contract {
    /// `as_of ∈ [start_date, end_date]` and status is ACTIVE.
    pub fn is_active(&self, as_of: NaiveDate) -> bool {
        self.status == ContractStatus::Active && self.start_date <= as_of && as_of <= self.end_date
    }

    pub fn item(&self, tariff_code: &str) -> Option<&ContractItem> {
        self.items.iter().find(|i| i.tariff_code == tariff_code)
    }
}

/// Read-only contract access used by reconciliation and approval.
pub trait ContractLookup: Send + Sync {
    /// Item for `tariff_code` from the operator's active contract, or `None`
    /// when the code is uncontracted.
    fn contract_item(&self, operator_id: &str, tariff_code: &str) -> Option<&ContractItem>;
}

/// Date a [`ContractBook`] evaluates contract windows at.
#[derive(Clone)]
enum AsOf {
    Fixed(NaiveDate),
    /// Read on every lookup, so a long-lived book follows the calendar.
    Clock(Arc<dyn Fn() -> NaiveDate + Send + Sync>),
}

impl AsOf {
    fn date(&self) -> NaiveDate {
        match self {
            AsOf::Fixed(d) => *d,
            AsOf::Clock(now) => now(),
        }
    }
}

impl std::fmt::Debug for AsOf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AsOf::Fixed(d) => write!(f, "Fixed({d})"),
            AsOf::Clock(_) => write!(f, "Clock"),
        }
    }
}

/// In-memory set of contracts evaluated at a fixed date or at a clock.
///
/// Inactive contracts are kept but never consulted. When two active contracts
/// of the same operator price the same code, the one starting later wins.
#[derive(Debug, Clone)]
pub struct ContractBook {
    as_of: AsOf,
    contracts: Vec<Contract>,
}

impl ContractBook {
    pub fn new(as_of: NaiveDate, contracts: Vec<Contract>) -> Self {
        Self {
            as_of: AsOf::Fixed(as_of),
            contracts,
        }
    }

    /// Re-evaluates activity with `clock` on every lookup.
    pub fn with_clock(
        mut self,
        clock: impl Fn() -> NaiveDate + Send + Sync + 'static,
    ) -> Self {
        self.as_of = AsOf::Clock(Arc::new(clock));
        self
    }

    /// Follows the current UTC date.
    pub fn tracking_today(self) -> Self {
        self.with_clock(|| chrono::Utc::now().date_naive())
    }

    /// Evaluation date right now.
    pub fn as_of(&self) -> NaiveDate {
        self.as_of.date()
    }

    pub fn contracts(&self) -> &[Contract] {
        &self.contracts
    }
}

impl ContractLookup for ContractBook {
    fn contract_item(&self, operator_id: &str, tariff_code: &str) -> Option<&ContractItem> {
        let as_of = self.as_of.date();
        self.contracts
            .iter()
            .filter(|c| c.operator_id == operator_id && c.is_active(as_of))
            .filter_map(|c| c.item(tariff_code).map(|i| (c.start_date, i)))
            .max_by_key(|(start, _)| *start)
            .map(|(_, item)| item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn item(code: &str, units: i64) -> ContractItem {
        ContractItem {
            tariff_code: code.to_string(),
            contracted_value: Micros::from_units(units),
            max_value: None,
            max_quantity: None,
            package_id: None,
        }
    }

    fn contract(status: ContractStatus, start: NaiveDate, end: NaiveDate, items: Vec<ContractItem>) -> Contract {
        Contract {
            contract_id: Uuid::new_v4(),
            operator_id: "OP-1".to_string(),
            status,
            start_date: start,
            end_date: end,
            items,
        }
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let c = contract(ContractStatus::Active, d(2026, 1, 1), d(2026, 12, 31), vec![]);
        assert!(c.is_active(d(2026, 1, 1)));
        assert!(c.is_active(d(2026, 12, 31)));
        assert!(!c.is_active(d(2025, 12, 31)));
        assert!(!c.is_active(d(2027, 1, 1)));
    }

    #[test]
    fn suspended_contract_is_never_active() {
        let c = contract(ContractStatus::Suspended, d(2026, 1, 1), d(2026, 12, 31), vec![]);
        assert!(!c.is_active(d(2026, 6, 1)));
    }

    #[test]
    fn lookup_skips_inactive_and_prefers_latest_start() {
        let book = ContractBook::new(
            d(2026, 6, 1),
            vec![
                contract(ContractStatus::Active, d(2025, 1, 1), d(2026, 12, 31), vec![item("10101012", 90)]),
                contract(ContractStatus::Active, d(2026, 3, 1), d(2026, 12, 31), vec![item("10101012", 100)]),
                contract(ContractStatus::Terminated, d(2026, 5, 1), d(2026, 12, 31), vec![item("10101012", 500)]),
                contract(ContractStatus::Active, d(2024, 1, 1), d(2024, 12, 31), vec![item("40301010", 20)]),
            ],
        );

        let hit = book.contract_item("OP-1", "10101012").unwrap();
        assert_eq!(hit.contracted_value, Micros::from_units(100));
        assert!(book.contract_item("OP-1", "40301010").is_none());
        assert!(book.contract_item("OP-2", "10101012").is_none());
    }

    #[test]
    fn clocked_book_drops_contract_once_it_expires() {
        use std::sync::atomic::{AtomicU64, Ordering};

        let day = Arc::new(AtomicU64::new(0));
        let base = d(2026, 6, 30);
        let clock_day = Arc::clone(&day);
        let book = ContractBook::new(
            d(2000, 1, 1),
            vec![contract(ContractStatus::Active, d(2026, 1, 1), d(2026, 6, 30), vec![item("10101012", 100)])],
        )
        .with_clock(move || base + chrono::Days::new(clock_day.load(Ordering::SeqCst)));

        assert_eq!(book.as_of(), d(2026, 6, 30));
        assert!(book.contract_item("OP-1", "10101012").is_some());

        day.store(1, Ordering::SeqCst);
        assert_eq!(book.as_of(), d(2026, 7, 1));
        assert!(book.contract_item("OP-1", "10101012").is_none());
    }
}
