//! ga-testkit
//!
//! Fixture reference data, a procedure builder and a failure-injecting
//! store. Cross-crate scenarios live under `tests/`.

mod fixtures;
mod flaky_store;

pub use fixtures::{
    fixture_as_of, fixture_contract_book, fixture_contracts, fixture_reference_tables,
    ProcedureBuilder, CONSULT_CODE, FIXTURE_OPERATOR, GUIDELINE_CODE, PACKAGED_SURGICAL_CODE,
    SURGICAL_CODE, SURGICAL_CODE_TIER5, TERMINATED_ONLY_CODE, UNCONTRACTED_CODE,
    UNKNOWN_PACKAGE_CODE,
};
pub use flaky_store::FlakyStore;
