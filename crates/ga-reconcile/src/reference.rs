//! Reference datasets consulted by the validators.
//!
//! Loaded once per process (YAML, see `ga-config`) and shared read-only.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Inclusive numeric code range mapped to a tier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierBand {
    pub from: u32,
    pub to: u32,
    pub tier: String,
}

/// Clinical-utilization guideline attached to a tariff code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guideline {
    pub reference: String,
    /// Maximum executed quantity per guide; `None` means unbounded.
    #[serde(default)]
    pub max_quantity: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceTables {
    /// Tariff code -> expected surgical tier.
    #[serde(default)]
    pub surgical_tiers: BTreeMap<String, String>,
    /// Fallback used to derive an expected tier for surgical codes with no
    /// entry in `surgical_tiers`.
    #[serde(default)]
    pub tier_bands: Vec<TierBand>,
    #[serde(default)]
    pub guidelines: BTreeMap<String, Guideline>,
    /// Package id -> member tariff codes.
    #[serde(default)]
    pub packages: BTreeMap<String, BTreeSet<String>>,
}

impl ReferenceTables {
    pub fn tier_on_file(&self, tariff_code: &str) -> Option<&str> {
        self.surgical_tiers.get(tariff_code).map(String::as_str)
    }

    /// First band containing the numeric code.
    pub fn derived_tier(&self, tariff_code: &str) -> Option<&str> {
        let code: u32 = tariff_code.parse().ok()?;
        self.tier_bands
            .iter()
            .find(|b| b.from <= code && code <= b.to)
            .map(|b| b.tier.as_str())
    }

    pub fn guideline(&self, tariff_code: &str) -> Option<&Guideline> {
        self.guidelines.get(tariff_code)
    }

    /// `None` when the package id is unknown.
    pub fn package_contains(&self, package_id: &str, tariff_code: &str) -> Option<bool> {
        self.packages
            .get(package_id)
            .map(|codes| codes.contains(tariff_code))
    }
}
