use std::collections::{BTreeMap, BTreeSet};

use ga_schemas::Procedure;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// When two procedures on the same guide count as duplicated billing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Same tariff code anywhere on the guide.
    #[default]
    SameTariffCode,
    /// Same tariff code and sequence numbers at most `window` apart.
    SequenceWindow { window: u32 },
}

impl DuplicatePolicy {
    fn is_duplicate(self, a: &Procedure, b: &Procedure) -> bool {
        if a.tariff_code != b.tariff_code {
            return false;
        }
        match self {
            DuplicatePolicy::SameTariffCode => true,
            DuplicatePolicy::SequenceWindow { window } => {
                let gap = (i64::from(a.sequence_number) - i64::from(b.sequence_number)).unsigned_abs();
                gap <= u64::from(window)
            }
        }
    }
}

/// Unordered duplicate pairs for one guide. Each pair is stored once as
/// `(min_id, max_id)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DuplicateIndex {
    pairs: BTreeSet<(Uuid, Uuid)>,
    partners: BTreeMap<Uuid, BTreeSet<Uuid>>,
}

impl DuplicateIndex {
    pub fn build(procedures: &[Procedure], policy: DuplicatePolicy) -> Self {
        let mut by_code: BTreeMap<&str, Vec<&Procedure>> = BTreeMap::new();
        for p in procedures {
            by_code.entry(p.tariff_code.as_str()).or_default().push(p);
        }

        let mut index = DuplicateIndex::default();
        for group in by_code.values() {
            for (i, a) in group.iter().enumerate() {
                for b in &group[i + 1..] {
                    if a.procedure_id != b.procedure_id && policy.is_duplicate(a, b) {
                        index.insert(a.procedure_id, b.procedure_id);
                    }
                }
            }
        }
        index
    }

    fn insert(&mut self, a: Uuid, b: Uuid) {
        let key = if a < b { (a, b) } else { (b, a) };
        if self.pairs.insert(key) {
            self.partners.entry(a).or_default().insert(b);
            self.partners.entry(b).or_default().insert(a);
        }
    }

    pub fn pairs(&self) -> impl Iterator<Item = &(Uuid, Uuid)> {
        self.pairs.iter()
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    /// Sorted duplicate partners of `procedure_id`; empty when none.
    pub fn partners_of(&self, procedure_id: Uuid) -> Vec<Uuid> {
        self.partners
            .get(&procedure_id)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }
}
