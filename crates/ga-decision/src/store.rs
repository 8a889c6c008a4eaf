//! Persistence boundary for procedures and their audit trail.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use ga_schemas::{AuditLogEntry, NewAuditLogEntry, Procedure, ProcedureStatus};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{GuideInsertError, StoreError};
use crate::transition::ProcedureUpdate;

/// Source of truth for procedure status and the audit log.
///
/// `commit` is compare-and-set: the update and its audit entry are written
/// together only if the procedure is still in `expected`; otherwise nothing
/// is written and `Conflict` reports the status actually found.
#[async_trait]
pub trait ProcedureStore: Send + Sync {
    async fn load(&self, procedure_id: Uuid) -> Result<Procedure, StoreError>;

    /// Procedures of a guide ordered by sequence number.
    async fn list_guide(&self, guide_id: Uuid) -> Result<Vec<Procedure>, StoreError>;

    async fn commit(
        &self,
        procedure_id: Uuid,
        expected: ProcedureStatus,
        update: ProcedureUpdate,
        entry: NewAuditLogEntry,
    ) -> Result<AuditLogEntry, StoreError>;

    /// Entries for one procedure, oldest first.
    async fn audit_log(&self, procedure_id: Uuid) -> Result<Vec<AuditLogEntry>, StoreError>;
}

#[derive(Default)]
struct MemoryInner {
    procedures: BTreeMap<Uuid, Procedure>,
    log: Vec<AuditLogEntry>,
}

/// In-process store used by the daemon and tests.
#[derive(Default)]
pub struct MemoryProcedureStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryProcedureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_procedures(procedures: impl IntoIterator<Item = Procedure>) -> Self {
        let inner = MemoryInner {
            procedures: procedures
                .into_iter()
                .map(|p| (p.procedure_id, p))
                .collect(),
            log: Vec::new(),
        };
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Loads a new guide. Existing procedures are never replaced: the guide
    /// id and every procedure id must be unknown, checked and written under
    /// one write lock.
    pub async fn insert_guide(&self, procedures: Vec<Procedure>) -> Result<(), GuideInsertError> {
        let mut g = self.inner.write().await;

        let guide_ids: BTreeSet<Uuid> = procedures.iter().map(|p| p.guide_id).collect();
        if let Some(loaded) = g.procedures.values().find(|p| guide_ids.contains(&p.guide_id)) {
            return Err(GuideInsertError::GuideLoaded {
                guide_id: loaded.guide_id,
            });
        }
        if let Some(existing) = procedures
            .iter()
            .find_map(|p| g.procedures.get(&p.procedure_id))
        {
            return Err(GuideInsertError::ProcedureExists {
                procedure_id: existing.procedure_id,
                guide_id: existing.guide_id,
                status: existing.status,
            });
        }

        for p in procedures {
            g.procedures.insert(p.procedure_id, p);
        }
        Ok(())
    }

    pub async fn all_entries(&self) -> Vec<AuditLogEntry> {
        self.inner.read().await.log.clone()
    }
}

#[async_trait]
impl ProcedureStore for MemoryProcedureStore {
    async fn load(&self, procedure_id: Uuid) -> Result<Procedure, StoreError> {
        self.inner
            .read()
            .await
            .procedures
            .get(&procedure_id)
            .cloned()
            .ok_or(StoreError::NotFound { procedure_id })
    }

    async fn list_guide(&self, guide_id: Uuid) -> Result<Vec<Procedure>, StoreError> {
        let g = self.inner.read().await;
        let mut out: Vec<Procedure> = g
            .procedures
            .values()
            .filter(|p| p.guide_id == guide_id)
            .cloned()
            .collect();
        out.sort_by_key(|p| (p.sequence_number, p.procedure_id));
        Ok(out)
    }

    async fn commit(
        &self,
        procedure_id: Uuid,
        expected: ProcedureStatus,
        update: ProcedureUpdate,
        entry: NewAuditLogEntry,
    ) -> Result<AuditLogEntry, StoreError> {
        let mut g = self.inner.write().await;
        let next_id = g.log.len() as i64 + 1;

        let p = g
            .procedures
            .get_mut(&procedure_id)
            .ok_or(StoreError::NotFound { procedure_id })?;
        if p.status != expected {
            return Err(StoreError::Conflict {
                procedure_id,
                actual: p.status,
            });
        }
        update.apply_to(p);

        let committed = entry.with_id(next_id);
        g.log.push(committed.clone());
        Ok(committed)
    }

    async fn audit_log(&self, procedure_id: Uuid) -> Result<Vec<AuditLogEntry>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .log
            .iter()
            .filter(|e| e.procedure_id == procedure_id)
            .cloned()
            .collect())
    }
}
