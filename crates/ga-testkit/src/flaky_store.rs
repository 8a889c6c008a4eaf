use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ga_decision::{MemoryProcedureStore, ProcedureStore, ProcedureUpdate, StoreError};
use ga_schemas::{AuditLogEntry, NewAuditLogEntry, Procedure, ProcedureStatus};
use uuid::Uuid;

/// Memory store whose `commit` fails with `Transient` for chosen
/// procedure ids. Reads always succeed, so callers can re-sync.
pub struct FlakyStore {
    inner: MemoryProcedureStore,
    failing: BTreeSet<Uuid>,
    rejected_commits: AtomicUsize,
}

impl FlakyStore {
    pub fn new(procedures: Vec<Procedure>, failing: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            inner: MemoryProcedureStore::with_procedures(procedures),
            failing: failing.into_iter().collect(),
            rejected_commits: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &MemoryProcedureStore {
        &self.inner
    }

    /// Commits refused so far.
    pub fn rejected_commits(&self) -> usize {
        self.rejected_commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcedureStore for FlakyStore {
    async fn load(&self, procedure_id: Uuid) -> Result<Procedure, StoreError> {
        self.inner.load(procedure_id).await
    }

    async fn list_guide(&self, guide_id: Uuid) -> Result<Vec<Procedure>, StoreError> {
        self.inner.list_guide(guide_id).await
    }

    async fn commit(
        &self,
        procedure_id: Uuid,
        expected: ProcedureStatus,
        update: ProcedureUpdate,
        entry: NewAuditLogEntry,
    ) -> Result<AuditLogEntry, StoreError> {
        if self.failing.contains(&procedure_id) {
            self.rejected_commits.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Transient(format!(
                "injected timeout for {procedure_id}"
            )));
        }
        self.inner.commit(procedure_id, expected, update, entry).await
    }

    async fn audit_log(&self, procedure_id: Uuid) -> Result<Vec<AuditLogEntry>, StoreError> {
        self.inner.audit_log(procedure_id).await
    }
}
