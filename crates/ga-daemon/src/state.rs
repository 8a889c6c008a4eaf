//! Shared runtime state for ga-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. Procedures live in an
//! in-memory store; every committed decision is broadcast on the bus and,
//! when configured, mirrored to the JSONL audit file.

use std::sync::Arc;
use std::time::Duration;

use ga_audit::AuditSink;
use ga_decision::{DecisionEngine, MemoryProcedureStore};
use ga_reconcile::{ReconcileSettings, ReferenceTables};
use ga_schemas::{AuditLogEntry, ContractBook};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    /// One committed transition.
    Decision(AuditLogEntry),
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// BusAuditSink
// ---------------------------------------------------------------------------

/// Publishes committed entries on the bus, then forwards them to the
/// optional file mirror. A send with no subscribers is not an error.
pub struct BusAuditSink {
    bus: broadcast::Sender<BusMsg>,
    mirror: Option<Arc<dyn AuditSink>>,
}

impl BusAuditSink {
    pub fn new(bus: broadcast::Sender<BusMsg>, mirror: Option<Arc<dyn AuditSink>>) -> Self {
        Self { bus, mirror }
    }
}

impl AuditSink for BusAuditSink {
    fn record(&self, entry: &AuditLogEntry) -> anyhow::Result<()> {
        let _ = self.bus.send(BusMsg::Decision(entry.clone()));
        match &self.mirror {
            Some(m) => m.record(entry),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub store: Arc<MemoryProcedureStore>,
    pub contracts: Arc<ContractBook>,
    pub refs: Arc<ReferenceTables>,
    pub settings: ReconcileSettings,
    pub engine: DecisionEngine,
}

impl AppState {
    pub fn new(contracts: ContractBook, refs: ReferenceTables, settings: ReconcileSettings) -> Self {
        Self::with_mirror(contracts, refs, settings, None)
    }

    pub fn with_mirror(
        contracts: ContractBook,
        refs: ReferenceTables,
        settings: ReconcileSettings,
        mirror: Option<Arc<dyn AuditSink>>,
    ) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        let store = Arc::new(MemoryProcedureStore::new());
        let contracts = Arc::new(contracts);

        let engine = DecisionEngine::new(store.clone(), contracts.clone())
            .with_value_tolerance(settings.value_tolerance)
            .with_audit_sink(Arc::new(BusAuditSink::new(bus.clone(), mirror)));

        Self {
            bus,
            build: BuildInfo {
                service: "ga-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            store,
            contracts,
            refs: Arc::new(refs),
            settings,
            engine,
        }
    }
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
