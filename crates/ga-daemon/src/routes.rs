//! Axum router and all HTTP handlers for ga-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use ga_decision::{
    approve_guide, bulk_apply, DecisionError, ProcedureStore, StoreError, ValidationError,
};
use ga_export::{export_guide, ExportError, JsonExportSerializer};
use ga_reconcile::reconcile_guide;
use ga_schemas::{normalize_guide, AuditLogEntry, Procedure, RawGuide};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    api_types::{
        ActorRequest, AuditLogResponse, BulkRequest, DecisionResponse, ErrorResponse,
        GuidePendenciesResponse, GuideProceduresResponse, GuideReconcileResponse, HealthResponse,
        IngestResponse, RejectRequest,
    },
    state::{AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/stream", get(stream))
        .route("/v1/guides", post(ingest_guide))
        .route("/v1/guides/:guide_id/procedures", get(guide_procedures))
        .route("/v1/guides/:guide_id/reconcile", get(guide_reconcile))
        .route("/v1/guides/:guide_id/pendencies", get(guide_pendencies))
        .route("/v1/guides/:guide_id/approve-all", post(guide_approve_all))
        .route("/v1/guides/:guide_id/export", get(guide_export))
        .route("/v1/procedures/:procedure_id/approve", post(procedure_approve))
        .route("/v1/procedures/:procedure_id/reject", post(procedure_reject))
        .route("/v1/procedures/:procedure_id/reset", post(procedure_reset))
        .route("/v1/procedures/:procedure_id/audit-log", get(procedure_audit_log))
        .route("/v1/bulk", post(bulk))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn error_response(
    status: StatusCode,
    kind: &str,
    error: String,
    procedure: Option<Procedure>,
) -> Response {
    (
        status,
        Json(ErrorResponse {
            error,
            kind: kind.to_string(),
            procedure,
        }),
    )
        .into_response()
}

fn decision_error(e: &DecisionError, procedure: Option<Procedure>) -> Response {
    let (status, kind) = match e {
        DecisionError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
        DecisionError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
        DecisionError::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
        DecisionError::Transient(_) => (StatusCode::SERVICE_UNAVAILABLE, "transient"),
    };
    error_response(status, kind, e.to_string(), procedure)
}

fn validation_error(e: &ValidationError) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "validation",
        e.to_string(),
        None,
    )
}

fn store_error(e: &StoreError) -> Response {
    let (status, kind) = match e {
        StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
        StoreError::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
        StoreError::Transient(_) => (StatusCode::SERVICE_UNAVAILABLE, "transient"),
    };
    error_response(status, kind, e.to_string(), None)
}

/// Procedures of a known guide, or a 404 response.
async fn load_guide(st: &AppState, guide_id: Uuid) -> Result<Vec<Procedure>, Response> {
    let procs = st
        .store
        .list_guide(guide_id)
        .await
        .map_err(|e| store_error(&e))?;
    if procs.is_empty() {
        return Err(error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("guide {guide_id} not found"),
            None,
        ));
    }
    Ok(procs)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// Guides
// ---------------------------------------------------------------------------

pub(crate) async fn ingest_guide(
    State(st): State<Arc<AppState>>,
    Json(raw): Json<RawGuide>,
) -> Response {
    let procs = match normalize_guide(&raw) {
        Ok(p) => p,
        Err(e) => {
            warn!(guide_id = %raw.guide_id, error = %e, "guide ingest refused");
            return error_response(StatusCode::UNPROCESSABLE_ENTITY, "ingest", e.to_string(), None);
        }
    };
    let Some(guide_id) = procs.first().map(|p| p.guide_id) else {
        return error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "ingest",
            "guide has no procedures".to_string(),
            None,
        );
    };

    let count = procs.len();
    if let Err(e) = st.store.insert_guide(procs).await {
        warn!(guide_id = %guide_id, error = %e, "guide ingest refused");
        return error_response(StatusCode::CONFLICT, "conflict", e.to_string(), None);
    }
    info!(guide_id = %guide_id, procedures = count, "guide loaded");

    (
        StatusCode::CREATED,
        Json(IngestResponse {
            guide_id,
            procedures: count,
        }),
    )
        .into_response()
}

pub(crate) async fn guide_procedures(
    State(st): State<Arc<AppState>>,
    Path(guide_id): Path<Uuid>,
) -> Response {
    match load_guide(&st, guide_id).await {
        Ok(procedures) => (
            StatusCode::OK,
            Json(GuideProceduresResponse {
                guide_id,
                procedures,
            }),
        )
            .into_response(),
        Err(resp) => resp,
    }
}

pub(crate) async fn guide_reconcile(
    State(st): State<Arc<AppState>>,
    Path(guide_id): Path<Uuid>,
) -> Response {
    let procs = match load_guide(&st, guide_id).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let report = reconcile_guide(&procs, st.contracts.as_ref(), &st.refs, &st.settings);
    (
        StatusCode::OK,
        Json(GuideReconcileResponse {
            guide_id,
            procedures: report.procedures,
            pendencies: report.pendencies,
        }),
    )
        .into_response()
}

pub(crate) async fn guide_pendencies(
    State(st): State<Arc<AppState>>,
    Path(guide_id): Path<Uuid>,
) -> Response {
    let procs = match load_guide(&st, guide_id).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let report = reconcile_guide(&procs, st.contracts.as_ref(), &st.refs, &st.settings);
    (
        StatusCode::OK,
        Json(GuidePendenciesResponse {
            guide_id,
            pendencies: report.pendencies,
        }),
    )
        .into_response()
}

pub(crate) async fn guide_approve_all(
    State(st): State<Arc<AppState>>,
    Path(guide_id): Path<Uuid>,
    Json(req): Json<ActorRequest>,
) -> Response {
    if let Err(resp) = load_guide(&st, guide_id).await {
        return resp;
    }
    match approve_guide(&st.engine, guide_id, &req.actor).await {
        Ok(approval) => (StatusCode::OK, Json(approval)).into_response(),
        Err(e) => decision_error(&e, None),
    }
}

/// 200 with the export body, or 409 with the gate refusal.
pub(crate) async fn guide_export(
    State(st): State<Arc<AppState>>,
    Path(guide_id): Path<Uuid>,
) -> Response {
    let procs = match load_guide(&st, guide_id).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match export_guide(guide_id, &procs, &JsonExportSerializer) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            body,
        )
            .into_response(),
        Err(ExportError::Blocked(refusal)) => (StatusCode::CONFLICT, Json(refusal)).into_response(),
        Err(ExportError::Serializer(e)) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "serializer",
            e.to_string(),
            None,
        ),
    }
}

// ---------------------------------------------------------------------------
// Single-procedure decisions
// ---------------------------------------------------------------------------

/// Success carries the committed entry and the re-read procedure; failure
/// carries the re-read procedure when it exists.
async fn decision_response(
    st: &AppState,
    procedure_id: Uuid,
    res: Result<AuditLogEntry, DecisionError>,
) -> Response {
    match res {
        Ok(entry) => match st.engine.refresh(procedure_id).await {
            Ok(procedure) => (StatusCode::OK, Json(DecisionResponse { entry, procedure })).into_response(),
            Err(e) => decision_error(&e, None),
        },
        Err(e) => {
            let current = st.engine.refresh(procedure_id).await.ok();
            decision_error(&e, current)
        }
    }
}

pub(crate) async fn procedure_approve(
    State(st): State<Arc<AppState>>,
    Path(procedure_id): Path<Uuid>,
    Json(req): Json<ActorRequest>,
) -> Response {
    let res = st.engine.approve(procedure_id, &req.actor).await;
    decision_response(&st, procedure_id, res).await
}

pub(crate) async fn procedure_reject(
    State(st): State<Arc<AppState>>,
    Path(procedure_id): Path<Uuid>,
    Json(req): Json<RejectRequest>,
) -> Response {
    let res = st
        .engine
        .reject(procedure_id, &req.category, &req.reason, &req.actor)
        .await;
    decision_response(&st, procedure_id, res).await
}

pub(crate) async fn procedure_reset(
    State(st): State<Arc<AppState>>,
    Path(procedure_id): Path<Uuid>,
    Json(req): Json<ActorRequest>,
) -> Response {
    let res = st.engine.reset(procedure_id, &req.actor).await;
    decision_response(&st, procedure_id, res).await
}

pub(crate) async fn procedure_audit_log(
    State(st): State<Arc<AppState>>,
    Path(procedure_id): Path<Uuid>,
) -> Response {
    if let Err(e) = st.store.load(procedure_id).await {
        return store_error(&e);
    }
    match st.store.audit_log(procedure_id).await {
        Ok(entries) => (
            StatusCode::OK,
            Json(AuditLogResponse {
                procedure_id,
                entries,
            }),
        )
            .into_response(),
        Err(e) => store_error(&e),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/bulk
// ---------------------------------------------------------------------------

pub(crate) async fn bulk(State(st): State<Arc<AppState>>, Json(req): Json<BulkRequest>) -> Response {
    match bulk_apply(&st.engine, &req.decision, &req.procedure_ids, &req.actor).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => validation_error(&e),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Decision(_) => "decision",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
