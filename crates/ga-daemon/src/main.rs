//! ga-daemon entry point.
//!
//! Sets up tracing, loads config and reference data, builds the shared
//! state, wires middleware and starts the HTTP server. Route handlers live
//! in `routes.rs`; shared state types live in `state.rs`.

use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use ga_audit::{AuditSink, JsonlAuditSink};
use ga_config::{
    load_contracts, load_layered_yaml, report_unused_keys, resolve_database_url, EngineConfig,
    UnusedKeyPolicy,
};
use ga_daemon::{routes, state};
use ga_schemas::ContractBook;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

const ENV_CONFIG_PATHS: &str = "GA_CONFIG_PATHS";
const DEFAULT_CONFIG_PATH: &str = "config/base.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Dev convenience; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cfg = load_engine_config()?;
    let refs = cfg.load_reference_tables()?;
    let contracts = load_contract_book(&cfg).await?;
    info!(
        contracts = contracts.contracts().len(),
        as_of = %contracts.as_of(),
        "contract book loaded"
    );

    let mirror: Option<Arc<dyn AuditSink>> = match &cfg.audit_jsonl_path {
        Some(path) => {
            info!(path = %path.display(), hash_chain = cfg.audit_hash_chain, "audit mirror enabled");
            Some(Arc::new(JsonlAuditSink::open(path, cfg.audit_hash_chain)?))
        }
        None => None,
    };

    let shared = Arc::new(state::AppState::with_mirror(
        contracts,
        refs,
        cfg.reconcile_settings(),
        mirror,
    ));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr: SocketAddr = cfg
        .bind_addr
        .parse()
        .with_context(|| format!("CONFIG_INVALID /daemon/bind_addr='{}'", cfg.bind_addr))?;
    info!("ga-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Layered config from `GA_CONFIG_PATHS` (comma separated). Without the
/// variable, `config/base.yaml` is used if present, else all defaults.
fn load_engine_config() -> anyhow::Result<EngineConfig> {
    let paths: Vec<String> = match std::env::var(ENV_CONFIG_PATHS) {
        Ok(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => vec![DEFAULT_CONFIG_PATH.to_string()],
        Err(_) => {
            warn!("no config file found; using defaults");
            return Ok(EngineConfig::default());
        }
    };

    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&refs)?;
    info!(config_hash = %loaded.config_hash, files = paths.len(), "config loaded");

    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        warn!(unused = ?report.unused_leaf_pointers, "CONFIG_UNUSED_KEYS");
    }

    EngineConfig::from_config_json(&loaded.config_json)
}

/// Contracts from the database when its URL is set, otherwise from the
/// configured YAML file, otherwise none. The book follows the current date.
async fn load_contract_book(cfg: &EngineConfig) -> anyhow::Result<ContractBook> {
    let book = load_contracts_once(cfg).await?;
    Ok(book.tracking_today())
}

async fn load_contracts_once(cfg: &EngineConfig) -> anyhow::Result<ContractBook> {
    let as_of = chrono::Utc::now().date_naive();

    let db = resolve_database_url(cfg);
    if let Some(url) = db.url.as_deref() {
        let pool = ga_db::connect(url).await?;
        ga_db::migrate(&pool).await?;
        return ga_db::load_contract_book(&pool, as_of).await;
    }

    match &cfg.contracts_path {
        Some(path) => Ok(ContractBook::new(as_of, load_contracts(path)?)),
        None => {
            warn!(env_var = %db.env_var, "no database and no contracts file; every code is uncontracted");
            Ok(ContractBook::new(as_of, Vec::new()))
        }
    }
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
