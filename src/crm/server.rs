use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use super::api::{self, AppState, SharedState};
use super::auth::SessionStore;
use super::context::ContextRegistry;
use super::db::{CrmDb, DbHandle};
use super::repository::{CrmStore, SqliteStore};
use super::ws;

/// Configuration for the CRM server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub db_path: std::path::PathBuf,
    pub dev_mode: bool,
    pub toast_ttl: Duration,
    pub sweep_interval: Duration,
    pub monthly_goal: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3141,
            host: "127.0.0.1".to_string(),
            db_path: std::path::PathBuf::from(".fera/crm.db"),
            dev_mode: false,
            toast_ttl: super::toast::DEFAULT_TOAST_TTL,
            sweep_interval: Duration::from_millis(500),
            monthly_goal: fera_common::metrics::DEFAULT_MONTHLY_GOAL,
        }
    }
}

/// Wire the store, session layer and context registry into shared state.
pub fn build_state(db: CrmDb, config: &ServerConfig) -> SharedState {
    let store: Arc<dyn CrmStore> = Arc::new(SqliteStore::new(DbHandle::new(db)));
    let (ws_tx, _rx) = broadcast::channel(256);
    Arc::new(AppState {
        auth: Arc::new(SessionStore::new(store.clone())),
        contexts: Arc::new(ContextRegistry::new(store, config.toast_ttl)),
        ws_tx,
        monthly_goal: config.monthly_goal,
    })
}

/// Build the full application router with API and WebSocket routes.
pub fn build_router(state: SharedState) -> Router {
    api::api_router()
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

/// Periodically drop expired toasts across every cached context.
async fn sweep_toasts(contexts: Arc<ContextRegistry>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        let removed = contexts.sweep_toasts().await;
        if removed > 0 {
            debug!(removed, "Expired toasts swept");
        }
    }
}

/// Start the CRM server.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    // Ensure parent directory exists for DB
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let db = CrmDb::new(&config.db_path).context("Failed to initialize CRM database")?;
    let state = build_state(db, &config);

    let listener_task = tokio::spawn(
        state
            .contexts
            .clone()
            .follow_sessions(state.auth.subscribe()),
    );
    let sweeper_task = tokio::spawn(sweep_toasts(
        state.contexts.clone(),
        config.sweep_interval.max(Duration::from_millis(10)),
    ));

    let mut app = build_router(state);
    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if config.dev_mode {
        "0.0.0.0"
    } else {
        config.host.as_str()
    };
    let addr = format!("{}:{}", host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, db = %config.db_path.display(), "FERA CRM listening");
    println!("FERA CRM running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper_task.abort();
    listener_task.abort();
    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
