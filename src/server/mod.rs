//! HTTP server module
//!
//! Axum server exposing the metrics route of the configured resource kind.

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{routing::get, Router};
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::metrics::MetricRegistry;
use crate::session::SessionManager;
use crate::stats::StatsCollector;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Session owner for the configured endpoint
    pub sessions: Arc<SessionManager>,
    /// Collector for the active resource kind
    pub collector: Arc<StatsCollector>,
}

impl AppState {
    /// Resolve the counter catalog and build the registry
    ///
    /// A catalog that cannot be resolved is logged once and kept as an error,
    /// so the process still starts and its metrics route answers 503.
    pub async fn from_config(config: Config) -> Result<Self> {
        let sessions = SessionManager::new(config.connection()?);
        Self::with_sessions(config, sessions).await
    }

    /// Same as [`AppState::from_config`] with an explicit session manager
    pub async fn with_sessions(config: Config, sessions: SessionManager) -> Result<Self> {
        let kind = config.resource_kind()?;
        let sessions = Arc::new(sessions);

        let catalog = Catalog::resolve(kind, &sessions).await;
        let mut registry = MetricRegistry::new();
        match &catalog {
            Ok(catalog) => {
                registry.register_catalog(catalog);
                info!(
                    kind = %kind,
                    counters = registry.len(),
                    discovered = catalog.is_discovered(),
                    "Registered metrics"
                );
            }
            Err(e) => error!(kind = %kind, error = %e, "Counter catalog unavailable"),
        }

        let collector =
            StatsCollector::new(kind, Arc::clone(&sessions), Arc::new(registry), catalog);

        Ok(Self {
            config: Arc::new(config),
            sessions,
            collector: Arc::new(collector),
        })
    }
}

/// Build the router for an application state
pub fn router(state: AppState) -> Router {
    let metrics_route = state.collector.kind().route();

    Router::new()
        .route("/", get(handlers::root))
        .route("/version", get(handlers::version))
        .route(&metrics_route, get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server
///
/// # Errors
/// Returns an error if the configuration is incomplete or the listener fails
pub async fn run(config: Config) -> Result<()> {
    let addr = SocketAddr::from((config.bind_ip()?, config.server.port));

    let state = AppState::from_config(config).await?;
    let sessions = Arc::clone(&state.sessions);
    let kind = state.collector.kind();
    let app = router(state);

    info!(address = %addr, metrics_path = %kind.route_display(), "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sessions.teardown().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
