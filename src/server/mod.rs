//! HTTP API for the dashboard.
//!
//! Routes mirror the dashboard frontend contract:
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | GET | `/health` | `{status}` |
//! | GET | `/api/dashboard/stats` | `{currentScore, weeklyAverage, weeklyChange}` |
//! | GET | `/api/dashboard/today` | `{data: [{time, good, poor, score}]}` |
//! | GET | `/api/dashboard/week` | `{data: [{day, score, sessions}]}` |
//! | GET | `/api/dashboard/month` | `{data: [{date, score, sessions}]}` |
//! | GET | `/api/logs?limit=&startDate=&endDate=` | `{data: [log]}` |
//! | POST | `/api/logs` | `201` with the created log |
//!
//! Failures are rendered as `{"error": "..."}`.

mod handlers;

use crate::services::{AggregationService, ManualLogService};
use crate::{Error, Result};
use axum::Router;
use axum::routing::get;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use handlers::{ApiError, LogsParams};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Dashboard queries.
    pub aggregation: Arc<AggregationService>,
    /// Manual log creation.
    pub manual_logs: Arc<ManualLogService>,
}

impl AppState {
    /// Bundles the services behind `Arc`s.
    #[must_use]
    pub fn new(aggregation: AggregationService, manual_logs: ManualLogService) -> Self {
        Self {
            aggregation: Arc::new(aggregation),
            manual_logs: Arc::new(manual_logs),
        }
    }
}

/// Builds the router with CORS and request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/dashboard/stats", get(handlers::stats))
        .route("/api/dashboard/today", get(handlers::today))
        .route("/api/dashboard/week", get(handlers::week))
        .route("/api/dashboard/month", get(handlers::month))
        .route(
            "/api/logs",
            get(handlers::list_logs).post(handlers::create_log),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds `addr` and serves until `shutdown` resolves.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the address cannot be bound or the
/// server fails.
pub async fn serve<F>(addr: &str, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::operation("bind", format!("{addr}: {e}")))?;
    let local = listener
        .local_addr()
        .map_err(|e| Error::operation("bind", e))?;
    tracing::info!(addr = %local, "Starting dashboard HTTP server");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::operation("serve", e))?;

    tracing::info!("Dashboard HTTP server stopped");
    Ok(())
}
