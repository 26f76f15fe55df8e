//! Read-only operations surface.
//!
//! Liveness at `GET /health`, the provider/breaker/cache snapshot at
//! `GET /providers`, and `POST /breakers/reset` for forcing breakers
//! closed after an upstream incident resolves.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::error::{Result, TallyError};

use super::sports_data::SportsDataService;

/// Liveness payload
#[derive(Debug, Clone, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
}

/// Shared state for the health routes
pub struct HealthState {
    pub started_at: DateTime<Utc>,
    pub sports: Arc<SportsDataService>,
}

/// Build the health router. Split out from serving so tests can drive
/// the routes directly.
pub fn router(state: Arc<HealthState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/providers", get(providers_handler))
        .route("/breakers/reset", post(reset_breakers_handler))
        .with_state(state)
        .layer(cors)
}

/// Health check server
pub struct HealthServer {
    state: Arc<HealthState>,
    port: u16,
}

impl HealthServer {
    pub fn new(sports: Arc<SportsDataService>, port: u16) -> Self {
        Self {
            state: Arc::new(HealthState {
                started_at: Utc::now(),
                sports,
            }),
            port,
        }
    }

    /// Bind and serve until the process exits
    pub async fn run(&self) -> Result<()> {
        let app = router(Arc::clone(&self.state));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting health server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .await
            .map_err(|e| TallyError::Internal(format!("Health server error: {}", e)))?;

        Ok(())
    }
}

async fn health_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let uptime = (Utc::now() - state.started_at).num_seconds().max(0) as u64;
    Json(LivenessResponse {
        status: "ok",
        timestamp: Utc::now(),
        uptime_seconds: uptime,
    })
}

async fn providers_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    Json(state.sports.health().await)
}

async fn reset_breakers_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    state.sports.reset_breakers().await;
    info!("Circuit breakers reset by operator request");
    (StatusCode::OK, Json(serde_json::json!({ "status": "reset" })))
}
