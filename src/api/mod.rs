//! REST API server for meetline.
//!
//! Provides HTTP endpoints for:
//! - Service info and health
//! - Meeting listings with status reconciliation
//! - Meeting creation, invitations and cancellation

pub mod auth;
pub mod error;
pub mod routes;

use crate::utils::circuit_breaker::get_all_circuit_breaker_stats;
use crate::utils::logging;
use crate::AppState;
use anyhow::{Context, Result};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Json, Response},
    routing::get,
    Router,
};
use log::info;
use serde_json::{json, Value};
use std::time::Instant;
use tower::ServiceBuilder;

pub use auth::{AuthSettings, CurrentUser};
pub use error::{ApiError, ApiResult};

pub struct ApiServer {
    bind_addr: String,
    state: AppState,
}

impl ApiServer {
    pub fn new(bind_addr: &str, state: AppState) -> Self {
        Self {
            bind_addr: bind_addr.to_string(),
            state,
        }
    }

    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/", get(service_info))
            .route("/health", get(health))
            .nest("/api/meetings", routes::meetings::router())
            .layer(ServiceBuilder::new().layer(middleware::from_fn(log_requests)))
            .with_state(state)
    }

    /// Serves until the state's shutdown token is cancelled.
    pub async fn start(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.bind_addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.bind_addr))?;

        info!("API server listening on http://{}", self.bind_addr);
        info!("Endpoints:");
        info!("  GET  /                         - Service info");
        info!("  GET  /health                   - Health check");
        info!("  GET  /api/meetings             - List all meetings");
        info!("  POST /api/meetings             - Create a meeting");
        info!("  GET  /api/meetings/upcoming    - Upcoming meetings");
        info!("  GET  /api/meetings/previous    - Previous meetings");
        info!("  POST /api/meetings/:id/participants - Invite a participant");
        info!("  POST /api/meetings/:id/cancel  - Cancel a meeting");

        let shutdown = self.state.shutdown.clone();
        axum::serve(listener, Self::router(self.state))
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                info!("Shutdown signal received, draining API server");
            })
            .await
            .context("API server failed")?;

        info!("API server stopped gracefully");
        Ok(())
    }
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;
    logging::log_http_request(
        method.as_str(),
        &path,
        response.status().as_u16(),
        started.elapsed().as_millis() as u64,
    );
    response
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "service": "meetline",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let database = sqlx::query("SELECT 1").execute(&state.db.pool).await.is_ok();

    let breakers: serde_json::Map<String, Value> = get_all_circuit_breaker_stats()
        .await
        .into_iter()
        .map(|(name, stats)| {
            (
                name,
                json!({
                    "state": format!("{:?}", stats.state),
                    "failures": stats.failure_count,
                }),
            )
        })
        .collect();

    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if database { "ok" } else { "degraded" },
            "database": database,
            "callProvider": state.meetings.has_provider(),
            "circuitBreakers": breakers,
        })),
    )
}
