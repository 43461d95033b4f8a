//! Liveness and storage readiness

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use tracing::warn;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" when the database answers, "degraded" otherwise
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub database: &'static str,
}

/// GET /health
///
/// Runs a trivial query so a closed or unreachable database reports 503.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database_ok = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => true,
        Err(e) => {
            warn!("Health check: database unavailable: {}", e);
            false
        }
    };

    let (status, label, database) = if database_ok {
        (StatusCode::OK, "ok", "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded", "unavailable")
    };

    (
        status,
        Json(HealthResponse {
            status: label,
            module: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            database,
        }),
    )
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
