//! termap-server library - HTTP surface for code lists and crosswalk mappings
//!
//! Exposes the router and state so integration tests can drive the service
//! without binding a socket.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use sqlx::SqlitePool;
use termap_common::DuplicatePolicy;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;

pub use crate::error::{ApiError, ApiResult};

/// Largest accepted `/upload` request body. Full terminology releases run to
/// tens of megabytes, well past axum's 2 MB default.
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool, constructed once at startup
    pub db: SqlitePool,
    /// Policy for uploads repeating an existing (terminology, year, code)
    pub duplicate_codes: DuplicatePolicy,
    /// Policy for mappings repeating an existing source+target tuple
    pub duplicate_mappings: DuplicatePolicy,
}

impl AppState {
    /// Create new application state with duplicates allowed everywhere
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            duplicate_codes: DuplicatePolicy::Allow,
            duplicate_mappings: DuplicatePolicy::Allow,
        }
    }

    pub fn with_policies(mut self, codes: DuplicatePolicy, mappings: DuplicatePolicy) -> Self {
        self.duplicate_codes = codes;
        self.duplicate_mappings = mappings;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/", get(api::serve_index))
        .route(
            "/upload",
            post(api::upload_code_list).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/mapping", post(api::create_mapping).get(api::get_mapping))
        .route("/codes", get(api::get_code))
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
