//! Crosswalk mapping endpoints
//!
//! POST records one source -> target assertion; GET resolves a source code
//! to a target code for a target year.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use termap_common::db::{mappings, NewMapping};
use tracing::debug;

use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

/// POST /mapping
///
/// Body fields are validated by deserialization before storage is touched;
/// `responsible` defaults to "Dummy".
pub async fn create_mapping(
    State(state): State<AppState>,
    payload: Result<Json<NewMapping>, JsonRejection>,
) -> ApiResult<Json<StatusResponse>> {
    let Json(mapping) = payload?;

    mappings::record_mapping(&state.db, &mapping, state.duplicate_mappings).await?;

    Ok(Json(StatusResponse {
        status: "ok".to_string(),
    }))
}

/// Query parameters for GET /mapping
#[derive(Debug, Deserialize)]
pub struct MappingQuery {
    pub source_terminology: String,
    pub source_year: i64,
    pub source_code: String,
    pub target_year: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TargetCodeResponse {
    pub target_code: String,
}

/// GET /mapping?source_terminology=&source_year=&source_code=&target_year=
///
/// The caller cannot choose a target terminology; see
/// [`mappings::find_target_code`].
pub async fn get_mapping(
    State(state): State<AppState>,
    query: Result<Query<MappingQuery>, QueryRejection>,
) -> ApiResult<Json<TargetCodeResponse>> {
    let Query(query) = query?;

    let target = mappings::find_target_code(
        &state.db,
        &query.source_terminology,
        query.source_year,
        &query.source_code,
        query.target_year,
    )
    .await?;

    match target {
        Some(target_code) => Ok(Json(TargetCodeResponse { target_code })),
        None => {
            debug!(
                "Mapping miss: {} {} {} -> {}",
                query.source_terminology, query.source_year, query.source_code, query.target_year
            );
            Err(ApiError::NotFound("Mapping not found".to_string()))
        }
    }
}
