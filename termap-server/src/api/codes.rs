//! Code description lookup

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use termap_common::db::codes;
use tracing::debug;

use crate::{ApiError, ApiResult, AppState};

/// Query parameters for GET /codes
#[derive(Debug, Deserialize)]
pub struct CodeQuery {
    pub terminology: String,
    pub year: i64,
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CodeResponse {
    pub code: String,
    pub description: String,
}

/// GET /codes?terminology=&year=&code=
///
/// Exact match on all three parameters. When the key was uploaded more than
/// once, any one of the stored descriptions is returned.
pub async fn get_code(
    State(state): State<AppState>,
    query: Result<Query<CodeQuery>, QueryRejection>,
) -> ApiResult<Json<CodeResponse>> {
    let Query(query) = query?;

    let description =
        codes::find_code_description(&state.db, &query.terminology, query.year, &query.code)
            .await?;

    match description {
        Some(description) => Ok(Json(CodeResponse {
            code: query.code,
            description,
        })),
        None => {
            debug!(
                "Code miss: {} {} {}",
                query.terminology, query.year, query.code
            );
            Err(ApiError::NotFound("Code not found".to_string()))
        }
    }
}
