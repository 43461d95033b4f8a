//! Code list upload
//!
//! Multipart form: `terminology` (text), `year` (integer), `file` (the
//! headerless `code;description` list).

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use termap_common::ingest;
use tracing::warn;

use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub rows: u64,
}

/// Form fields collected from the multipart stream
#[derive(Debug, Default)]
struct UploadForm {
    terminology: Option<String>,
    year: Option<String>,
    file: Option<Bytes>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("terminology") => form.terminology = Some(field.text().await?),
                Some("year") => form.year = Some(field.text().await?),
                Some("file") => form.file = Some(field.bytes().await?),
                Some(other) => warn!("Ignoring unexpected upload field '{}'", other),
                None => warn!("Ignoring unnamed upload field"),
            }
        }

        Ok(form)
    }

    /// Check presence and types of every field
    fn validate(self) -> ApiResult<(String, i64, Bytes)> {
        let terminology = self
            .terminology
            .ok_or_else(|| missing_field("terminology"))?;
        let year_raw = self.year.ok_or_else(|| missing_field("year"))?;
        let year = year_raw.trim().parse::<i64>().map_err(|_| {
            ApiError::Unprocessable(format!("Field 'year' must be an integer, got '{}'", year_raw))
        })?;
        let file = self.file.ok_or_else(|| missing_field("file"))?;

        Ok((terminology, year, file))
    }
}

fn missing_field(name: &str) -> ApiError {
    ApiError::Unprocessable(format!("Missing form field '{}'", name))
}

/// POST /upload
///
/// Parses the whole file before writing; any malformed line rejects the
/// upload and nothing is stored.
pub async fn upload_code_list(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse>> {
    let form = UploadForm::read(multipart?).await?;
    let (terminology, year, file) = form.validate()?;

    let rows =
        ingest::ingest_code_list(&state.db, &terminology, year, &file, state.duplicate_codes)
            .await?;

    Ok(Json(UploadResponse { rows }))
}
