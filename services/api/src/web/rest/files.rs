//! services/api/src/web/rest/files.rs
//!
//! Uploads and generated speech. Stored files are served back statically under the
//! public files base.

use axum::{
    body::Body,
    extract::{Multipart, State},
    http::Request,
    response::{IntoResponse, Response},
};
use conversa_core::domain::StoredFile;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::info;
use utoipa::ToSchema;

use crate::web::response::{ApiResponse, AppJson, AppPath, HttpError, HttpResult};
use crate::web::state::AppState;

const DEFAULT_EXTENSION: &str = "bin";

#[derive(Debug, Serialize, ToSchema)]
pub struct StoredFileResponse {
    pub name: String,
    pub url: String,
}

impl From<StoredFile> for StoredFileResponse {
    fn from(f: StoredFile) -> Self {
        Self {
            name: f.name,
            url: f.url,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SpeechRequest {
    pub text: String,
}

/// The extension of an uploaded file name, if it has one.
fn extension_of(file_name: Option<&str>) -> &str {
    file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
        .unwrap_or(DEFAULT_EXTENSION)
}

/// Upload a file (for example recorded learner audio).
///
/// Accepts a multipart/form-data request; the first part is stored.
#[utoipa::path(
    post,
    path = "/files",
    tag = "files",
    request_body(content_type = "multipart/form-data", description = "The file to upload."),
    responses(
        (status = 201, description = "File stored", body = StoredFileResponse),
        (status = 400, description = "Bad request (e.g., missing file)")
    ),
    security(("bearer" = []))
)]
pub async fn upload_file_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> HttpResult<StoredFileResponse> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| HttpError::BadRequest(format!("Failed to read multipart data: {}", e)))?
        .ok_or_else(|| HttpError::BadRequest("Multipart form must include a file".to_string()))?;

    let extension = extension_of(field.file_name()).to_string();
    let data = field
        .bytes()
        .await
        .map_err(|e| HttpError::BadRequest(format!("Failed to read file bytes: {}", e)))?;
    if data.is_empty() {
        return Err(HttpError::BadRequest("Uploaded file is empty".to_string()));
    }

    let stored = state.files.save(&data, &extension).await?;
    Ok(ApiResponse::created("File stored", stored.into()))
}

/// Synthesize speech for a text and store it as an mp3.
#[utoipa::path(
    post,
    path = "/files/speech",
    tag = "files",
    request_body = SpeechRequest,
    responses(
        (status = 201, description = "Speech stored", body = StoredFileResponse),
        (status = 400, description = "Invalid request")
    ),
    security(("bearer" = []))
)]
pub async fn speech_handler(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<SpeechRequest>,
) -> HttpResult<StoredFileResponse> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(HttpError::BadRequest("text is required".to_string()));
    }

    let audio = state.tts.generate_audio(text).await?;
    let stored = state.files.save(&audio, "mp3").await?;
    info!(file = %stored.name, chars = text.len(), "Speech generated");
    Ok(ApiResponse::created("Speech generated", stored.into()))
}

/// Only names this service could have generated are served.
fn is_stored_name(name: &str) -> bool {
    !name.starts_with('.')
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

/// Download a stored file.
#[utoipa::path(
    get,
    path = "/files/{name}",
    tag = "files",
    params(("name" = String, Path, description = "Stored file name")),
    responses(
        (status = 200, description = "File contents"),
        (status = 404, description = "Not found")
    )
)]
pub async fn download_file_handler(
    State(state): State<Arc<AppState>>,
    AppPath(name): AppPath<String>,
) -> Result<Response, HttpError> {
    if !is_stored_name(&name) {
        return Err(HttpError::NotFound(format!("File {} not found", name)));
    }
    let req = Request::builder()
        .uri(format!("/{}", name))
        .body(Body::empty())
        .map_err(|e| HttpError::Internal(e.to_string()))?;

    let response = ServeDir::new(&state.config.file_storage_path)
        .oneshot(req)
        .await
        .map_err(|e| HttpError::Internal(e.to_string()))?;
    Ok(response.into_response())
}
