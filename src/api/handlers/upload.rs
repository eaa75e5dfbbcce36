use crate::AppState;
use crate::api::error::{AppError, ErrorResponse};
use crate::services::relay::RelayOutcome;
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

pub const UPLOAD_SUCCESS_MESSAGE: &str = "File uploaded successfully";

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    #[serde(rename = "tinyURL")]
    pub tiny_url: String,
}

/// Multipart form accepted by `POST /upload`.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data", description = "File to relay"),
    responses(
        (status = 200, description = "File uploaded successfully", body = UploadResponse),
        (status = 400, description = "No file in the request", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Staging, storage or shortener failure", body = ErrorResponse)
    ),
    tag = "upload"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let multipart = multipart
        .map_err(|e| AppError::BadRequest(format!("No file is received: {}", e.body_text())))?;

    let limit = state.config.request_timeout;
    let outcome = tokio::time::timeout(limit, stage_and_relay(&state, multipart))
        .await
        .map_err(|_| AppError::UpstreamTimeout(format!("Request timed out after {:?}", limit)))??;

    info!(
        "✅ Relayed {} ({})",
        outcome.target.object_name,
        if outcome.shortened { "short link" } else { "long URL fallback" }
    );

    Ok(Json(UploadResponse {
        message: UPLOAD_SUCCESS_MESSAGE.to_string(),
        tiny_url: outcome.link,
    }))
}

/// Dropping this future mid-way still removes the staged file through `StagedFile`'s `Drop`.
async fn stage_and_relay(state: &AppState, multipart: Multipart) -> Result<RelayOutcome, AppError> {
    // 1. Stage
    let mut staged = state.staging.stage_multipart(multipart).await?;

    // 2. Upload, sign, shorten
    let outcome = state.relay.relay(&staged).await;

    // 3. Cleanup on every path
    match staged.remove().await {
        Ok(true) => tracing::debug!("Removed staged file {}", staged.path().display()),
        Ok(false) => {}
        Err(e) => tracing::warn!(
            "Failed to remove staged file {}: {}",
            staged.path().display(),
            e
        ),
    }

    outcome
}
