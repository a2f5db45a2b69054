//! Thai ID card extraction endpoint
//!
//! - POST /ocr/thai-id - Extract card fields from an uploaded photo
//! - POST /ocr/thai-id/ - Same, trailing slash
//! - POST /upload - Same, gateway route

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use uuid::Uuid;

use crate::entity::EntityMap;
use crate::error::{AppError, Result};
use crate::pipeline::artifact_key;
use crate::state::AppState;
use crate::upload::StagedUpload;

/// Create the extraction router
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/ocr/thai-id", post(extract_thai_id))
        .route("/ocr/thai-id/", post(extract_thai_id))
        .route("/upload", post(extract_thai_id))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

/// Extract the fields of the ID card in the uploaded image
#[tracing::instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
async fn extract_thai_id(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<EntityMap>> {
    let pipeline = state.ready_pipeline().await?;
    let mut multipart = multipart.map_err(|e| {
        tracing::warn!("Rejected upload body: {}", e);
        AppError::BadRequest(e.body_text())
    })?;

    let (file_name, data) = read_file_field(&mut multipart).await?;
    tracing::info!("Received '{}' ({} bytes)", file_name, data.len());

    // The staged directory lives until the end of this handler
    let staged = StagedUpload::stage(&data, &file_name, state.upload_config()).await?;
    let image = staged.decode(state.upload_config()).await?;

    let key = artifact_key(&file_name);
    let entities = pipeline.process(&image, &key).await?;

    tracing::info!("Extracted {} fields from '{}'", entities.len(), file_name);
    Ok(Json(entities))
}

/// Pull the `file` part out of a multipart body
async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Bytes)> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to read multipart field: {}", e);
        AppError::BadRequest(format!("Failed to read upload: {}", e.body_text()))
    })? {
        let name = field.name().unwrap_or("").to_string();
        tracing::debug!(
            "Received field: name='{}', filename={:?}, content_type={:?}",
            name,
            field.file_name(),
            field.content_type()
        );

        if name != "file" {
            continue;
        }

        let file_name = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "upload".to_string());

        let data = field.bytes().await.map_err(|e| {
            tracing::error!("Failed to read file data: {}", e);
            AppError::BadRequest(format!("Failed to read file data: {}", e.body_text()))
        })?;

        return Ok((file_name, data));
    }

    Err(AppError::BadRequest(
        "No file provided. Use field name 'file'".to_string(),
    ))
}
