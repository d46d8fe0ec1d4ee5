use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::info;

use crewplate_core::CoreError;
use crewplate_core::blob::{BlobStore, content_type_for, validate_key};
use crewplate_types::api::{BlobUploadResponse, Claims};

use crate::auth::AppState;
use crate::error::ApiError;

/// PUT /uploads/{*key}: raw image bytes. Users may only write under their
/// own id, e.g. `{user_id}/{millis}.jpg`.
pub async fn upload(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Extension(claims): Extension<Claims>,
    bytes: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    validate_key(&key)?;
    if !key.starts_with(&format!("{}/", claims.sub)) {
        return Err(CoreError::Forbidden("uploads must be under your own user id").into());
    }
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("empty upload".into()));
    }

    let stored = state.blobs.write(&key, &bytes).await?;
    info!("User {} uploaded {} ({} bytes)", claims.sub, key, stored.size);

    Ok((
        StatusCode::CREATED,
        Json(BlobUploadResponse {
            image_ref: state.blobs.durable_ref(&key),
            key,
            size: stored.size,
            sha256: stored.sha256,
        }),
    ))
}

/// GET /blobs/{*key}: public, so stored references work as plain image URLs.
pub async fn download(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let data = state
        .blobs
        .read(&key)
        .await?
        .ok_or(CoreError::NotFound("blob"))?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&key)),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        data,
    ))
}
