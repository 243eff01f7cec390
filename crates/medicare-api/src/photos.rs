use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use tracing::{info, warn};

use medicare_db::models::PhotoRow;
use medicare_types::api::{Claims, PhotoUploadResponse};

use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::{MAX_PHOTO_SIZE, extension_for, is_valid_name};

/// Store a proof photo sent as the raw request body. The returned URL is
/// what the client passes along when marking a dose taken.
pub async fn upload_photo(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let ext = extension_for(&content_type).ok_or(ApiError::UnsupportedMediaType)?;

    if body.is_empty() {
        return Err(ApiError::BadRequest("Photo is empty.".into()));
    }
    if body.len() > MAX_PHOTO_SIZE {
        return Err(ApiError::PayloadTooLarge);
    }

    let stored = state.storage.save(&body, ext).await?;

    let row = PhotoRow {
        file_name: stored.file_name.clone(),
        uploader_id: claims.sub.to_string(),
        content_type,
        size: stored.size as i64,
        sha256: stored.sha256.clone(),
        created_at: String::new(),
    };
    state.with_db(move |db| db.insert_photo(&row)).await?;

    info!("{} uploaded photo {} ({} bytes)", claims.email, stored.file_name, stored.size);

    Ok((
        StatusCode::CREATED,
        Json(PhotoUploadResponse {
            url: state.photo_url(&stored.file_name),
            file_name: stored.file_name,
            size: stored.size,
            sha256: stored.sha256,
        }),
    ))
}

/// Public: photo URLs are embedded directly in `<img>` tags.
pub async fn get_photo(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !is_valid_name(&file_name) {
        return Err(ApiError::NotFound("Photo not found."));
    }

    let name = file_name.clone();
    let photo = state
        .with_db(move |db| db.get_photo(&name))
        .await?
        .ok_or(ApiError::NotFound("Photo not found."))?;

    let data = match state.storage.read(&file_name).await {
        Ok(data) => data,
        Err(e) => {
            warn!("Photo {} is in the database but unreadable: {}", file_name, e);
            return Err(ApiError::NotFound("Photo not found."));
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, photo.content_type),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable".to_string()),
        ],
        data,
    ))
}
