//! Read-only public access to the `website-images` bucket.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::storage::WEBSITE_IMAGES_BUCKET;
use crate::state::AppState;

/// `GET /storage/website-images/{*path}`
pub async fn website_image(State(state): State<AppState>, Path(path): Path<String>) -> Result<Response, ApiError> {
    let bytes = state
        .storage
        .get(WEBSITE_IMAGES_BUCKET, &path)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("no object at {path}")))?;
    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    Ok(([(header::CONTENT_TYPE, mime.to_string())], bytes).into_response())
}
