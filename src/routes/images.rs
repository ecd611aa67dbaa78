//! Website image routes. Reads are public; uploads and the active-image
//! switch need a signed-in caller. Uploads send the raw file as the body
//! with the original name in `?file_name=`.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use super::auth::AuthUser;
use crate::error::ApiError;
use crate::services::images::{self, ImageError, ImageFolder};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub file_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActiveImage {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveBody {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct Uploaded {
    pub url: String,
}

fn folder(raw: &str) -> Result<ImageFolder, ImageError> {
    ImageFolder::parse(raw).ok_or_else(|| ImageError::UnknownFolder(raw.to_owned()))
}

/// `GET /api/images/{folder}`
pub async fn list(State(state): State<AppState>, Path(raw): Path<String>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(images::list(&state, folder(&raw)?).await?))
}

/// `POST /api/images/{folder}?file_name=…`
pub async fn upload(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(raw): Path<String>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<Uploaded>), ApiError> {
    let url = images::upload(&state, folder(&raw)?, &query.file_name, body.to_vec()).await?;
    Ok((StatusCode::CREATED, Json(Uploaded { url })))
}

/// `GET /api/images/{folder}/active`
pub async fn get_active(State(state): State<AppState>, Path(raw): Path<String>) -> Result<Json<ActiveImage>, ApiError> {
    let url = images::get_active(&state, folder(&raw)?).await;
    Ok(Json(ActiveImage { url }))
}

/// `PUT /api/images/{folder}/active`
pub async fn set_active(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(raw): Path<String>,
    Json(body): Json<SetActiveBody>,
) -> Result<Json<ActiveImage>, ApiError> {
    images::set_active(&state, folder(&raw)?, &body.url).await?;
    Ok(Json(ActiveImage { url: Some(body.url) }))
}
