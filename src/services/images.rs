//! Website images for the marketing pages.
//!
//! Uploads land in the `website-images` bucket under one folder per page.
//! The image a page shows is a URL kept in the settings table under
//! `active_{folder}_image`.

use axum::http::StatusCode;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::error::ErrorCode;
use crate::state::AppState;
use crate::storage::{StorageError, WEBSITE_IMAGES_BUCKET, public_url};
use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFolder {
    Home,
    About,
}

impl ImageFolder {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::About => "about",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "home" => Some(Self::Home),
            "about" => Some(Self::About),
            _ => None,
        }
    }

    #[must_use]
    pub fn setting_key(self) -> String {
        format!("active_{}_image", self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("unknown image folder: {0}")]
    UnknownFolder(String),
    #[error("upload is empty")]
    Empty,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for ImageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownFolder(_) => "E_UNKNOWN_FOLDER",
            Self::Empty => "E_VALIDATION",
            Self::Storage(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::UnknownFolder(_) => StatusCode::NOT_FOUND,
            Self::Empty => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Storage(e) => e.status(),
            Self::Store(e) => e.status(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.retryable())
    }
}

/// Lowercased extension of `file_name`, `bin` when it has none.
fn extension(file_name: &str) -> String {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map_or_else(|| "bin".to_owned(), str::to_ascii_lowercase)
}

/// Store `bytes` as `{folder}/{unix_millis}.{ext}` and return its public URL.
///
/// # Errors
///
/// `Empty` for a zero-byte upload, storage failures otherwise.
pub async fn upload(state: &AppState, folder: ImageFolder, file_name: &str, bytes: Vec<u8>) -> Result<String, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let path = format!("{}/{millis}.{}", folder.as_str(), extension(file_name));
    let size = bytes.len();
    state.storage.put(WEBSITE_IMAGES_BUCKET, &path, bytes).await?;
    info!(%path, size, "website image uploaded");
    Ok(public_url(&state.config.public_base_url, WEBSITE_IMAGES_BUCKET, &path))
}

/// Public URLs of every image in `folder`, oldest first.
///
/// # Errors
///
/// Storage failures.
pub async fn list(state: &AppState, folder: ImageFolder) -> Result<Vec<String>, ImageError> {
    let names = state.storage.list(WEBSITE_IMAGES_BUCKET, folder.as_str()).await?;
    Ok(names
        .iter()
        .map(|name| {
            public_url(
                &state.config.public_base_url,
                WEBSITE_IMAGES_BUCKET,
                &format!("{}/{name}", folder.as_str()),
            )
        })
        .collect())
}

/// # Errors
///
/// Store failures.
pub async fn set_active(state: &AppState, folder: ImageFolder, url: &str) -> Result<(), ImageError> {
    state.repos.settings.set_setting(&folder.setting_key(), url).await?;
    info!(folder = folder.as_str(), %url, "active website image set");
    Ok(())
}

/// The page's current image. A failed read is logged and reported as unset.
pub async fn get_active(state: &AppState, folder: ImageFolder) -> Option<String> {
    match state.repos.settings.setting(&folder.setting_key()).await {
        Ok(url) => url,
        Err(e) => {
            warn!(folder = folder.as_str(), error = %e, "active image lookup failed");
            None
        }
    }
}

#[cfg(test)]
#[path = "images_test.rs"]
mod tests;
