//! Object storage for uploaded files, addressed as `bucket/path`.
//!
//! DESIGN
//! ======
//! `ObjectStorage` is the seam; `LocalDiskStorage` writes under a root
//! directory (one subdirectory per bucket) and `MemoryStorage` keeps bytes
//! in a map for development and tests. Keys are validated before touching
//! either backend so a key can never escape its bucket.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use axum::http::StatusCode;
use tokio::sync::RwLock;

use crate::error::ErrorCode;

pub const WEBSITE_IMAGES_BUCKET: &str = "website-images";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidKey(_) => "E_INVALID_KEY",
            Self::Io(_) => "E_STORAGE_IO",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidKey(_) => StatusCode::BAD_REQUEST,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[async_trait::async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, bucket: &str, path: &str, bytes: Vec<u8>) -> Result<(), StorageError>;

    async fn get(&self, bucket: &str, path: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Object names directly under `folder`, sorted ascending.
    async fn list(&self, bucket: &str, folder: &str) -> Result<Vec<String>, StorageError>;
}

/// Public URL for an object served by `routes::storage`.
#[must_use]
pub fn public_url(base_url: &str, bucket: &str, path: &str) -> String {
    format!("{}/storage/{bucket}/{path}", base_url.trim_end_matches('/'))
}

/// Reject empty, absolute, dotted or backslashed segments.
///
/// # Errors
///
/// Returns `StorageError::InvalidKey` when any segment is unsafe.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.split('/').any(|seg| {
            seg.is_empty() || seg == "." || seg == ".." || seg.contains('\\') || seg.contains('\0')
        });
    if bad { Err(StorageError::InvalidKey(key.to_owned())) } else { Ok(()) }
}

// =============================================================================
// LOCAL DISK
// =============================================================================

pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, bucket: &str, path: &str) -> Result<PathBuf, StorageError> {
        validate_key(bucket)?;
        validate_key(path)?;
        Ok(self.root.join(bucket).join(Path::new(path)))
    }
}

#[async_trait::async_trait]
impl ObjectStorage for LocalDiskStorage {
    async fn put(&self, bucket: &str, path: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let target = self.resolve(bucket, path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        Ok(())
    }

    async fn get(&self, bucket: &str, path: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let target = self.resolve(bucket, path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, bucket: &str, folder: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.resolve(bucket, folder)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

// =============================================================================
// MEMORY
// =============================================================================

#[derive(Default)]
pub struct MemoryStorage {
    objects: RwLock<BTreeMap<(String, String), Vec<u8>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put(&self, bucket: &str, path: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        validate_key(bucket)?;
        validate_key(path)?;
        self.objects
            .write()
            .await
            .insert((bucket.to_owned(), path.to_owned()), bytes);
        Ok(())
    }

    async fn get(&self, bucket: &str, path: &str) -> Result<Option<Vec<u8>>, StorageError> {
        validate_key(bucket)?;
        validate_key(path)?;
        Ok(self
            .objects
            .read()
            .await
            .get(&(bucket.to_owned(), path.to_owned()))
            .cloned())
    }

    async fn list(&self, bucket: &str, folder: &str) -> Result<Vec<String>, StorageError> {
        validate_key(bucket)?;
        validate_key(folder)?;
        let prefix = format!("{folder}/");
        Ok(self
            .objects
            .read()
            .await
            .keys()
            .filter(|(b, _)| b == bucket)
            .filter_map(|(_, path)| path.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(str::to_owned)
            .collect())
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
