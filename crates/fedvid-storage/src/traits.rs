//! File store abstraction
//!
//! Names are always relative to the storage root; backends reject anything
//! that could escape it.

use async_trait::async_trait;
use thiserror::Error;

use fedvid_core::AppError;

/// File store operation errors
#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("rename failed: {0}")]
    RenameFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type FileStoreResult<T> = Result<T, FileStoreError>;

impl From<FileStoreError> for AppError {
    fn from(err: FileStoreError) -> Self {
        AppError::Filesystem(err.to_string())
    }
}

/// File store abstraction
///
/// The mutation pipeline needs exactly this much from the filesystem: put
/// a staged file in place under its canonical name, undo that placement
/// when an attempt is rolled back, and drop files for deleted videos.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Write a staged upload. Used by the upload layer and by tests; the
    /// pipeline itself only ever receives a name that already exists.
    async fn write(&self, name: &str, data: &[u8]) -> FileStoreResult<()>;

    /// Rename `from` to `to` in place, within the storage root.
    async fn rename(&self, from: &str, to: &str) -> FileStoreResult<()>;

    async fn remove(&self, name: &str) -> FileStoreResult<()>;

    async fn exists(&self, name: &str) -> FileStoreResult<bool>;
}
