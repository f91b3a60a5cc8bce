//! Storage abstraction trait
//!
//! This module defines the Storage trait the upload middleware stages files through.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Promotion failed: {0}")]
    PromotionFailed(String),

    #[error("Move failed: {0}")]
    MoveFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid file name: {0}")]
    InvalidFilename(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Location of a promoted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Upload id, forward-slash separated.
    pub id: String,
    /// Percent-encoded web path: `{path}/{id}/{filename}`.
    pub url: String,
    /// Filesystem path of the file.
    pub uri: PathBuf,
}

/// Storage abstraction trait
///
/// The upload middleware only talks to this trait, so tests and alternative
/// layouts can swap the backend without touching request handling.
///
/// Moves must be all-or-nothing: on failure the source stays where it was and no
/// partial destination is left behind.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Move a scratch file into permanent storage under a fresh upload id.
    ///
    /// `filename` is the client supplied name; only its last component is used.
    async fn promote(&self, scratch: &Path, filename: &str) -> StorageResult<StoredFile>;

    /// Move a scratch file into the holding lane and return its new location.
    async fn hold(&self, scratch: &Path) -> StorageResult<PathBuf>;

    /// Read a whole file into memory.
    async fn read(&self, path: &Path) -> StorageResult<Bytes>;

    /// Best-effort removal of scratch files. Failures are logged, not returned.
    ///
    /// Returns the number of files actually removed.
    async fn discard(&self, paths: &[PathBuf]) -> usize;

    /// Best-effort removal of promoted files along with the upload-id directories
    /// created for them. Directories still holding other uploads are kept.
    ///
    /// Returns the number of files actually removed.
    async fn revoke(&self, uris: &[PathBuf]) -> usize;

    /// Directory the multipart decoder writes file parts into.
    fn decode_dir(&self) -> &Path;

    /// Holding lane for files that are not promoted.
    fn scratch_dir(&self) -> &Path;
}
