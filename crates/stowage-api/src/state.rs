//! Shared middleware state

use std::sync::Arc;

use stowage_core::{ServiceConfig, UploadOptions};
use stowage_storage::{LocalStorage, Storage, StorageResult};

/// State of one `upload_files` middleware instance.
///
/// Options are fixed at construction; every request reads them through the `Arc`.
#[derive(Clone)]
pub struct UploadState {
    pub options: Arc<UploadOptions>,
    pub storage: Arc<dyn Storage>,
}

impl UploadState {
    /// Build the state on local storage. Directories are created before this returns.
    pub async fn init(options: UploadOptions) -> StorageResult<Self> {
        let storage = LocalStorage::new(&options).await?;
        Ok(Self::with_storage(options, Arc::new(storage)))
    }

    pub fn with_storage(options: UploadOptions, storage: Arc<dyn Storage>) -> Self {
        Self {
            options: Arc::new(options),
            storage,
        }
    }
}

/// State of one `pre_upload_validate` middleware instance.
#[derive(Clone)]
pub struct PreUploadState {
    pub options: Arc<UploadOptions>,
    /// Largest manifest body accepted, in bytes.
    pub max_manifest_bytes: usize,
}

/// Everything the router needs.
#[derive(Clone)]
pub struct AppState {
    pub config: ServiceConfig,
    pub upload: Arc<UploadState>,
    pub pre_upload: Arc<PreUploadState>,
}

impl AppState {
    pub async fn init(config: ServiceConfig) -> StorageResult<Self> {
        let upload = UploadState::init(config.upload.clone()).await?;
        let pre_upload = PreUploadState {
            options: upload.options.clone(),
            max_manifest_bytes: config.max_manifest_bytes,
        };

        Ok(Self {
            config,
            upload: Arc::new(upload),
            pre_upload: Arc::new(pre_upload),
        })
    }
}
