//! Route handlers
//!
//! Thin on purpose: by the time a handler runs, the middlewares have already
//! validated and placed every file.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use serde::Serialize;
use stowage_core::{FormFields, UploadedFiles};
use tokio::fs;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub files: UploadedFiles,
    pub fields: FormFields,
}

/// Echo the staged upload back to the client.
pub async fn receive_uploads(
    Extension(files): Extension<UploadedFiles>,
    Extension(fields): Extension<FormFields>,
) -> impl IntoResponse {
    tracing::debug!(
        file_fields = files.len(),
        files = files.files().count(),
        "Returning staged upload"
    );
    (StatusCode::CREATED, Json(UploadResponse { files, fields }))
}

/// Manifest already validated by the middleware.
pub async fn manifest_accepted() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub storage: String,
}

/// Healthy when both working directories are still present.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let storage = &state.upload.storage;
    let mut healthy = true;
    for dir in [storage.scratch_dir(), storage.decode_dir()] {
        match fs::metadata(dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) | Err(_) => {
                tracing::warn!(dir = %dir.display(), "Storage directory missing");
                healthy = false;
            }
        }
    }

    let (status_code, status, storage) = if healthy {
        (StatusCode::OK, "healthy", "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "degraded")
    };

    (
        status_code,
        Json(HealthCheckResponse {
            status: status.to_string(),
            storage: storage.to_string(),
        }),
    )
}
