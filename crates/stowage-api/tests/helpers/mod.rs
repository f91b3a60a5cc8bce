//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p stowage-api --test uploads_test`.

#![allow(dead_code)]

use axum::Router;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stowage_api::setup::routes;
use stowage_api::state::{AppState, UploadState};
use stowage_core::{ServiceConfig, UploadOptions};
use tempfile::TempDir;

/// API path prefix for tests (e.g. `/api/v0`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", routes::API_PREFIX, path)
}

/// Test application: server, state, and the directory everything lives in.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn upload_root(&self) -> PathBuf {
        self.state.upload.options.path.clone()
    }

    pub fn decode_dir(&self) -> &Path {
        self.state.upload.storage.decode_dir()
    }

    pub fn scratch_dir(&self) -> &Path {
        self.state.upload.storage.scratch_dir()
    }
}

/// Overlay `options` with directories inside `dir`.
pub fn isolated_options(dir: &Path, options: UploadOptions) -> UploadOptions {
    UploadOptions {
        path: dir.join("uploads"),
        use_current_dir: false,
        scratch_dir: dir.join("temp_uploads"),
        decode_dir: dir.join("decode"),
        ..options
    }
}

/// Setup the full service router with isolated storage.
pub async fn setup_test_app(options: UploadOptions) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let config = ServiceConfig {
        upload: isolated_options(temp_dir.path(), options),
        ..Default::default()
    };

    let state = Arc::new(AppState::init(config).await.expect("init state"));
    let router = routes::setup_routes(state.clone());
    let server = TestServer::new(router).expect("start test server");

    TestApp {
        server,
        state,
        _temp_dir: temp_dir,
    }
}

/// Upload state alone, for tests that mount the middleware on their own routes.
pub async fn setup_upload_state(options: UploadOptions) -> (Arc<UploadState>, TempDir) {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let state = UploadState::init(isolated_options(temp_dir.path(), options))
        .await
        .expect("init upload state");
    (Arc::new(state), temp_dir)
}

pub fn server_for(router: Router) -> TestServer {
    TestServer::new(router).expect("start test server")
}

/// A file part with a fixed byte pattern.
pub fn file_part(filename: &str, size: usize) -> Part {
    Part::bytes(file_bytes(size))
        .file_name(filename.to_string())
        .mime_type("application/octet-stream")
}

pub fn file_bytes(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

pub fn form() -> MultipartForm {
    MultipartForm::new()
}

/// Every regular file below `dir`, recursively.
pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return files;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            files.extend(files_under(&path));
        } else {
            files.push(path);
        }
    }
    files
}
