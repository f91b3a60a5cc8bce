//! Stowage API Library
//!
//! Axum middlewares that validate and stage multipart uploads, plus the glue to run
//! them as a standalone service.
//!
//! ```ignore
//! let state = Arc::new(UploadState::init(UploadOptions {
//!     extensions: vec!["png".into(), "jpg".into()],
//!     max_file_size_bytes: Some(5 * 1024 * 1024),
//!     ..Default::default()
//! }).await?);
//!
//! let app = Router::new()
//!     .route("/avatar", post(handler))
//!     .layer(axum::middleware::from_fn_with_state(state, upload_files));
//! ```

pub mod decoder;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod setup;
pub mod stager;
pub mod state;
pub mod telemetry;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use middleware::{pre_upload_validate, upload_files};
pub use state::{AppState, PreUploadState, UploadState};
