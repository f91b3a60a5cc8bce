//! Stowage Core Library
//!
//! Upload policy (`UploadOptions`), the upload data model, violation accounting and
//! the error type shared by the storage and api crates.

pub mod config;
pub mod error;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use config::{ServiceConfig, UploadOptions};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    DeclaredFile, FieldFiles, FileDescriptor, FormEntry, FormFields, FormValue, OneOrMany,
    PreUploadManifest, UploadedFiles,
};
pub use validation::{ValidationReport, Violation};
