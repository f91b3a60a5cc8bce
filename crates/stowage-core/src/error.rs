//! Error types module
//!
//! All failures of the upload engine are unified under [`AppError`]. Each variant
//! describes how it should be presented over HTTP through [`ErrorMetadata`]; the
//! mapping to an actual response lives in the api crate.

use std::io;

use crate::validation::ValidationReport;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like resource limits
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "UPLOAD_REJECTED")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing or invalid content type, boundary, multipart body or manifest.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Declared content length over the aggregate cap, raised before decoding.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// One or more policy violations, accumulated over the whole request.
    #[error("Upload rejected: {0}")]
    UploadRejected(ValidationReport),

    /// Directory creation, move or read failure while staging files.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Storage(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::MalformedRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<ValidationReport> for AppError {
    fn from(report: ValidationReport) -> Self {
        AppError::UploadRejected(report)
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::MalformedRequest(_) => (
            400,
            "MALFORMED_REQUEST",
            false,
            Some("Send a multipart/form-data body with a boundary"),
            false,
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Reduce the total upload size"),
            false,
            LogLevel::Debug,
        ),
        AppError::UploadRejected(report) if report.only_size_violations() => (
            413,
            "UPLOAD_TOO_LARGE",
            false,
            Some("Reduce file sizes and upload again"),
            false,
            LogLevel::Debug,
        ),
        AppError::UploadRejected(_) => (
            422,
            "UPLOAD_REJECTED",
            false,
            Some("Fix every listed problem and upload again"),
            false,
            LogLevel::Debug,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::MalformedRequest(_) => "MalformedRequest",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::UploadRejected(_) => "UploadRejected",
            AppError::Storage(_) => "Storage",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::MalformedRequest(ref msg) => msg.clone(),
            AppError::PayloadTooLarge(ref msg) => msg.clone(),
            AppError::UploadRejected(report) => report.message(),
            AppError::Storage(_) => "Failed to store uploaded files".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Violation;

    fn report(violations: Vec<Violation>) -> ValidationReport {
        let mut report = ValidationReport::new();
        for violation in violations {
            report.push(violation);
        }
        report
    }

    #[test]
    fn test_error_metadata_size_only_rejection() {
        let err = AppError::from(report(vec![Violation::FileTooLarge {
            filename: "a.txt".to_string(),
            size: 1500,
            max: 1000,
        }]));
        assert_eq!(err.http_status_code(), 413);
        assert_eq!(err.error_code(), "UPLOAD_TOO_LARGE");
        assert!(!err.is_recoverable());
        assert!(err.client_message().contains("a.txt"));
        assert!(!err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_error_metadata_mixed_rejection() {
        let err = AppError::from(report(vec![
            Violation::FileTooLarge {
                filename: "a.txt".to_string(),
                size: 1500,
                max: 1000,
            },
            Violation::ExtensionNotAllowed {
                extension: "exe".to_string(),
                filename: "b.exe".to_string(),
                allowed: vec!["txt".to_string()],
            },
        ]));
        assert_eq!(err.http_status_code(), 422);
        assert_eq!(err.error_code(), "UPLOAD_REJECTED");
        let message = err.client_message();
        assert!(message.contains("a.txt"));
        assert!(message.contains("b.exe"));
    }

    #[test]
    fn test_error_metadata_storage_is_hidden() {
        let err = AppError::from(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "STORAGE_ERROR");
        assert!(err.is_recoverable());
        assert!(err.is_sensitive());
        assert_eq!(err.client_message(), "Failed to store uploaded files");
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_error_metadata_malformed() {
        let err = AppError::MalformedRequest("missing boundary".to_string());
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.error_type(), "MalformedRequest");
        assert_eq!(err.client_message(), "missing boundary");
    }

    #[test]
    fn test_detailed_message_includes_source_chain() {
        let err = AppError::from(anyhow::anyhow!("inner").context("outer"));
        let details = err.detailed_message();
        assert!(details.contains("Internal error with source"));
        assert!(details.contains("Caused by"));
    }
}
