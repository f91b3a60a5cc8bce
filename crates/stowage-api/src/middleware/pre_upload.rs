//! Pre-transfer manifest validation
//!
//! Clients may announce their files as `{"value": {"<field>": {"name", "size"} | [...]}}`
//! before sending any bytes. The same policy as the upload middleware applies, judged
//! on declared metadata only.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use http_body_util::LengthLimitError;
use stowage_core::{AppError, PreUploadManifest, UploadOptions, ValidationReport};

use crate::error::HttpAppError;
use crate::state::PreUploadState;

/// Every violation of a manifest, per-file checks first, aggregate last.
pub fn validate_manifest(
    options: &UploadOptions,
    manifest: &PreUploadManifest,
) -> ValidationReport {
    let mut report = ValidationReport::new();
    for file in manifest.files() {
        report.check_file(options, &file.name, file.size);
    }
    report.check_total(options, manifest.total_size());
    report
}

fn exceeds_length_limit(err: &axum::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = std::error::Error::source(e);
    }
    false
}

/// Pre-upload validation middleware
///
/// On success the next stage receives the request with the manifest body untouched.
#[tracing::instrument(skip_all)]
pub async fn pre_upload_validate(
    State(state): State<Arc<PreUploadState>>,
    request: Request,
    next: Next,
) -> Result<Response, HttpAppError> {
    let (parts, body) = request.into_parts();

    let bytes = axum::body::to_bytes(body, state.max_manifest_bytes)
        .await
        .map_err(|e| {
            if exceeds_length_limit(&e) {
                AppError::PayloadTooLarge(format!(
                    "Upload manifest exceeds {} bytes",
                    state.max_manifest_bytes
                ))
            } else {
                AppError::MalformedRequest(format!("Failed to read upload manifest: {}", e))
            }
        })?;

    let manifest: PreUploadManifest = serde_json::from_slice(&bytes)
        .map_err(|e| AppError::MalformedRequest(format!("Invalid upload manifest: {}", e)))?;

    validate_manifest(&state.options, &manifest)
        .into_result()
        .map_err(AppError::from)?;

    tracing::debug!(
        files = manifest.files().count(),
        total_bytes = manifest.total_size(),
        "Upload manifest accepted"
    );

    Ok(next
        .run(Request::from_parts(parts, Body::from(bytes)))
        .await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(json: &str) -> PreUploadManifest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_sizes_of_every_descriptor_are_summed() {
        let options = UploadOptions {
            max_size_bytes: Some(100),
            ..Default::default()
        };
        let report = validate_manifest(
            &options,
            &manifest(
                r#"{"value": {"a": {"name": "a.txt", "size": 60},
                              "b": [{"name": "b.txt", "size": 30}, {"name": "c.txt", "size": 30}]}}"#,
            ),
        );

        assert_eq!(
            report.message(),
            "Maximum total upload size exceeded, size: 120 bytes, maximum: 100 bytes. "
        );
    }

    #[tokio::test]
    async fn test_length_limit_is_told_apart() {
        let err = axum::body::to_bytes(Body::from("0123456789"), 4)
            .await
            .unwrap_err();
        assert!(exceeds_length_limit(&err));

        let other = axum::Error::new(std::io::Error::other("reset"));
        assert!(!exceeds_length_limit(&other));
    }

    #[test]
    fn test_empty_allow_list_accepts_any_extension() {
        let report = validate_manifest(
            &UploadOptions::default(),
            &manifest(r#"{"value": {"f": {"name": "tool.exe", "size": 1}}}"#),
        );
        assert!(report.is_empty());
    }

    #[test]
    fn test_all_violations_accumulate_in_order() {
        let options = UploadOptions {
            extensions: vec!["png".to_string()],
            max_file_size_bytes: Some(10),
            max_size_bytes: Some(15),
            ..Default::default()
        };
        let report = validate_manifest(
            &options,
            &manifest(r#"{"value": {"f": [{"name": "a.gif", "size": 20}]}}"#),
        );

        assert_eq!(
            report.message(),
            "The file extension is not allowed (gif in a.gif), allowed extensions: png. \
             Maximum file upload size exceeded, file: a.gif, size: 20 bytes, maximum: 10 bytes. \
             Maximum total upload size exceeded, size: 20 bytes, maximum: 15 bytes. "
        );
    }
}
