//! Multipart upload middleware
//!
//! Decodes the body, validates and stages every file, then hands the request to the
//! next stage with [`UploadedFiles`] and [`FormFields`] in its extensions. The body is
//! consumed here; the next stage receives an empty one.

use std::sync::{Arc, LazyLock};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use regex::Regex;
use stowage_core::{AppError, FormFields, UploadedFiles, Violation};

use crate::decoder;
use crate::error::HttpAppError;
use crate::stager;
use crate::state::UploadState;

static MULTIPART_CONTENT_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^\s*multipart/form-data\s*;(?:.*;)?\s*boundary=(?:"([^"]+)"|([^\s;"]+))"#)
        .expect("multipart content-type pattern is valid")
});

/// Boundary token of a `multipart/form-data` content type, quotes stripped.
pub fn parse_boundary(content_type: &str) -> Option<String> {
    let captures = MULTIPART_CONTENT_TYPE.captures(content_type)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|m| m.as_str().to_string())
}

/// Declared body length, if present and parsable.
fn declared_content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Upload middleware
///
/// Use with `axum::middleware::from_fn_with_state(Arc<UploadState>, upload_files)`.
/// Handlers behind it extract `Extension<UploadedFiles>` and `Extension<FormFields>`.
#[tracing::instrument(skip_all, fields(method = %request.method(), uri = %request.uri()))]
pub async fn upload_files(
    State(state): State<Arc<UploadState>>,
    request: Request,
    next: Next,
) -> Result<Response, HttpAppError> {
    let (mut parts, body) = request.into_parts();
    let options = &state.options;

    if let (Some(max), Some(declared)) = (
        options.max_size_bytes,
        declared_content_length(&parts.headers),
    ) {
        if declared > max {
            let violation = Violation::TotalTooLarge {
                size: declared,
                max,
            };
            return Err(AppError::PayloadTooLarge(violation.to_string()).into());
        }
    }

    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .ok_or_else(|| {
            AppError::MalformedRequest(
                "Missing content-type header, expected multipart/form-data".to_string(),
            )
        })?
        .to_str()
        .map_err(|_| AppError::MalformedRequest("Invalid content-type header".to_string()))?;

    let boundary = parse_boundary(content_type).ok_or_else(|| {
        AppError::MalformedRequest(format!(
            "Invalid content-type '{}', expected multipart/form-data with a boundary",
            content_type
        ))
    })?;

    let (entries, part_guards) =
        decoder::decode_multipart(body, &boundary, state.storage.decode_dir())
            .await
            .map_err(AppError::from)?;

    // Staging moves or discards every part itself; the guards only cover cancellation.
    let staged = stager::stage(state.storage.as_ref(), options, entries).await;
    part_guards.release();
    let staged = staged?;

    parts.extensions.insert::<UploadedFiles>(staged.files);
    parts.extensions.insert::<FormFields>(staged.fields);

    Ok(next.run(Request::from_parts(parts, Body::empty())).await)
}
