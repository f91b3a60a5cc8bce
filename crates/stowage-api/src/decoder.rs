//! Streaming multipart decoder
//!
//! File parts are written chunk by chunk into the decode directory, scalar parts are
//! collected as text. The body is never buffered as a whole.

use std::io;
use std::path::Path;

use axum::body::Body;
use stowage_core::{AppError, FileDescriptor, FormEntry};
use tempfile::TempPath;
use tokio::fs;
use tokio::io::AsyncWriteExt;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Invalid multipart body: {0}")]
    Multipart(#[from] multer::Error),

    #[error("Failed to write decoded part: {0}")]
    Io(#[from] io::Error),
}

impl From<DecodeError> for AppError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Multipart(e) => {
                AppError::MalformedRequest(format!("Failed to decode multipart body: {}", e))
            }
            DecodeError::Io(e) => AppError::Storage(format!("IO error: {}", e)),
        }
    }
}

/// Part files written for one body.
///
/// Dropping the guards deletes every part still in the decode directory, so a
/// request that fails or is cancelled before staging leaves nothing behind.
#[derive(Debug, Default)]
pub struct PartGuards(Vec<TempPath>);

impl PartGuards {
    /// Stop tracking the parts. Whoever holds the entries owns the files from here.
    pub fn release(self) {
        for part in self.0 {
            if let Err(e) = part.keep() {
                tracing::warn!(error = %e, "Failed to release decoded part");
            }
        }
    }
}

/// Decode `body` into form entries, writing file parts below `dir`.
///
/// On error every file written for this body is removed before returning. On
/// success the part files stay owned by the returned guards until they are released.
pub async fn decode_multipart(
    body: Body,
    boundary: &str,
    dir: &Path,
) -> Result<(Vec<FormEntry>, PartGuards), DecodeError> {
    let mut parts = PartGuards::default();
    let entries = decode_into(body, boundary, dir, &mut parts).await?;
    Ok((entries, parts))
}

async fn decode_into(
    body: Body,
    boundary: &str,
    dir: &Path,
    parts: &mut PartGuards,
) -> Result<Vec<FormEntry>, DecodeError> {
    let mut multipart = multer::Multipart::new(body.into_data_stream(), boundary);
    let mut entries = Vec::new();

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        let Some(filename) = field.file_name().map(str::to_string) else {
            let value = field.text().await?;
            entries.push(FormEntry::text(name, value));
            continue;
        };

        let content_type = field
            .content_type()
            .map(|mime| mime.to_string())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let (file, part) = tempfile::Builder::new()
            .prefix("stowage-")
            .suffix(".upload")
            .tempfile_in(dir)?
            .into_parts();
        let path = part.to_path_buf();
        parts.0.push(part);
        let mut file = fs::File::from_std(file);

        let mut size = 0u64;
        while let Some(chunk) = field.chunk().await? {
            size += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        // An empty file input: browsers send the part with no name and no bytes.
        if filename.is_empty() && size == 0 {
            drop(parts.0.pop());
            continue;
        }

        tracing::debug!(
            field = %name,
            filename = %filename,
            size_bytes = size,
            "Decoded file part"
        );

        entries.push(FormEntry::file(
            name,
            FileDescriptor::staged(filename, content_type, size, path),
        ));
    }

    Ok(entries)
}
