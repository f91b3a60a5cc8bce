//! Post-receipt validation and staging
//!
//! A decoded form goes through two passes. The validation pass only reads and
//! accumulates every violation; if anything is wrong all scratch files are discarded
//! and the request is rejected as a whole. The promotion pass then places each file
//! (permanent storage or holding lane) and rolls everything back on the first IO
//! failure, so a handler either sees every file of the request or none.

use std::collections::BTreeSet;
use std::path::PathBuf;

use stowage_core::{
    AppError, FileDescriptor, FormEntry, FormFields, FormValue, UploadOptions, UploadedFiles,
    ValidationReport, Violation,
};
use stowage_storage::{Storage, StorageError, StorageResult};

use crate::error::storage_to_app_error;

/// Result of a successfully staged form.
#[derive(Debug, Clone, Default)]
pub struct StagedForm {
    pub files: UploadedFiles,
    pub fields: FormFields,
}

/// Check every file entry against the upload policy without touching the filesystem.
pub fn validate_entries(options: &UploadOptions, entries: &[FormEntry]) -> ValidationReport {
    let mut report = ValidationReport::new();
    let mut total = 0u64;

    for file in entries.iter().filter_map(FormEntry::as_file) {
        report.check_file(options, &file.filename, file.size);
        if file.leaf_name().is_none() {
            report.push(Violation::InvalidFilename {
                filename: file.filename.clone(),
            });
        }
        total = total.saturating_add(file.size);
    }

    report.check_total(options, total);

    let mut file_fields = BTreeSet::new();
    let mut text_fields = BTreeSet::new();
    for entry in entries {
        match entry.value {
            FormValue::File(_) => file_fields.insert(entry.name.as_str()),
            FormValue::Text(_) => text_fields.insert(entry.name.as_str()),
        };
    }
    for field in file_fields.intersection(&text_fields) {
        report.push(Violation::MixedField {
            field: field.to_string(),
        });
    }

    report
}

/// Validate, then place every file of the form.
#[tracing::instrument(skip_all, fields(entries = entries.len()))]
pub async fn stage(
    storage: &dyn Storage,
    options: &UploadOptions,
    entries: Vec<FormEntry>,
) -> Result<StagedForm, AppError> {
    let report = validate_entries(options, &entries);
    if !report.is_empty() {
        let removed = storage.discard(&scratch_paths(&entries)).await;
        tracing::debug!(
            violations = report.violations().len(),
            removed,
            "Upload rejected, scratch files discarded"
        );
        return Err(AppError::UploadRejected(report));
    }

    let mut staged = StagedForm::default();
    let mut placed: Vec<PathBuf> = Vec::new();
    let mut pending = entries.into_iter();

    while let Some(entry) = pending.next() {
        let mut file = match entry.value {
            FormValue::Text(value) => {
                staged.fields.insert(entry.name, value);
                continue;
            }
            FormValue::File(file) => file,
        };

        match place(storage, options, &mut file).await {
            Ok(location) => {
                placed.push(location);
                staged.files.insert(entry.name, file);
            }
            Err(e) => {
                // A failed move leaves its source in place.
                let mut unplaced: Vec<PathBuf> = file.tempfile.into_iter().collect();
                unplaced.extend(scratch_paths(pending.as_slice()));
                let withdrawn = if options.save_file {
                    storage.revoke(&placed).await
                } else {
                    storage.discard(&placed).await
                };
                let removed = withdrawn + storage.discard(&unplaced).await;
                tracing::error!(
                    error = %e,
                    removed,
                    "Staging failed, request rolled back"
                );
                return Err(storage_to_app_error(e));
            }
        }
    }

    tracing::info!(
        files = placed.len(),
        saved = options.save_file,
        "Upload staged"
    );

    Ok(staged)
}

/// Place one file and return where its bytes now live.
async fn place(
    storage: &dyn Storage,
    options: &UploadOptions,
    file: &mut FileDescriptor,
) -> StorageResult<PathBuf> {
    let scratch = file
        .tempfile
        .clone()
        .ok_or_else(|| StorageError::NotFound(file.filename.clone()))?;

    if options.read_file {
        file.data = Some(storage.read(&scratch).await?);
    }

    if options.save_file {
        let stored = storage.promote(&scratch, &file.filename).await?;
        file.tempfile = None;
        file.id = Some(stored.id);
        file.url = Some(stored.url);
        file.uri = Some(stored.uri.clone());
        Ok(stored.uri)
    } else {
        let held = storage.hold(&scratch).await?;
        file.tempfile = Some(held.clone());
        Ok(held)
    }
}

fn scratch_paths(entries: &[FormEntry]) -> Vec<PathBuf> {
    entries
        .iter()
        .filter_map(FormEntry::as_file)
        .filter_map(|file| file.tempfile.clone())
        .collect()
}
