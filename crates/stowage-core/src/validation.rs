//! Upload policy checks shared by the pre-upload and post-receipt validators.
//!
//! Checks never short-circuit: every problem is pushed onto a [`ValidationReport`]
//! so the client can fix all of them in one round-trip.

use std::fmt;

use crate::config::UploadOptions;
use crate::models::file_extension;

/// One policy violation. The display text is what the client sees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error(
        "The file extension is not allowed ({extension} in {filename}), allowed extensions: {}. ",
        .allowed.join(",")
    )]
    ExtensionNotAllowed {
        extension: String,
        filename: String,
        allowed: Vec<String>,
    },

    #[error(
        "Maximum file upload size exceeded, file: {filename}, size: {size} bytes, maximum: {max} bytes. "
    )]
    FileTooLarge { filename: String, size: u64, max: u64 },

    #[error("Maximum total upload size exceeded, size: {size} bytes, maximum: {max} bytes. ")]
    TotalTooLarge { size: u64, max: u64 },

    #[error("The file name is not valid ({filename}). ")]
    InvalidFilename { filename: String },

    #[error("The field {field} mixes files and plain values. ")]
    MixedField { field: String },
}

impl Violation {
    pub fn is_size_violation(&self) -> bool {
        matches!(
            self,
            Violation::FileTooLarge { .. } | Violation::TotalTooLarge { .. }
        )
    }
}

/// Accumulated violations of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// True when the report is non-empty and only contains size violations.
    pub fn only_size_violations(&self) -> bool {
        !self.violations.is_empty() && self.violations.iter().all(Violation::is_size_violation)
    }

    /// All messages, in detection order.
    pub fn message(&self) -> String {
        self.violations.iter().map(ToString::to_string).collect()
    }

    pub fn into_result(self) -> Result<(), ValidationReport> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Extension and per-file size checks for one file.
    pub fn check_file(&mut self, options: &UploadOptions, filename: &str, size: u64) {
        let extension = file_extension(filename);
        if !options.allows_extension(extension) {
            self.push(Violation::ExtensionNotAllowed {
                extension: extension.to_string(),
                filename: filename.to_string(),
                allowed: options.extensions.clone(),
            });
        }

        if let Some(max) = options.max_file_size_bytes {
            if size > max {
                self.push(Violation::FileTooLarge {
                    filename: filename.to_string(),
                    size,
                    max,
                });
            }
        }
    }

    /// Aggregate size check for a whole request.
    pub fn check_total(&mut self, options: &UploadOptions, total: u64) {
        if let Some(max) = options.max_size_bytes {
            if total > max {
                self.push(Violation::TotalTooLarge { size: total, max });
            }
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for ValidationReport {}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(extensions: &[&str], max_file: Option<u64>, max_total: Option<u64>) -> UploadOptions {
        UploadOptions {
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
            max_file_size_bytes: max_file,
            max_size_bytes: max_total,
            ..Default::default()
        }
    }

    #[test]
    fn oversized_file_message_names_file_size_and_cap() {
        let mut report = ValidationReport::new();
        report.check_file(&options(&["txt"], Some(1000), None), "a.txt", 1500);

        let message = report.message();
        assert!(message.contains("a.txt"));
        assert!(message.contains("1500"));
        assert!(message.contains("1000"));
        assert!(report.only_size_violations());
    }

    #[test]
    fn every_violation_is_reported() {
        let opts = options(&["png", "jpg"], Some(100), Some(150));
        let mut report = ValidationReport::new();
        report.check_file(&opts, "notes.txt", 10);
        report.check_file(&opts, "big.png", 120);
        report.check_file(&opts, "huge.exe", 500);
        report.check_total(&opts, 630);

        assert_eq!(report.violations().len(), 5);
        let message = report.message();
        assert!(message.contains("(txt in notes.txt)"));
        assert!(message.contains("allowed extensions: png,jpg"));
        assert!(message.contains("file: big.png, size: 120 bytes"));
        assert!(message.contains("(exe in huge.exe)"));
        assert!(message.contains("file: huge.exe, size: 500 bytes"));
        assert!(message.contains("total upload size exceeded, size: 630 bytes, maximum: 150 bytes"));
        assert!(!report.only_size_violations());
    }

    #[test]
    fn extension_check_is_case_sensitive() {
        let mut report = ValidationReport::new();
        report.check_file(&options(&["png"], None, None), "photo.PNG", 1);
        assert_eq!(report.violations().len(), 1);
    }

    #[test]
    fn unbounded_caps_never_trip() {
        let mut report = ValidationReport::new();
        let opts = options(&[], None, None);
        report.check_file(&opts, "anything.bin", u64::MAX);
        report.check_total(&opts, u64::MAX);
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn limits_are_inclusive() {
        let mut report = ValidationReport::new();
        let opts = options(&[], Some(1000), Some(1000));
        report.check_file(&opts, "exact.bin", 1000);
        report.check_total(&opts, 1000);
        assert!(report.is_empty());
    }
}
