//! Configuration module
//!
//! `UploadOptions` is the policy a single upload middleware instance enforces.
//! `ServiceConfig` wraps it together with the settings the binary reads from the
//! environment.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const UPLOAD_PATH: &str = "uploads";
const SCRATCH_DIR: &str = "temp_uploads";
const DECODE_DIR_NAME: &str = "stowage-decode";
const SERVER_PORT: u16 = 3000;
const SCRATCH_MAX_AGE_SECS: u64 = 86_400;
const MAX_MANIFEST_BYTES: usize = 1024 * 1024;

/// Upload policy for one middleware instance.
///
/// Defaults are merged in at construction, either with struct-update syntax
/// (`UploadOptions { save_file: false, ..Default::default() }`) or by deserializing a
/// partial document: every missing key falls back to [`UploadOptions::default`].
/// The value is never mutated once a middleware owns it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadOptions {
    /// Base directory of permanent storage.
    pub path: PathBuf,
    /// Allowed extensions, compared verbatim. Empty allows everything.
    pub extensions: Vec<String>,
    /// Aggregate byte cap per request. `None` is unbounded.
    pub max_size_bytes: Option<u64>,
    /// Per-file byte cap. `None` is unbounded.
    pub max_file_size_bytes: Option<u64>,
    /// Promote accepted files into `path`; otherwise keep them in the scratch lane.
    pub save_file: bool,
    /// Also load accepted files into memory.
    pub read_file: bool,
    /// Resolve `path` against the process working directory.
    pub use_current_dir: bool,
    /// Holding lane for files that are not promoted. Relative paths resolve
    /// against the working directory.
    pub scratch_dir: PathBuf,
    /// Where the multipart decoder writes file parts while a request is in flight.
    pub decode_dir: PathBuf,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from(UPLOAD_PATH),
            extensions: Vec::new(),
            max_size_bytes: None,
            max_file_size_bytes: None,
            save_file: true,
            read_file: false,
            use_current_dir: true,
            scratch_dir: PathBuf::from(SCRATCH_DIR),
            decode_dir: env::temp_dir().join(DECODE_DIR_NAME),
        }
    }
}

impl UploadOptions {
    /// Whether `extension` passes the allow-list. An empty list allows everything.
    pub fn allows_extension(&self, extension: &str) -> bool {
        self.extensions.is_empty() || self.extensions.iter().any(|e| e == extension)
    }

    /// Load upload options from `UPLOAD_*` environment variables.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let defaults = Self::default();

        let extensions = env::var("UPLOAD_ALLOWED_EXTENSIONS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let options = Self {
            path: env::var("UPLOAD_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.path),
            extensions,
            max_size_bytes: parse_optional_u64("UPLOAD_MAX_SIZE_BYTES")?,
            max_file_size_bytes: parse_optional_u64("UPLOAD_MAX_FILE_SIZE_BYTES")?,
            save_file: parse_bool("UPLOAD_SAVE_FILE", defaults.save_file),
            read_file: parse_bool("UPLOAD_READ_FILE", defaults.read_file),
            use_current_dir: parse_bool("UPLOAD_USE_CURRENT_DIR", defaults.use_current_dir),
            scratch_dir: env::var("UPLOAD_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_dir),
            decode_dir: env::var("UPLOAD_DECODE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.decode_dir),
        };

        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.path.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("UPLOAD_PATH must not be empty"));
        }

        if let (Some(total), Some(per_file)) = (self.max_size_bytes, self.max_file_size_bytes) {
            if per_file > total {
                return Err(anyhow::anyhow!(
                    "UPLOAD_MAX_FILE_SIZE_BYTES ({}) cannot exceed UPLOAD_MAX_SIZE_BYTES ({})",
                    per_file,
                    total
                ));
            }
        }

        if let Some(bad) = self
            .extensions
            .iter()
            .find(|e| e.contains('.') || e.chars().any(|c| c.is_uppercase()))
        {
            return Err(anyhow::anyhow!(
                "Upload extensions must be lowercase and given without a dot, got '{}'",
                bad
            ));
        }

        Ok(())
    }
}

/// Settings of the stowage binary.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub server_port: u16,
    pub environment: String,
    pub upload: UploadOptions,
    /// Interval between scratch sweeps. 0 disables the sweeper.
    pub scratch_sweep_interval_secs: u64,
    /// Files in the decode directory older than this are removed by the sweeper.
    pub scratch_max_age_secs: u64,
    /// Body limit for pre-upload JSON manifests.
    pub max_manifest_bytes: usize,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let config = Self {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            upload: UploadOptions::from_env()?,
            scratch_sweep_interval_secs: env::var("SCRATCH_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            scratch_max_age_secs: env::var("SCRATCH_MAX_AGE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(SCRATCH_MAX_AGE_SECS),
            max_manifest_bytes: env::var("MAX_MANIFEST_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(MAX_MANIFEST_BYTES),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.upload.validate()?;

        if self.scratch_sweep_interval_secs > 0 && self.scratch_max_age_secs == 0 {
            return Err(anyhow::anyhow!(
                "SCRATCH_MAX_AGE_SECS must be positive when the scratch sweeper is enabled"
            ));
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            server_port: SERVER_PORT,
            environment: "development".to_string(),
            upload: UploadOptions::default(),
            scratch_sweep_interval_secs: 0,
            scratch_max_age_secs: SCRATCH_MAX_AGE_SECS,
            max_manifest_bytes: MAX_MANIFEST_BYTES,
        }
    }
}

fn parse_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn parse_optional_u64(name: &str) -> Result<Option<u64>, anyhow::Error> {
    match env::var(name) {
        Ok(v) if v.trim().is_empty() => Ok(None),
        Ok(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} must be a byte count", name)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let options = UploadOptions::default();
        assert_eq!(options.path, PathBuf::from("uploads"));
        assert!(options.extensions.is_empty());
        assert_eq!(options.max_size_bytes, None);
        assert_eq!(options.max_file_size_bytes, None);
        assert!(options.save_file);
        assert!(!options.read_file);
        assert!(options.use_current_dir);
        assert_eq!(options.scratch_dir, PathBuf::from("temp_uploads"));
    }

    #[test]
    fn partial_document_overlays_defaults() {
        let options: UploadOptions = serde_json::from_str(
            r#"{"extensions": ["png", "jpg"], "maxFileSizeBytes": 1000, "saveFile": false}"#,
        )
        .unwrap();

        assert_eq!(options.extensions, vec!["png", "jpg"]);
        assert_eq!(options.max_file_size_bytes, Some(1000));
        assert!(!options.save_file);
        assert_eq!(options.path, PathBuf::from("uploads"));
        assert!(options.use_current_dir);
    }

    #[test]
    fn empty_allow_list_accepts_everything() {
        let options = UploadOptions::default();
        assert!(options.allows_extension("exe"));

        let options = UploadOptions {
            extensions: vec!["png".to_string()],
            ..Default::default()
        };
        assert!(options.allows_extension("png"));
        assert!(!options.allows_extension("PNG"));
        assert!(!options.allows_extension("txt"));
    }

    #[test]
    fn validate_rejects_inconsistent_caps() {
        let options = UploadOptions {
            max_size_bytes: Some(100),
            max_file_size_bytes: Some(200),
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn validate_rejects_dotted_or_uppercase_extensions() {
        let dotted = UploadOptions {
            extensions: vec![".png".to_string()],
            ..Default::default()
        };
        assert!(dotted.validate().is_err());

        let upper = UploadOptions {
            extensions: vec!["PNG".to_string()],
            ..Default::default()
        };
        assert!(upper.validate().is_err());
    }

    #[test]
    fn production_detection() {
        let config = ServiceConfig {
            environment: "Prod".to_string(),
            ..Default::default()
        };
        assert!(config.is_production());
        assert!(!ServiceConfig::default().is_production());
    }
}
