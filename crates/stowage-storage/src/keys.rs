//! Upload id generation.
//!
//! Id format: `{year}/{month}/{day}/{hour}/{minute}/{second}/{uuid}` in local time,
//! numbers unpadded except the four-digit year.

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Characters escaped in upload URLs. Reserved URI characters, including `/`, pass
/// through unchanged.
const URL_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Generate a fresh upload id from the current wall-clock time.
pub fn generate_upload_id() -> String {
    upload_id_at(&Local::now(), Uuid::new_v4())
}

/// Upload id for a given instant and token.
pub fn upload_id_at<Tz: TimeZone>(now: &DateTime<Tz>, token: Uuid) -> String {
    format!(
        "{:04}/{}/{}/{}/{}/{}/{}",
        now.year(),
        now.month(),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        token.hyphenated()
    )
}

/// Directory of an upload id below `root`.
pub fn id_to_dir(root: &Path, id: &str) -> PathBuf {
    id.split('/')
        .filter(|segment| !segment.is_empty())
        .fold(root.to_path_buf(), |dir, segment| dir.join(segment))
}

/// Web path of a promoted file, percent-encoded.
pub fn upload_url(base: &Path, id: &str, filename: &str) -> String {
    let base = base.to_string_lossy().replace('\\', "/");
    let base = base.trim_end_matches('/');
    let raw = if base.is_empty() || base == "." {
        format!("{}/{}", id, filename)
    } else {
        format!("{}/{}/{}", base.trim_start_matches("./"), id, filename)
    };
    utf8_percent_encode(&raw, URL_ENCODE_SET).to_string()
}
