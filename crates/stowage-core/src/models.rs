//! Upload data model
//!
//! A decoded multipart body is a sequence of [`FormEntry`] values. File entries carry a
//! [`FileDescriptor`] that the stager mutates in place: promotion adds `id`, `url` and
//! `uri` and clears the scratch reference. Accepted files are grouped per field into
//! [`UploadedFiles`], which is what downstream handlers read from the request
//! extensions.

use std::collections::BTreeMap;
use std::path::PathBuf;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Metadata of one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    /// Client supplied file name, extension included.
    pub filename: String,
    pub content_type: String,
    /// Observed size in bytes.
    pub size: u64,
    /// Scratch location of the bytes. Cleared once the file is promoted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempfile: Option<PathBuf>,
    /// Relative path segment identifying this upload, e.g. `2024/3/15/9/41/7/<uuid>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Percent-encoded web path under the permanent base.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Filesystem location of the promoted file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<PathBuf>,
    /// File contents, present when the middleware is configured to read files.
    #[serde(skip)]
    pub data: Option<Bytes>,
}

impl FileDescriptor {
    /// Descriptor for a file the decoder has just written to scratch storage.
    pub fn staged(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        size: u64,
        tempfile: impl Into<PathBuf>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            size,
            tempfile: Some(tempfile.into()),
            id: None,
            url: None,
            uri: None,
            data: None,
        }
    }

    /// Name the file is stored under, see [`leaf_name`].
    pub fn leaf_name(&self) -> Option<&str> {
        leaf_name(&self.filename)
    }
}

/// Substring after the last `.`. A name without a dot is its own extension.
pub fn file_extension(filename: &str) -> &str {
    filename.rsplit('.').next().unwrap_or("")
}

/// Last path component of a client supplied file name.
///
/// Both `/` and `\` count as separators. Returns `None` when nothing usable is left
/// (empty, `.`, `..` or a NUL byte).
pub fn leaf_name(filename: &str) -> Option<&str> {
    let leaf = filename.rsplit(['/', '\\']).next().unwrap_or("");
    if leaf.is_empty() || leaf == "." || leaf == ".." || leaf.contains('\0') {
        return None;
    }
    Some(leaf)
}

/// Value of a decoded multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File(FileDescriptor),
}

/// One decoded multipart part. Field names may repeat within a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormEntry {
    pub name: String,
    pub value: FormValue,
}

impl FormEntry {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FormValue::Text(value.into()),
        }
    }

    pub fn file(name: impl Into<String>, descriptor: FileDescriptor) -> Self {
        Self {
            name: name.into(),
            value: FormValue::File(descriptor),
        }
    }

    pub fn as_file(&self) -> Option<&FileDescriptor> {
        match &self.value {
            FormValue::File(file) => Some(file),
            FormValue::Text(_) => None,
        }
    }
}

/// Files received under one field name.
///
/// Serialized untagged: a single file is an object, repeated files an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldFiles {
    Single(FileDescriptor),
    Multiple(Vec<FileDescriptor>),
}

impl FieldFiles {
    pub fn len(&self) -> usize {
        match self {
            FieldFiles::Single(_) => 1,
            FieldFiles::Multiple(files) => files.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileDescriptor> {
        let (single, many) = match self {
            FieldFiles::Single(file) => (Some(file), &[][..]),
            FieldFiles::Multiple(files) => (None, files.as_slice()),
        };
        single.into_iter().chain(many.iter())
    }

    /// The single descriptor, or `None` when the field repeated.
    pub fn as_single(&self) -> Option<&FileDescriptor> {
        match self {
            FieldFiles::Single(file) => Some(file),
            FieldFiles::Multiple(_) => None,
        }
    }
}

/// Accepted files of one request, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadedFiles(BTreeMap<String, FieldFiles>);

impl UploadedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file under `field`, keeping submission order.
    ///
    /// The first file is stored as-is, a second turns the field into a sequence.
    pub fn insert(&mut self, field: impl Into<String>, file: FileDescriptor) {
        let field = field.into();
        let files = match self.0.remove(&field) {
            None => FieldFiles::Single(file),
            Some(FieldFiles::Single(first)) => FieldFiles::Multiple(vec![first, file]),
            Some(FieldFiles::Multiple(mut files)) => {
                files.push(file);
                FieldFiles::Multiple(files)
            }
        };
        self.0.insert(field, files);
    }

    pub fn get(&self, field: &str) -> Option<&FieldFiles> {
        self.0.get(field)
    }

    /// Every file with its field name.
    pub fn files(&self) -> impl Iterator<Item = (&str, &FileDescriptor)> {
        self.0
            .iter()
            .flat_map(|(field, files)| files.iter().map(move |file| (field.as_str(), file)))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Scalar (non-file) fields of a decoded form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormFields(BTreeMap<String, Vec<String>>);

impl FormFields {
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(value.into());
    }

    /// First value submitted for `field`.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn get_all(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A file announced by a client before it is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredFile {
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item),
            OneOrMany::Many(items) => items,
        }
    }
}

/// Pre-upload manifest: `{"value": {"<field>": {name, size} | [{name, size}, ...]}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreUploadManifest {
    pub value: BTreeMap<String, OneOrMany<DeclaredFile>>,
}

impl PreUploadManifest {
    pub fn files(&self) -> impl Iterator<Item = &DeclaredFile> {
        self.value.values().flat_map(|files| files.as_slice().iter())
    }

    /// Sum of every declared size.
    pub fn total_size(&self) -> u64 {
        self.files().map(|f| f.size).fold(0u64, u64::saturating_add)
    }
}
