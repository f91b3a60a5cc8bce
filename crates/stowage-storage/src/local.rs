use crate::keys;
use crate::traits::{Storage, StorageError, StorageResult, StoredFile};
use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};
use stowage_core::models::leaf_name;
use stowage_core::UploadOptions;
use tokio::fs;
use uuid::Uuid;

/// Local filesystem storage implementation
#[derive(Clone, Debug)]
pub struct LocalStorage {
    /// Base path as configured; ids and urls are built from it.
    base_path: PathBuf,
    /// Directory promoted files are written below.
    root: PathBuf,
    scratch_dir: PathBuf,
    decode_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// The holding lane and the decode directory are created before this returns, so
    /// a middleware built on top never sees a missing directory.
    pub async fn new(options: &UploadOptions) -> StorageResult<Self> {
        let cwd = std::env::current_dir().map_err(|e| {
            StorageError::ConfigError(format!("Failed to read working directory: {}", e))
        })?;

        let root = if options.use_current_dir {
            cwd.join(&options.path)
        } else {
            options.path.clone()
        };
        // join() keeps absolute paths as they are
        let scratch_dir = cwd.join(&options.scratch_dir);
        let decode_dir = cwd.join(&options.decode_dir);

        for dir in [&scratch_dir, &decode_dir] {
            fs::create_dir_all(dir).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        tracing::debug!(
            root = %root.display(),
            scratch_dir = %scratch_dir.display(),
            decode_dir = %decode_dir.display(),
            "Local upload storage ready"
        );

        Ok(LocalStorage {
            base_path: options.path.clone(),
            root,
            scratch_dir,
            decode_dir,
        })
    }

    /// Directory promoted files are written below.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove `dir` and then each empty ancestor, stopping below the upload root.
    ///
    /// `remove_dir` refuses non-empty directories, so a calendar directory shared
    /// with another upload stays.
    async fn prune_empty_dirs(&self, dir: &Path) {
        let mut current = Some(dir);
        while let Some(dir) = current {
            if dir == self.root.as_path() || !dir.starts_with(&self.root) {
                break;
            }
            match fs::remove_dir(dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(_) => break,
            }
            current = dir.parent();
        }
    }
}

/// Move `from` to `to`.
///
/// A plain rename is tried first. When it fails (typically because the two paths are on
/// different volumes) the bytes are copied to a hidden partial file next to `to`,
/// synced, renamed into place and only then is the source removed. On error the
/// source is untouched and no partial destination remains.
async fn move_file(from: &Path, to: &Path) -> StorageResult<()> {
    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(StorageError::NotFound(from.display().to_string()))
        }
        Err(e) => {
            tracing::debug!(
                error = %e,
                from = %from.display(),
                to = %to.display(),
                "Rename failed, falling back to copy"
            );
            copy_then_remove(from, to).await
        }
    }
}

async fn copy_then_remove(from: &Path, to: &Path) -> StorageResult<()> {
    let name = to
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let partial = to.with_file_name(format!(".{}.{}.partial", name, Uuid::new_v4()));

    let copied = async {
        fs::copy(from, &partial).await?;
        fs::OpenOptions::new()
            .write(true)
            .open(&partial)
            .await?
            .sync_all()
            .await?;
        fs::rename(&partial, to).await
    }
    .await;

    if let Err(e) = copied {
        if let Err(cleanup) = fs::remove_file(&partial).await {
            if cleanup.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    error = %cleanup,
                    path = %partial.display(),
                    "Failed to remove partial copy"
                );
            }
        }
        return Err(StorageError::MoveFailed(format!(
            "Failed to copy {} to {}: {}",
            from.display(),
            to.display(),
            e
        )));
    }

    // The destination is complete at this point; a leftover source is only garbage.
    if let Err(e) = fs::remove_file(from).await {
        tracing::warn!(
            error = %e,
            path = %from.display(),
            "Failed to remove source after copy"
        );
    }

    Ok(())
}

#[async_trait]
impl Storage for LocalStorage {
    async fn promote(&self, scratch: &Path, filename: &str) -> StorageResult<StoredFile> {
        let leaf = leaf_name(filename)
            .ok_or_else(|| StorageError::InvalidFilename(filename.to_string()))?;
        let id = keys::generate_upload_id();
        let dir = keys::id_to_dir(&self.root, &id);
        let start = std::time::Instant::now();

        fs::create_dir_all(&dir).await.map_err(|e| {
            StorageError::PromotionFailed(format!(
                "Failed to create directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let uri = dir.join(leaf);
        if let Err(e) = move_file(scratch, &uri).await {
            self.prune_empty_dirs(&dir).await;
            return Err(e);
        }

        let url = keys::upload_url(&self.base_path, &id, leaf);

        tracing::info!(
            id = %id,
            path = %uri.display(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload promoted"
        );

        Ok(StoredFile { id, url, uri })
    }

    async fn hold(&self, scratch: &Path) -> StorageResult<PathBuf> {
        let name = scratch
            .file_name()
            .ok_or_else(|| StorageError::InvalidFilename(scratch.display().to_string()))?;
        let target = self.scratch_dir.join(name);

        move_file(scratch, &target).await?;

        tracing::debug!(path = %target.display(), "Upload moved to holding lane");

        Ok(target)
    }

    async fn read(&self, path: &Path) -> StorageResult<Bytes> {
        match fs::read(path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(StorageError::ReadFailed(format!(
                "Failed to read file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn discard(&self, paths: &[PathBuf]) -> usize {
        let mut removed = 0;
        for path in paths {
            match fs::remove_file(path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        path = %path.display(),
                        "Failed to discard scratch file"
                    );
                }
            }
        }
        removed
    }

    async fn revoke(&self, uris: &[PathBuf]) -> usize {
        let removed = self.discard(uris).await;
        for dir in uris.iter().filter_map(|uri| uri.parent()) {
            self.prune_empty_dirs(dir).await;
        }
        removed
    }

    fn decode_dir(&self) -> &Path {
        &self.decode_dir
    }

    fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn storage_in(dir: &Path) -> LocalStorage {
        let options = UploadOptions {
            path: dir.join("uploads"),
            use_current_dir: false,
            scratch_dir: dir.join("scratch"),
            decode_dir: dir.join("decode"),
            ..Default::default()
        };
        LocalStorage::new(&options).await.unwrap()
    }

    fn entries_in(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    async fn decoded_file(storage: &LocalStorage, name: &str, data: &[u8]) -> PathBuf {
        let path = storage.decode_dir().join(name);
        fs::write(&path, data).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_new_creates_scratch_and_decode_dirs() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;

        assert!(storage.scratch_dir().is_dir());
        assert!(storage.decode_dir().is_dir());
    }

    #[tokio::test]
    async fn test_promote_moves_file_under_upload_id() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;
        let scratch = decoded_file(&storage, "part-1", b"hello world").await;

        let stored = storage.promote(&scratch, "greeting.txt").await.unwrap();

        assert!(!scratch.exists());
        assert_eq!(fs::read(&stored.uri).await.unwrap(), b"hello world");
        assert_eq!(stored.uri, keys::id_to_dir(storage.root(), &stored.id).join("greeting.txt"));
        assert!(stored.url.ends_with(&format!("{}/greeting.txt", stored.id)));
    }

    #[tokio::test]
    async fn test_promote_same_name_twice_never_collides() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;
        let first = decoded_file(&storage, "part-1", b"one").await;
        let second = decoded_file(&storage, "part-2", b"two").await;

        let a = storage.promote(&first, "same.txt").await.unwrap();
        let b = storage.promote(&second, "same.txt").await.unwrap();

        assert_ne!(a.uri, b.uri);
        assert_eq!(fs::read(&a.uri).await.unwrap(), b"one");
        assert_eq!(fs::read(&b.uri).await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_promote_strips_directories_from_filename() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;
        let scratch = decoded_file(&storage, "part-1", b"x").await;

        let stored = storage.promote(&scratch, "../../escape.txt").await.unwrap();

        assert!(stored.uri.starts_with(storage.root()));
        assert_eq!(stored.uri.file_name().unwrap(), "escape.txt");
    }

    #[tokio::test]
    async fn test_promote_rejects_unusable_filename() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;
        let scratch = decoded_file(&storage, "part-1", b"x").await;

        let result = storage.promote(&scratch, "..").await;
        assert!(matches!(result, Err(StorageError::InvalidFilename(_))));
        assert!(scratch.exists());
    }

    #[tokio::test]
    async fn test_promote_missing_scratch_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;

        let result = storage
            .promote(&storage.decode_dir().join("gone"), "a.txt")
            .await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
        assert_eq!(entries_in(storage.root()), 0);
    }

    #[tokio::test]
    async fn test_revoke_removes_upload_dirs_but_keeps_shared_ones() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;
        let first = decoded_file(&storage, "part-1", b"one").await;
        let second = decoded_file(&storage, "part-2", b"two").await;
        let a = storage.promote(&first, "a.txt").await.unwrap();
        let b = storage.promote(&second, "b.txt").await.unwrap();

        assert_eq!(storage.revoke(&[a.uri.clone()]).await, 1);
        assert!(!a.uri.parent().unwrap().exists());
        assert_eq!(fs::read(&b.uri).await.unwrap(), b"two");

        assert_eq!(storage.revoke(&[b.uri.clone()]).await, 1);
        assert_eq!(entries_in(storage.root()), 0);
        assert!(storage.root().is_dir());
    }

    #[tokio::test]
    async fn test_hold_moves_into_scratch_lane() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;
        let scratch = decoded_file(&storage, "part-7", b"keep me").await;

        let held = storage.hold(&scratch).await.unwrap();

        assert_eq!(held, storage.scratch_dir().join("part-7"));
        assert!(!scratch.exists());
        assert_eq!(storage.read(&held).await.unwrap(), Bytes::from_static(b"keep me"));
    }

    #[tokio::test]
    async fn test_copy_fallback_leaves_no_partial_on_failure() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;
        let scratch = decoded_file(&storage, "part-1", b"payload").await;
        let missing_dir = dir.path().join("does-not-exist").join("out.txt");

        let result = copy_then_remove(&scratch, &missing_dir).await;

        assert!(matches!(result, Err(StorageError::MoveFailed(_))));
        assert!(scratch.exists());
        assert!(!missing_dir.exists());
    }

    #[tokio::test]
    async fn test_copy_fallback_moves_bytes() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;
        let scratch = decoded_file(&storage, "part-1", b"payload").await;
        let target = storage.scratch_dir().join("copied");

        copy_then_remove(&scratch, &target).await.unwrap();

        assert!(!scratch.exists());
        assert_eq!(fs::read(&target).await.unwrap(), b"payload");
        let leftovers: Vec<_> = std::fs::read_dir(storage.scratch_dir())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_discard_ignores_missing_files() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;
        let a = decoded_file(&storage, "a", b"1").await;
        let b = decoded_file(&storage, "b", b"2").await;
        let missing = storage.decode_dir().join("missing");

        let removed = storage.discard(&[a.clone(), missing, b.clone()]).await;

        assert_eq!(removed, 2);
        assert!(!a.exists());
        assert!(!b.exists());
    }
}
