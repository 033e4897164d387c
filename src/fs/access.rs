//! Lock-scoped file operations.
//!
//! Read-class operations hold a shared lock on the target path, write-class
//! operations an exclusive one. The lock is dropped before any result or
//! error is handed back to the caller.

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};
use crate::fs::lock::{LockManager, LockMode};

/// What [`FileAccess::access`] checks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// The path exists
    Exists,
    /// The path can be opened for reading
    Read,
    /// The path can be opened for writing
    Write,
}

/// File operations serialized per path through a [`LockManager`].
#[derive(Debug, Clone, Default)]
pub struct FileAccess {
    locks: LockManager,
}

impl FileAccess {
    pub fn new(locks: LockManager) -> Self {
        Self { locks }
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Reads the whole file.
    pub async fn read_file(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let path = path.as_ref();
        self.scoped(path, LockMode::Shared, || async move {
            fs::read(path).await.map_err(|e| Error::io(path, e))
        })
        .await
    }

    /// Replaces the file contents, creating the file when missing.
    pub async fn save_file(&self, path: impl AsRef<Path>, data: impl AsRef<[u8]>) -> Result<()> {
        let path = path.as_ref();
        let data = data.as_ref();
        self.scoped(path, LockMode::Exclusive, || async move {
            fs::write(path, data).await.map_err(|e| Error::io(path, e))
        })
        .await
    }

    /// Appends to the file, creating it when missing.
    ///
    /// Appends from concurrent callers land as whole blocks, one after another.
    pub async fn append_file(&self, path: impl AsRef<Path>, data: impl AsRef<[u8]>) -> Result<()> {
        let path = path.as_ref();
        let data = data.as_ref();
        self.scoped(path, LockMode::Exclusive, || async move {
            let mut file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await
                .map_err(|e| Error::io(path, e))?;
            file.write_all(data).await.map_err(|e| Error::io(path, e))?;
            file.flush().await.map_err(|e| Error::io(path, e))
        })
        .await
    }

    /// Reads a JSON document and decodes it into `T`.
    pub async fn read_structured<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> Result<T> {
        let path = path.as_ref();
        self.scoped(path, LockMode::Shared, || async move {
            let bytes = fs::read(path).await.map_err(|e| Error::io(path, e))?;
            serde_json::from_slice(&bytes).map_err(|source| Error::Structured {
                path: path.to_path_buf(),
                source,
            })
        })
        .await
    }

    /// Writes `value` as a pretty-printed JSON document.
    pub async fn write_structured<T>(&self, path: impl AsRef<Path>, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let path = path.as_ref();
        let mut bytes = serde_json::to_vec_pretty(value).map_err(|source| Error::Structured {
            path: path.to_path_buf(),
            source,
        })?;
        bytes.push(b'\n');

        self.scoped(path, LockMode::Exclusive, || async move {
            fs::write(path, &bytes).await.map_err(|e| Error::io(path, e))
        })
        .await
    }

    /// Checks that `path` can be used as `mode` asks, returning the path on success.
    pub async fn access(&self, path: impl AsRef<Path>, mode: AccessMode) -> Result<PathBuf> {
        let path = path.as_ref();
        self.scoped(path, LockMode::Shared, || async move {
            probe(path, mode).await.map_err(|e| Error::io(path, e))?;
            Ok(path.to_path_buf())
        })
        .await
    }

    pub async fn access_read(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        self.access(path, AccessMode::Read).await
    }

    /// Existence check that never fails: every error resolves to `false`.
    pub async fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.access(path, AccessMode::Exists).await.is_ok()
    }

    pub async fn make_directory(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.scoped(path, LockMode::Exclusive, || async move {
            fs::create_dir(path).await.map_err(|e| Error::io(path, e))
        })
        .await
    }

    /// Lists entry names in a directory, sorted.
    ///
    /// Takes the exclusive lock even though it only reads: a listing never
    /// overlaps any other locked operation on the same directory path.
    pub async fn list_directory(&self, path: impl AsRef<Path>) -> Result<Vec<String>> {
        let path = path.as_ref();
        self.scoped(path, LockMode::Exclusive, || async move {
            let mut entries = fs::read_dir(path).await.map_err(|e| Error::io(path, e))?;
            let mut names = Vec::new();
            while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(path, e))? {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
            names.sort();
            Ok(names)
        })
        .await
    }

    async fn scoped<T, F, Fut>(&self, path: &Path, mode: LockMode, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let guard = self.locks.acquire(path, mode).await?;
        let result = op().await;
        drop(guard);

        if let Err(e) = &result {
            tracing::debug!(path = %path.display(), ?mode, error = %e, "file operation failed");
        }
        result
    }
}

async fn probe(path: &Path, mode: AccessMode) -> std::io::Result<()> {
    match mode {
        AccessMode::Exists => fs::metadata(path).await.map(|_| ()),
        AccessMode::Read => fs::File::open(path).await.map(|_| ()),
        AccessMode::Write => {
            let meta = fs::metadata(path).await?;
            if meta.is_dir() {
                if meta.permissions().readonly() {
                    return Err(std::io::ErrorKind::PermissionDenied.into());
                }
                return Ok(());
            }
            fs::OpenOptions::new().write(true).open(path).await.map(|_| ())
        }
    }
}
