//! Deferred, re-runnable wrappers around [`FileAccess`].
//!
//! Every locked operation is handed out as a [`Cold`] value. Building one does
//! no I/O; the work starts when it is awaited. Awaiting a clone runs the
//! operation again rather than replaying an earlier result.
//!
//! The streaming operations (`open_read_stream`, `ingest_rows`, `emit_rows`,
//! `download_to_file`) run outside the lock discipline: they are long-lived
//! and drained at the caller's pace.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::fs::access::{AccessMode, FileAccess};
use crate::fs::download;
use crate::fs::rows::{self, Row, RowOptions, RowStream};
use crate::fs::stream::FileStream;

type Make<T> = dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync;

/// Lazy single-value producer.
pub struct Cold<T> {
    make: Arc<Make<T>>,
}

impl<T: 'static> Cold<T> {
    pub fn new<F, Fut>(make: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            make: Arc::new(move || make().boxed()),
        }
    }

    /// Starts a fresh execution of the operation.
    pub fn run(&self) -> BoxFuture<'static, Result<T>> {
        (self.make)()
    }
}

impl<T> Clone for Cold<T> {
    fn clone(&self) -> Self {
        Self {
            make: Arc::clone(&self.make),
        }
    }
}

impl<T> fmt::Debug for Cold<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cold { .. }")
    }
}

impl<T: 'static> IntoFuture for Cold<T> {
    type Output = Result<T>;
    type IntoFuture = BoxFuture<'static, Result<T>>;

    fn into_future(self) -> Self::IntoFuture {
        self.run()
    }
}

/// Deferred file facade: locked operations from [`FileAccess`] plus the
/// unlocked streaming ones.
#[derive(Debug, Clone, Default)]
pub struct ReactiveFs {
    access: FileAccess,
    client: reqwest::Client,
}

impl ReactiveFs {
    pub fn new(access: FileAccess) -> Self {
        Self::with_client(access, reqwest::Client::new())
    }

    pub fn with_client(access: FileAccess, client: reqwest::Client) -> Self {
        Self { access, client }
    }

    pub fn access(&self) -> &FileAccess {
        &self.access
    }

    pub fn read_file(&self, path: impl Into<PathBuf>) -> Cold<Vec<u8>> {
        let (access, path) = (self.access.clone(), path.into());
        Cold::new(move || {
            let (access, path) = (access.clone(), path.clone());
            async move { access.read_file(&path).await }
        })
    }

    pub fn save_file(&self, path: impl Into<PathBuf>, data: impl Into<Bytes>) -> Cold<()> {
        let (access, path, data) = (self.access.clone(), path.into(), data.into());
        Cold::new(move || {
            let (access, path, data) = (access.clone(), path.clone(), data.clone());
            async move { access.save_file(&path, &data).await }
        })
    }

    pub fn append_file(&self, path: impl Into<PathBuf>, data: impl Into<Bytes>) -> Cold<()> {
        let (access, path, data) = (self.access.clone(), path.into(), data.into());
        Cold::new(move || {
            let (access, path, data) = (access.clone(), path.clone(), data.clone());
            async move { access.append_file(&path, &data).await }
        })
    }

    pub fn read_structured<T>(&self, path: impl Into<PathBuf>) -> Cold<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let (access, path) = (self.access.clone(), path.into());
        Cold::new(move || {
            let (access, path) = (access.clone(), path.clone());
            async move { access.read_structured::<T>(&path).await }
        })
    }

    pub fn write_structured<T>(&self, path: impl Into<PathBuf>, value: T) -> Cold<()>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let (access, path, value) = (self.access.clone(), path.into(), Arc::new(value));
        Cold::new(move || {
            let (access, path, value) = (access.clone(), path.clone(), Arc::clone(&value));
            async move { access.write_structured(&path, value.as_ref()).await }
        })
    }

    pub fn access_path(&self, path: impl Into<PathBuf>, mode: AccessMode) -> Cold<PathBuf> {
        let (access, path) = (self.access.clone(), path.into());
        Cold::new(move || {
            let (access, path) = (access.clone(), path.clone());
            async move { access.access(&path, mode).await }
        })
    }

    pub fn access_read(&self, path: impl Into<PathBuf>) -> Cold<PathBuf> {
        self.access_path(path, AccessMode::Read)
    }

    /// Resolves to `true`/`false`; never an error.
    pub fn exists(&self, path: impl Into<PathBuf>) -> Cold<bool> {
        let (access, path) = (self.access.clone(), path.into());
        Cold::new(move || {
            let (access, path) = (access.clone(), path.clone());
            async move { Ok::<_, Error>(access.exists(&path).await) }
        })
    }

    pub fn make_directory(&self, path: impl Into<PathBuf>) -> Cold<()> {
        let (access, path) = (self.access.clone(), path.into());
        Cold::new(move || {
            let (access, path) = (access.clone(), path.clone());
            async move { access.make_directory(&path).await }
        })
    }

    /// Creates the directory unless something already exists at `path`.
    ///
    /// Resolves to `true` when the directory was created by this call.
    pub fn make_directory_if_missing(&self, path: impl Into<PathBuf>) -> Cold<bool> {
        let (access, path) = (self.access.clone(), path.into());
        Cold::new(move || {
            let (access, path) = (access.clone(), path.clone());
            async move {
                if access.exists(&path).await {
                    return Ok::<_, Error>(false);
                }
                access.make_directory(&path).await?;
                Ok(true)
            }
        })
    }

    pub fn list_directory(&self, path: impl Into<PathBuf>) -> Cold<Vec<String>> {
        let (access, path) = (self.access.clone(), path.into());
        Cold::new(move || {
            let (access, path) = (access.clone(), path.clone());
            async move { access.list_directory(&path).await }
        })
    }

    /// Opens a live byte stream over the file, without a path lock.
    pub fn open_read_stream(&self, path: impl Into<PathBuf>) -> Cold<FileStream> {
        let path = path.into();
        Cold::new(move || {
            let path = path.clone();
            async move { FileStream::open(&path).await }
        })
    }

    /// Streams decoded rows; the file is opened on first poll.
    pub fn ingest_rows(&self, path: impl Into<PathBuf>, options: RowOptions) -> RowStream {
        rows::ingest(path.into(), options)
    }

    /// Resolves once every row is written and the destination flushed.
    pub fn emit_rows(&self, path: impl Into<PathBuf>, rows: Vec<Row>, options: RowOptions) -> Cold<()> {
        let (path, batch) = (path.into(), Arc::new(rows));
        Cold::new(move || {
            let (path, batch) = (path.clone(), batch.as_ref().clone());
            async move { rows::emit(path, batch, options).await }
        })
    }

    /// Streams a remote resource to `dest`; partial files are removed on failure.
    pub fn download_to_file(&self, url: impl Into<String>, dest: impl Into<PathBuf>) -> Cold<u64> {
        let (client, url, dest) = (self.client.clone(), url.into(), dest.into());
        Cold::new(move || {
            let (client, url, dest) = (client.clone(), url.clone(), dest.clone());
            async move { download::download_to_file(&client, &url, &dest).await }
        })
    }
}
