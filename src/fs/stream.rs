//! Unlocked chunked file reads.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, Take};

use crate::error::{Error, Result};

/// Default buffer size for streaming
pub const CHUNK_SIZE: usize = 8192;

/// Boxed source of byte chunks (request bodies, response generators, file reads).
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// Wraps an in-memory payload as a single-chunk [`ByteStream`].
pub fn once(bytes: impl Into<Bytes>) -> ByteStream {
    let bytes = bytes.into();
    if bytes.is_empty() {
        return stream::empty().boxed();
    }
    stream::once(async move { Ok(bytes) }).boxed()
}

/// Live read stream over one file.
///
/// Opening does not take a path lock; writers to the same path are not
/// serialized against the reader. The stream never yields more than the
/// length observed at open time, and ends early if the file shrinks.
pub struct FileStream {
    path: PathBuf,
    len: u64,
    inner: ByteStream,
}

impl FileStream {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await.map_err(|e| Error::io(&path, e))?;
        let meta = file.metadata().await.map_err(|e| Error::io(&path, e))?;
        if meta.is_dir() {
            return Err(Error::IsDirectory { path });
        }

        let inner = stream::try_unfold(file.take(meta.len()), next_chunk).boxed();

        Ok(Self {
            path,
            len: meta.len(),
            inner,
        })
    }

    /// File size observed when the stream was opened.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drains the stream into memory.
    pub async fn collect_bytes(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.len as usize);
        while let Some(chunk) = self.inner.next().await {
            let chunk = chunk.map_err(|e| Error::io(&self.path, e))?;
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    pub fn into_stream(self) -> ByteStream {
        self.inner
    }
}

async fn next_chunk(mut file: Take<File>) -> io::Result<Option<(Bytes, Take<File>)>> {
    let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
    let n = file.read_buf(&mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some((buf.freeze(), file)))
}

impl Stream for FileStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl fmt::Debug for FileStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStream")
            .field("path", &self.path)
            .field("len", &self.len)
            .finish()
    }
}
