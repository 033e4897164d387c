//! Error types shared by the file layer and the response pipeline.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while touching files or answering a request.
#[derive(Error, Debug)]
pub enum Error {
    /// Target path does not exist
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Target path exists but the process may not use it the requested way
    #[error("permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    /// A file was expected but the path names a directory
    #[error("is a directory: {}", path.display())]
    IsDirectory { path: PathBuf },

    /// Any other I/O failure
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Waiting for a path lock took longer than the configured limit
    #[error("timed out after {waited:?} waiting for lock on {key}")]
    LockTimeout { key: String, waited: Duration },

    /// A structured-data file could not be encoded or decoded
    #[error("malformed structured data in {}: {source}", path.display())]
    Structured {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An API request body was not valid structured data
    #[error("malformed request body: {0}")]
    MalformedBody(#[source] serde_json::Error),

    /// Delimited row decode/encode failure
    #[error("row codec error on {}: {source}", path.display())]
    Rows {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Remote fetch failed; the partial destination has been removed
    #[error("transfer from {url} failed: {source}")]
    TransportFailure {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A registered API handler returned an error
    #[error("api handler for {route} failed: {source}")]
    Handler {
        route: String,
        #[source]
        source: anyhow::Error,
    },

    /// A streamed response body failed while being read
    #[error("response body source failed: {0}")]
    BodySource(#[source] io::Error),

    /// Writing to the client connection failed
    #[error("connection write failed: {0}")]
    Connection(#[source] io::Error),
}

impl Error {
    /// Classifies an I/O error raised while operating on `path`.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match source.kind() {
            io::ErrorKind::NotFound => Error::NotFound { path },
            io::ErrorKind::PermissionDenied => Error::PermissionDenied { path },
            _ => Error::Io { path, source },
        }
    }

    /// True for the errors an existence/permission probe recovers from.
    pub fn is_missing_or_denied(&self) -> bool {
        matches!(self, Error::NotFound { .. } | Error::PermissionDenied { .. })
    }

    /// True when the path cannot name a usable file: missing, denied, a
    /// non-directory used as a directory, or a name the OS rejects.
    pub fn is_unresolvable_path(&self) -> bool {
        match self {
            Error::NotFound { .. } | Error::PermissionDenied { .. } | Error::IsDirectory { .. } => true,
            Error::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::NotADirectory | io::ErrorKind::InvalidInput | io::ErrorKind::InvalidFilename
            ),
            _ => false,
        }
    }
}
