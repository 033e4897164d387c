//! Pathguard - path-locked file access and a static/API web front end.
//!
//! - **`fs`**: per-path locking, locked file operations, deferred and streaming variants
//! - **`www`**: classifies requests as API calls or static assets and answers them
//! - **`http`**: HTTP/1.1 parsing, response writing and the connection loop
//! - **`server`**: TCP accept loop

pub mod config;
pub mod error;
pub mod fs;
pub mod http;
pub mod server;
pub mod www;

pub use error::{Error, Result};
