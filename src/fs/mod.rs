//! Path-locked file layer.
//!
//! - **`lock`**: per-path shared/exclusive locks ([`LockManager`])
//! - **`access`**: file operations scoped by those locks ([`FileAccess`])
//! - **`reactive`**: deferred wrappers plus unlocked streaming operations ([`ReactiveFs`])
//! - **`stream`**, **`rows`**, **`download`**: the streaming operations themselves

pub mod access;
pub mod download;
pub mod lock;
pub mod reactive;
pub mod rows;
pub mod stream;

pub use access::{AccessMode, FileAccess};
pub use lock::{LockGuard, LockKey, LockManager, LockMode};
pub use reactive::{Cold, ReactiveFs};
pub use rows::{Row, RowOptions};
pub use stream::{ByteStream, FileStream};
