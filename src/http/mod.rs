//! HTTP/1.1 plumbing for the www front end.
//!
//! - **`connection`**: per-connection state machine feeding requests to [`crate::www::WwwServer`]
//! - **`parser`**: parses request heads and Content-Length bodies from byte buffers
//! - **`request`**: request head representation
//! - **`response`**: status codes, response descriptors and their builder
//! - **`writer`**: writes the head once, then the body
//! - **`mime`**: content types by file extension
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Wait for incoming request data
//!        └──────┬──────┘
//!               │ Request received
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Classify, resolve, write response
//!        └──────┬───────────┘
//!               │ Response sent
//!               ├─ Keep-Alive → Reading (same connection)
//!               └─ Close / error → Closed
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pathguard::fs::ReactiveFs;
//! use pathguard::http::connection::Connection;
//! use pathguard::www::WwwServer;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = Arc::new(WwwServer::builder(ReactiveFs::default()).root("./public").build());
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!
//!     loop {
//!         let (socket, _addr) = listener.accept().await?;
//!         let server = Arc::clone(&server);
//!         tokio::spawn(async move {
//!             let mut conn = Connection::new(socket, server);
//!             if let Err(e) = conn.run().await {
//!                 eprintln!("Connection error: {}", e);
//!             }
//!         });
//!     }
//! }
//! ```

pub mod connection;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
