use std::collections::HashMap;
use std::io;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::http::response::{Body, ResponseDescriptor, StatusCode};

const HTTP_VERSION: &str = "HTTP/1.1";

/// Headers the writer owns; copies in a descriptor's extra headers are dropped.
const MANAGED_HEADERS: [&str; 3] = ["Content-Type", "Content-Length", "Connection"];

/// Everything that goes into a response head.
#[derive(Debug, Clone, Copy)]
pub struct Head<'h> {
    pub status: StatusCode,
    pub content_type: Option<&'h str>,
    pub headers: &'h HashMap<String, String>,
    /// `None` means the body runs until the connection closes
    pub content_length: Option<u64>,
}

fn serialize_head(head: &Head<'_>) -> Vec<u8> {
    let mut buf = Vec::new();

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        head.status.as_u16(),
        head.status.reason_phrase().unwrap_or("")
    );
    buf.extend_from_slice(status_line.as_bytes());

    if let Some(content_type) = head.content_type {
        buf.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
    }

    for (k, v) in head.headers {
        if MANAGED_HEADERS.iter().any(|m| m.eq_ignore_ascii_case(k)) {
            continue;
        }
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    match head.content_length {
        Some(len) => buf.extend_from_slice(format!("Content-Length: {}\r\n", len).as_bytes()),
        None => buf.extend_from_slice(b"Connection: close\r\n"),
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf
}

/// What was committed to the connection for one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendSummary {
    pub status: StatusCode,
    /// Body bytes written, head excluded
    pub bytes_written: u64,
    /// The connection must close after this response
    pub close: bool,
}

/// Response sink before the head is written.
///
/// [`write_head`](Self::write_head) consumes the writer, so a second head
/// cannot be written and no body byte can precede the head.
pub struct ResponseWriter<'a, W> {
    sink: &'a mut W,
}

/// Response sink after the head is written.
///
/// With a declared length, bytes past it are dropped and a body that ends
/// short marks the connection for closing.
pub struct BodyWriter<'a, W> {
    sink: &'a mut W,
    status: StatusCode,
    declared: Option<u64>,
    written: u64,
    close: bool,
}

impl<'a, W: AsyncWrite + Unpin> ResponseWriter<'a, W> {
    pub fn new(sink: &'a mut W) -> Self {
        Self { sink }
    }

    pub async fn write_head(self, head: Head<'_>) -> Result<BodyWriter<'a, W>> {
        let bytes = serialize_head(&head);
        self.sink.write_all(&bytes).await.map_err(Error::Connection)?;

        Ok(BodyWriter {
            sink: self.sink,
            status: head.status,
            declared: head.content_length,
            written: 0,
            close: head.content_length.is_none(),
        })
    }

    /// Writes only the head a [`send`](Self::send) of `descriptor` would
    /// write, as a `HEAD` request expects.
    pub async fn send_head(self, descriptor: ResponseDescriptor) -> Result<SendSummary> {
        let content_length = match &descriptor.body {
            Body::Empty | Body::File(_) => Some(0),
            Body::Bytes(bytes) => Some(bytes.len() as u64),
            Body::Stream(_) => None,
        };
        let head = Head {
            status: descriptor.status,
            content_type: descriptor.content_type.as_deref(),
            headers: &descriptor.headers,
            content_length,
        };
        self.write_head(head).await?.skip_body().await
    }

    /// Commits a descriptor whose body is already in memory or generated.
    ///
    /// File bodies are not opened here; a file body reaching this point is
    /// sent as an empty payload.
    pub async fn send(self, descriptor: ResponseDescriptor) -> Result<SendSummary> {
        let ResponseDescriptor {
            status,
            content_type,
            body,
            headers,
        } = descriptor;

        let head = |content_length| Head {
            status,
            content_type: content_type.as_deref(),
            headers: &headers,
            content_length,
        };

        match body {
            Body::Empty => self.write_head(head(Some(0))).await?.finish().await,
            Body::File(path) => {
                tracing::debug!(path = %path.display(), %status, "file body not streamed for this status");
                self.write_head(head(Some(0))).await?.finish().await
            }
            Body::Bytes(bytes) => {
                let mut body = self.write_head(head(Some(bytes.len() as u64))).await?;
                body.write_chunk(&bytes).await?;
                body.finish().await
            }
            Body::Stream(stream) => {
                let mut body = self.write_head(head(None)).await?;
                body.stream(stream).await?;
                body.finish().await
            }
        }
    }
}

impl<W: AsyncWrite + Unpin> BodyWriter<'_, W> {
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let chunk = match self.declared {
            Some(declared) if self.written + chunk.len() as u64 > declared => {
                tracing::warn!(declared, written = self.written, "body overruns Content-Length, truncating");
                self.close = true;
                &chunk[..(declared - self.written) as usize]
            }
            _ => chunk,
        };

        self.sink.write_all(chunk).await.map_err(Error::Connection)?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Pipes every chunk of `stream` to the connection.
    pub async fn stream<S>(&mut self, mut stream: S) -> Result<()>
    where
        S: Stream<Item = io::Result<Bytes>> + Unpin,
    {
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(Error::BodySource)?;
            self.write_chunk(&chunk).await?;
        }
        Ok(())
    }

    pub async fn finish(mut self) -> Result<SendSummary> {
        if let Some(declared) = self.declared {
            if self.written < declared {
                tracing::warn!(declared, written = self.written, "body ended short of Content-Length");
                self.close = true;
            }
        }
        self.skip_body().await
    }

    /// Completes the response without checking the body against the
    /// declared length.
    pub async fn skip_body(self) -> Result<SendSummary> {
        self.sink.flush().await.map_err(Error::Connection)?;
        Ok(SendSummary {
            status: self.status,
            bytes_written: self.written,
            close: self.close,
        })
    }
}
