use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::fs::stream;
use crate::http::mime;
use crate::http::parser::{ParseError, parse_http_request};
use crate::http::request::Request;
use crate::http::response::{ResponseBuilder, StatusCode};
use crate::http::writer::ResponseWriter;
use crate::www::WwwServer;

/// Requests larger than this (head plus body) are rejected.
const MAX_REQUEST_BYTES: usize = 8 * 1024 * 1024;

pub struct Connection<S> {
    stream: S,
    buffer: BytesMut,
    state: ConnectionState,
    server: Arc<WwwServer>,
}

pub enum ConnectionState {
    Reading,
    Processing(Request, Bytes),
    Closed,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, server: Arc<WwwServer>) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(4096),
            state: ConnectionState::Reading,
            server,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => match self.read_request().await? {
                    Some((req, body)) => {
                        self.state = ConnectionState::Processing(req, body);
                    }
                    None => {
                        self.state = ConnectionState::Closed;
                    }
                },

                ConnectionState::Processing(req, body) => {
                    let keep_alive = req.keep_alive();

                    match self.server.handle(&req, stream::once(body), &mut self.stream).await {
                        Ok(outcome) if keep_alive && !outcome.close => {
                            self.state = ConnectionState::Reading; // go back for next request
                        }
                        Ok(_) => {
                            self.state = ConnectionState::Closed;
                        }
                        Err(e) => {
                            // The head may already be on the wire; the only safe
                            // way out is to drop the connection.
                            tracing::warn!(
                                method = %req.method,
                                path = %req.path,
                                error = %e,
                                "request failed, closing connection"
                            );
                            self.state = ConnectionState::Closed;
                        }
                    }
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        self.stream.shutdown().await.ok();
        Ok(())
    }

    pub async fn read_request(&mut self) -> anyhow::Result<Option<(Request, Bytes)>> {
        loop {
            // Try parsing whatever we already have
            match parse_http_request(&self.buffer) {
                Ok((request, body, consumed)) => {
                    // Remove consumed bytes
                    let _ = self.buffer.split_to(consumed);
                    return Ok(Some((request, body)));
                }

                Err(ParseError::Incomplete) => {
                    // Need more data → fall through to read
                }

                Err(e) => {
                    // Malformed request → protocol error
                    self.reject().await;
                    return Err(anyhow::anyhow!("HTTP parse error: {:?}", e));
                }
            }

            if self.buffer.len() > MAX_REQUEST_BYTES {
                self.reject().await;
                anyhow::bail!("request exceeds {} bytes", MAX_REQUEST_BYTES);
            }

            // Read more data
            let n = self.stream.read_buf(&mut self.buffer).await?;

            if n == 0 {
                // Client closed connection
                return Ok(None);
            }
        }
    }

    /// Best-effort 400 before dropping a connection that sent garbage.
    async fn reject(&mut self) {
        let response = ResponseBuilder::new(StatusCode::BadRequest)
            .content_type(mime::TEXT_PLAIN)
            .body(&b"400 Bad Request"[..])
            .build();
        if let Err(e) = ResponseWriter::new(&mut self.stream).send(response).await {
            tracing::debug!(error = %e, "could not send 400");
        }
    }
}
