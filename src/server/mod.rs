//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and dispatches HTTP/1.1 requests to a handler
//! function. Fixed responses keep the connection alive for the next request;
//! an event-stream response takes the connection over until one side ends it.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};
use crate::realtime::EventStream;

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Maximum size of a complete HTTP request we will buffer before rejecting it (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// How an event stream came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    /// The client went away.
    PeerClosed,
    /// The server finalized the stream itself.
    Finished,
}

/// The HTTP server.
///
/// Binds to a TCP address and dispatches incoming HTTP/1.1 requests to a
/// handler function.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts accepting connections and dispatching requests to `handler`.
    ///
    /// The handler receives a [`Request`] and must return a [`Future`] that
    /// resolves to a [`Response`]. The handler is wrapped in an [`Arc`] and
    /// shared across all spawned Tokio tasks, so it must be `Send + Sync + 'static`.
    ///
    /// This method runs until the process is terminated.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn run<H, F>(self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        let handler = Arc::new(handler);
        info!(address = %self.local_addr, "server listening");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let handler = Arc::clone(&handler);

            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, peer_addr, handler).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Serves one client connection over its lifetime.
///
/// HTTP/1.1 connections are persistent by default: we loop, reading one
/// request per iteration, until the peer closes the connection, signals
/// `Connection: close`, or receives an event stream. An event stream is
/// written frame by frame until the stream is finalized or the peer
/// disconnects; either way the stream's connection is closed and the
/// transport is shut down.
///
/// Generic over the transport so it can run on anything byte-stream shaped,
/// not only a `TcpStream`.
///
/// # Errors
///
/// Returns the I/O error that ended the connection, if any. A client that
/// disconnects while an event stream is open, including one whose departure
/// surfaces as a failed write, ends the connection normally.
pub async fn serve_connection<S, H, F>(
    stream: S,
    peer_addr: SocketAddr,
    handler: Arc<H>,
) -> Result<(), std::io::Error>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
    H: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        let bytes_read = reader.read_buf(&mut buf).await?;

        if bytes_read == 0 {
            debug!(peer = %peer_addr, "connection closed by peer");
            break;
        }

        // Guard against excessively large requests.
        if buf.len() > MAX_REQUEST_SIZE {
            warn!(peer = %peer_addr, "request too large — sending 413");
            let response = Response::new(StatusCode::PayloadTooLarge)
                .body("Request entity too large")
                .keep_alive(false);
            writer.write_all(&response.into_parts().0).await?;
            break;
        }

        let (request, body_offset) = match Request::parse(&buf) {
            Ok(pair) => pair,
            Err(RequestError::Incomplete) => continue,
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "bad request — sending 400");
                let response = Response::new(StatusCode::BadRequest)
                    .body(format!("Bad Request: {e}"))
                    .keep_alive(false);
                writer.write_all(&response.into_parts().0).await?;
                break;
            }
        };

        // Wait for the full body to arrive if Content-Length is set.
        let content_length = request.content_length().unwrap_or(0);
        let total_needed = match body_offset.checked_add(content_length) {
            Some(total) if content_length <= MAX_REQUEST_SIZE => total,
            _ => {
                warn!(peer = %peer_addr, content_length, "declared body too large — sending 413");
                let response = Response::new(StatusCode::PayloadTooLarge)
                    .body("Request entity too large")
                    .keep_alive(false);
                writer.write_all(&response.into_parts().0).await?;
                break;
            }
        };
        if buf.len() < total_needed {
            continue;
        }

        let keep_alive = request.is_keep_alive();

        debug!(
            peer = %peer_addr,
            method = %request.method(),
            path = %request.path(),
            "dispatching request"
        );

        let response = handler(request).await;
        let (head, events) = response.into_parts();
        writer.write_all(&head).await?;
        writer.flush().await?;

        // Drop the consumed request bytes from the buffer.
        let _ = buf.split_to(total_needed);

        if let Some(mut events) = events {
            let outcome = pump_events(&mut reader, &mut writer, &mut events, &mut buf).await;
            events.close();
            match &outcome {
                Ok(StreamEnd::PeerClosed) => {
                    info!(peer = %peer_addr, connection_id = %events.id(), "client closed event stream");
                }
                Ok(StreamEnd::Finished) => {
                    info!(peer = %peer_addr, connection_id = %events.id(), "event stream finished");
                }
                Err(e) => {
                    info!(peer = %peer_addr, connection_id = %events.id(), error = %e, "event stream write failed");
                }
            }
            // A write failure here means the peer went away mid-stream.
            break;
        }

        if !keep_alive {
            debug!(peer = %peer_addr, "Connection: close — shutting down");
            break;
        }
    }

    // The peer may already be gone; nothing left to report either way.
    let _ = writer.shutdown().await;
    Ok(())
}

/// Copies frames from `events` to the client until the stream is finalized
/// or the client disconnects.
///
/// Anything the client sends while the stream is open is discarded; a read
/// of zero bytes or a read error means the client has gone away.
async fn pump_events<R, W>(
    reader: &mut R,
    writer: &mut W,
    events: &mut EventStream,
    scratch: &mut BytesMut,
) -> Result<StreamEnd, std::io::Error>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            frame = events.next_frame() => match frame {
                Some(frame) => {
                    writer.write_all(&frame).await?;
                    writer.flush().await?;
                }
                None => return Ok(StreamEnd::Finished),
            },
            read = reader.read_buf(scratch) => match read {
                Ok(0) | Err(_) => return Ok(StreamEnd::PeerClosed),
                Ok(_) => scratch.clear(),
            },
        }
    }
}
