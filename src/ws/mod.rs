//! WebSocket layer: the upgraded socket handed to applications.
//!
//! After a successful handshake the connection carries raw bytes in both
//! directions. Frame parsing is left to the [`handler::Application`];
//! [`WebSocket`] only exposes the negotiated parameters and the raw
//! reader/writer.

pub mod connection;
pub mod handler;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncReadExt, AsyncWrite};

use crate::connection::Connection;
use crate::error::ResponseError;
use crate::handshake::{Draft, HandshakeRequest};

/// Parameters negotiated by the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebSocketInfo {
    /// Draft the client spoke.
    pub draft: Draft,
    /// Client `Origin`.
    pub origin: String,
    /// Requested sub-protocol, empty when none.
    pub protocol: String,
    /// Client `Host`.
    pub host: String,
    /// Request path without query.
    pub path: String,
}

impl WebSocketInfo {
    pub(crate) fn new(draft: Draft, request: HandshakeRequest) -> Self {
        Self {
            draft,
            origin: request.origin,
            protocol: request.protocol,
            host: request.host.unwrap_or_default(),
            path: request.path,
        }
    }
}

/// An upgraded connection, borrowed for the application's lifetime.
#[derive(Debug)]
pub struct WebSocket<'a, R, W> {
    info: WebSocketInfo,
    conn: &'a mut Connection<R, W>,
}

impl<'a, R, W> WebSocket<'a, R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Wraps an upgraded connection.
    pub fn new(conn: &'a mut Connection<R, W>, info: WebSocketInfo) -> Self {
        Self { info, conn }
    }

    /// Negotiated handshake parameters.
    #[must_use]
    pub const fn info(&self) -> &WebSocketInfo {
        &self.info
    }

    /// Reads raw bytes from the client. `Ok(0)` means the client closed.
    ///
    /// # Errors
    ///
    /// Returns the transport error, if any.
    pub async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.conn.reader_mut().read(buf).await
    }

    /// Writes raw bytes to the client through the passthrough path.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError::Io`] on transport failure.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), ResponseError> {
        self.conn.write(data).await
    }

    /// Writes a literal status line and header block.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError::Io`] on transport failure.
    pub async fn start_response(
        &mut self,
        status: &str,
        headers: &[(String, String)],
    ) -> Result<(), ResponseError> {
        self.conn.start_response(status, headers).await
    }
}
