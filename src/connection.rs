//! Per-connection context.
//!
//! [`Connection`] owns both ends of one client connection, the request
//! currently being served, and the active [`ResponseSink`]. It starts on
//! the buffered HTTP path and swaps to raw passthrough at most once, when
//! a WebSocket handshake succeeds. The swap is never reverted.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::ResponseError;
use crate::http::{BufferedHttpSink, RawPassthroughSink, Request, ResponseSink, SinkKind};

/// Protocol version used for responses when no request has been read.
const DEFAULT_VERSION: &str = "HTTP/1.1";

/// State of one client connection.
///
/// `R` is the buffered read half and `W` the write half. They are kept
/// separate so the handshake can read the nonce while responses are
/// written through the sink.
#[derive(Debug)]
pub struct Connection<R, W> {
    reader: R,
    writer: W,
    request: Option<Request>,
    sink: Box<dyn ResponseSink>,
    upgraded: bool,
    close_connection: bool,
}

impl<R, W> Connection<R, W>
where
    W: AsyncWrite + Unpin,
{
    /// Wraps a reader/writer pair on the buffered HTTP path.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            request: None,
            sink: Box::new(BufferedHttpSink::new()),
            upgraded: false,
            close_connection: false,
        }
    }

    /// Installs the next request and, before upgrade, a fresh buffered sink.
    pub fn begin_request(&mut self, request: Request) {
        if !request.keep_alive() {
            self.close_connection = true;
        }
        self.request = Some(request);
        if !self.upgraded {
            self.sink = Box::new(BufferedHttpSink::new());
        }
    }

    /// Prepares a final error response for a head that could not be read.
    ///
    /// Clears the current request, installs a fresh buffered sink and marks
    /// the connection for close.
    pub fn begin_error_response(&mut self) {
        self.request = None;
        self.close_connection = true;
        if !self.upgraded {
            self.sink = Box::new(BufferedHttpSink::new());
        }
    }

    /// Request currently being served.
    #[must_use]
    pub const fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    /// Read half, positioned right after the current request head.
    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Switches the response path to raw passthrough and sets the upgraded flag.
    ///
    /// Returns `false` if the connection was already upgraded; the sink is
    /// swapped only on the first call.
    pub fn upgrade(&mut self) -> bool {
        if self.upgraded {
            return false;
        }
        self.sink = Box::new(RawPassthroughSink::new());
        self.upgraded = true;
        self.close_connection = true;
        true
    }

    /// Returns `true` once the handshake has succeeded.
    #[must_use]
    pub const fn is_upgraded(&self) -> bool {
        self.upgraded
    }

    /// Response path currently in effect.
    #[must_use]
    pub fn sink_kind(&self) -> SinkKind {
        self.sink.kind()
    }

    /// Returns `true` once the current response head is on the wire.
    #[must_use]
    pub fn headers_sent(&self) -> bool {
        self.sink.headers_sent()
    }

    /// Flags the connection to close after the current response.
    pub fn mark_close(&mut self) {
        self.close_connection = true;
    }

    /// Returns `true` if no further request may be served.
    #[must_use]
    pub fn should_close(&self) -> bool {
        self.close_connection || self.sink.requires_close()
    }

    /// Starts a response through the active sink.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError`] if the sink rejects the head or the write fails.
    pub async fn start_response(
        &mut self,
        status: &str,
        headers: &[(String, String)],
    ) -> Result<(), ResponseError> {
        let version = self
            .request
            .as_ref()
            .map_or(DEFAULT_VERSION, Request::http_version);
        let mut out = Vec::new();
        self.sink.start_response(version, status, headers, &mut out)?;
        self.send(&out).await
    }

    /// Writes body bytes through the active sink.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError`] if the sink rejects the write or the transport fails.
    pub async fn write(&mut self, data: &[u8]) -> Result<(), ResponseError> {
        let mut out = Vec::new();
        self.sink.write(data, &mut out)?;
        self.send(&out).await
    }

    /// Completes the current response and flushes the writer.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError`] if the sink cannot finish or the flush fails.
    pub async fn finish_response(&mut self) -> Result<(), ResponseError> {
        let mut out = Vec::new();
        self.sink.finish(&mut out)?;
        if !out.is_empty() {
            self.writer.write_all(&out).await?;
        }
        self.writer.flush().await?;
        Ok(())
    }

    /// Flushes and shuts down the write half.
    ///
    /// # Errors
    ///
    /// Returns the transport error, if any.
    pub async fn shutdown(&mut self) -> std::io::Result<()> {
        self.writer.flush().await?;
        self.writer.shutdown().await
    }

    /// Consumes the context, returning the reader and writer.
    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }

    async fn send(&mut self, out: &[u8]) -> Result<(), ResponseError> {
        if !out.is_empty() {
            self.writer.write_all(out).await?;
        }
        if self.sink.kind() == SinkKind::RawPassthrough {
            self.writer.flush().await?;
        }
        Ok(())
    }
}
