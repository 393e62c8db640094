//! Response sinks: the two ways a connection can turn `start_response` and
//! `write` calls into bytes on the wire.
//!
//! A sink only encodes. It appends wire bytes to an output buffer and the
//! owning [`crate::connection::Connection`] writes them to the socket, so
//! a sink never touches the transport itself.
//!
//! - [`BufferedHttpSink`] is the normal HTTP/1.x path: it validates the
//!   status line and headers, holds the head back until the first body
//!   write, and frames the body with `Content-Length` or chunked encoding.
//! - [`RawPassthroughSink`] is installed once a WebSocket handshake
//!   succeeds: the head is serialized literally and body bytes pass
//!   through unmodified.

use std::fmt;

use axum::http::{HeaderName, HeaderValue, StatusCode};

use crate::error::ResponseError;

/// Which response path a sink implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// Validated, length- or chunk-framed HTTP responses.
    BufferedHttp,
    /// Literal passthrough to the raw socket.
    RawPassthrough,
}

/// Encodes response operations into wire bytes.
pub trait ResponseSink: fmt::Debug + Send {
    /// Records or emits a status line and header block.
    ///
    /// `version` is the request's protocol version, `status` the full
    /// status text such as `"101 Web Socket Protocol Handshake"`.
    ///
    /// # Errors
    ///
    /// Implementations may reject invalid input or a repeated head.
    fn start_response(
        &mut self,
        version: &str,
        status: &str,
        headers: &[(String, String)],
        out: &mut Vec<u8>,
    ) -> Result<(), ResponseError>;

    /// Encodes body bytes.
    ///
    /// # Errors
    ///
    /// Implementations may refuse a write before `start_response`.
    fn write(&mut self, data: &[u8], out: &mut Vec<u8>) -> Result<(), ResponseError>;

    /// Completes the current response.
    ///
    /// # Errors
    ///
    /// Implementations may refuse to finish a response that never started.
    fn finish(&mut self, out: &mut Vec<u8>) -> Result<(), ResponseError>;

    /// Returns `true` once the status line and headers are on the wire.
    fn headers_sent(&self) -> bool;

    /// Returns `true` if the framing chosen forces the connection closed.
    fn requires_close(&self) -> bool;

    /// Identifies the response path.
    fn kind(&self) -> SinkKind;
}

/// How the body of a buffered response is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Length,
    Chunked,
    CloseDelimited,
}

/// Head recorded by `start_response` and not yet written.
#[derive(Debug)]
struct PendingHead {
    version: String,
    status: String,
    headers: Vec<(String, String)>,
}

/// The normal HTTP/1.x response path.
///
/// The gateway's own responses always carry `Content-Length`. Chunked and
/// close-delimited framing serve applications that stream a response
/// through the connection before any upgrade.
#[derive(Debug, Default)]
pub struct BufferedHttpSink {
    pending: Option<PendingHead>,
    framing: Option<Framing>,
    headers_sent: bool,
    finished: bool,
}

impl BufferedHttpSink {
    /// Creates a sink for one response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes the pending head, choosing the body framing.
    fn emit_head(&mut self, out: &mut Vec<u8>, has_body: bool) -> Result<(), ResponseError> {
        let Some(mut head) = self.pending.take() else {
            return Err(ResponseError::InvalidStatus(
                "body written before start_response".to_string(),
            ));
        };

        let has_length = head
            .headers
            .iter()
            .any(|(n, _)| n.eq_ignore_ascii_case("content-length"));
        let framing = if has_length {
            Framing::Length
        } else if !has_body {
            head.headers
                .push(("Content-Length".to_string(), "0".to_string()));
            Framing::Length
        } else if head.version == "HTTP/1.0" {
            Framing::CloseDelimited
        } else {
            head.headers
                .push(("Transfer-Encoding".to_string(), "chunked".to_string()));
            Framing::Chunked
        };

        encode_head(&head.version, &head.status, &head.headers, out);
        self.framing = Some(framing);
        self.headers_sent = true;
        Ok(())
    }
}

impl ResponseSink for BufferedHttpSink {
    fn start_response(
        &mut self,
        version: &str,
        status: &str,
        headers: &[(String, String)],
        _out: &mut Vec<u8>,
    ) -> Result<(), ResponseError> {
        if self.headers_sent || self.pending.is_some() {
            return Err(ResponseError::HeadersAlreadySent);
        }
        validate_status(status)?;
        for (name, value) in headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err()
                || HeaderValue::from_str(value).is_err()
            {
                return Err(ResponseError::InvalidHeader(format!("{name}: {value}")));
            }
        }
        self.pending = Some(PendingHead {
            version: version.to_string(),
            status: status.to_string(),
            headers: headers.to_vec(),
        });
        Ok(())
    }

    fn write(&mut self, data: &[u8], out: &mut Vec<u8>) -> Result<(), ResponseError> {
        if !self.headers_sent {
            self.emit_head(out, true)?;
        }
        if data.is_empty() {
            return Ok(());
        }
        match self.framing {
            Some(Framing::Chunked) => {
                out.extend_from_slice(format!("{:x}\r\n", data.len()).as_bytes());
                out.extend_from_slice(data);
                out.extend_from_slice(b"\r\n");
            }
            _ => out.extend_from_slice(data),
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<u8>) -> Result<(), ResponseError> {
        if self.finished {
            return Ok(());
        }
        if !self.headers_sent {
            self.emit_head(out, false)?;
        }
        if self.framing == Some(Framing::Chunked) {
            out.extend_from_slice(b"0\r\n\r\n");
        }
        self.finished = true;
        Ok(())
    }

    fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    fn requires_close(&self) -> bool {
        self.framing == Some(Framing::CloseDelimited)
    }

    fn kind(&self) -> SinkKind {
        SinkKind::BufferedHttp
    }
}

/// Literal passthrough used after a successful upgrade.
#[derive(Debug, Default)]
pub struct RawPassthroughSink {
    headers_sent: bool,
}

impl RawPassthroughSink {
    /// Creates a passthrough sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResponseSink for RawPassthroughSink {
    fn start_response(
        &mut self,
        version: &str,
        status: &str,
        headers: &[(String, String)],
        out: &mut Vec<u8>,
    ) -> Result<(), ResponseError> {
        encode_head(version, status, headers, out);
        self.headers_sent = true;
        Ok(())
    }

    fn write(&mut self, data: &[u8], out: &mut Vec<u8>) -> Result<(), ResponseError> {
        out.extend_from_slice(data);
        Ok(())
    }

    fn finish(&mut self, _out: &mut Vec<u8>) -> Result<(), ResponseError> {
        Ok(())
    }

    fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    fn requires_close(&self) -> bool {
        true
    }

    fn kind(&self) -> SinkKind {
        SinkKind::RawPassthrough
    }
}

/// Serializes `"<version> <status>\r\n"`, one line per header, and the
/// blank line, in the order given.
fn encode_head(version: &str, status: &str, headers: &[(String, String)], out: &mut Vec<u8>) {
    out.extend_from_slice(format!("{version} {status}\r\n").as_bytes());
    for (name, value) in headers {
        out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }
    out.extend_from_slice(b"\r\n");
}

/// Checks a `"<code> <reason>"` status line.
fn validate_status(status: &str) -> Result<(), ResponseError> {
    let (code, reason) = status.split_once(' ').unwrap_or((status, ""));
    if code.len() != 3 || StatusCode::from_bytes(code.as_bytes()).is_err() {
        return Err(ResponseError::InvalidStatus(status.to_string()));
    }
    if reason.contains(['\r', '\n']) {
        return Err(ResponseError::InvalidStatus(status.to_string()));
    }
    Ok(())
}
