//! Gateway error types.
//!
//! [`HandshakeError`] is the central error type for the upgrade path. Only
//! [`HandshakeError::MissingKey`] is recovered with an HTTP response (see
//! [`HandshakeError::rejection`]); every other variant ends the connection.

use axum::http::StatusCode;

/// Body sent with the `400` answer to a draft-76 request without both keys.
pub const MISSING_KEYS_MESSAGE: &str = "Client using old/invalid protocol implementation";

/// Failure while negotiating a legacy WebSocket handshake.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    /// A challenge key's digits are not an integral multiple of its spaces.
    #[error("key_number {key_number} is not an integral multiple of spaces {spaces}")]
    MalformedKey {
        /// Integer formed by concatenating the key's digits.
        key_number: u64,
        /// Number of ASCII spaces in the key.
        spaces: u64,
    },

    /// A challenge key does not decode to a 32-bit value.
    #[error("challenge key out of range: {0}")]
    KeyOutOfRange(String),

    /// A draft-76 request lacks one of its challenge keys.
    #[error("missing challenge key header {0}")]
    MissingKey(&'static str),

    /// The connection closed before the full nonce arrived.
    #[error("short read: expected {expected} nonce bytes, received {received}")]
    ShortRead {
        /// Bytes the handshake requires.
        expected: usize,
        /// Bytes received before end of stream.
        received: usize,
    },

    /// The request passed the upgrade gate but neither draft can serve it.
    #[error("version not supported: {0}")]
    UnsupportedVersion(String),

    /// Writing the handshake response failed.
    #[error(transparent)]
    Response(#[from] ResponseError),

    /// Transport failure while reading from the client.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HandshakeError {
    /// Returns the HTTP answer for kinds that are recovered with a response.
    ///
    /// `None` means the connection is closed without writing anything.
    #[must_use]
    pub const fn rejection(&self) -> Option<(StatusCode, &'static str)> {
        match self {
            Self::MissingKey(_) => Some((StatusCode::BAD_REQUEST, MISSING_KEYS_MESSAGE)),
            _ => None,
        }
    }

    /// Stable label used in log fields.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MalformedKey { .. } => "malformed_key",
            Self::KeyOutOfRange(_) => "key_out_of_range",
            Self::MissingKey(_) => "missing_key",
            Self::ShortRead { .. } => "short_read",
            Self::UnsupportedVersion(_) => "unsupported_version",
            Self::Response(_) => "response",
            Self::Io(_) => "io",
        }
    }
}

/// Failure while emitting a response through a sink.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    /// Status line is not `<3-digit code> <reason>`.
    #[error("invalid status line: {0:?}")]
    InvalidStatus(String),

    /// Header name or value is not valid HTTP.
    #[error("invalid header: {0:?}")]
    InvalidHeader(String),

    /// `start_response` was called after the head went out.
    #[error("response headers already sent")]
    HeadersAlreadySent,

    /// Transport failure while writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure while reading an HTTP request head.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Request line or header line could not be parsed.
    #[error("malformed request: {0}")]
    Malformed(String),

    /// Request head exceeded the configured byte limit.
    #[error("request head exceeds {0} bytes")]
    HeadTooLarge(usize),

    /// Transport failure while reading.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RequestError {
    /// Status to answer with before closing, when the client can still be told.
    #[must_use]
    pub const fn rejection(&self) -> Option<StatusCode> {
        match self {
            Self::Malformed(_) => Some(StatusCode::BAD_REQUEST),
            Self::HeadTooLarge(_) => Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE),
            Self::Io(_) => None,
        }
    }
}

/// Any failure that terminates a connection task.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Reading the request failed.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The handshake failed.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// Writing a response failed.
    #[error(transparent)]
    Response(#[from] ResponseError),

    /// A bounded phase did not complete in time.
    #[error("timed out after {0} s")]
    Timeout(u64),

    /// Transport failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_missing_key_is_rejected_with_a_response() {
        let missing = HandshakeError::MissingKey("Sec-WebSocket-Key1");
        assert_eq!(
            missing.rejection(),
            Some((StatusCode::BAD_REQUEST, MISSING_KEYS_MESSAGE))
        );

        let short = HandshakeError::ShortRead {
            expected: 8,
            received: 3,
        };
        assert_eq!(short.rejection(), None);
        assert_eq!(
            HandshakeError::UnsupportedVersion("no host".to_string()).rejection(),
            None
        );
    }

    #[test]
    fn unreadable_requests_map_to_client_errors() {
        assert_eq!(
            RequestError::Malformed("bad".to_string()).rejection(),
            Some(StatusCode::BAD_REQUEST)
        );
        assert_eq!(
            RequestError::HeadTooLarge(16).rejection(),
            Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE)
        );
        let io = RequestError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionReset));
        assert_eq!(io.rejection(), None);
    }

    #[test]
    fn malformed_key_reports_number_and_spaces() {
        let err = HandshakeError::MalformedKey {
            key_number: 17,
            spaces: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("17"));
        assert!(msg.contains('3'));
        assert_eq!(err.kind(), "malformed_key");
    }
}
