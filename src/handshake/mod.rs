//! Legacy WebSocket handshake negotiation.
//!
//! [`perform`] inspects the request installed on a [`Connection`] and
//! either leaves it untouched (not a WebSocket request), answers it with a
//! `400` (draft-76 without both keys), or writes the draft-75/76 `101`
//! response and switches the connection to raw passthrough.
//!
//! All validation, the nonce read and the digest happen before the first
//! response byte, so a failed handshake never leaves a partial response
//! on the wire.

pub mod challenge;
pub mod draft;
pub mod key;

use tokio::io::{AsyncBufRead, AsyncWrite};

pub use challenge::{DIGEST_LEN, NONCE_LEN, challenge_response, read_nonce};
pub use draft::{Draft, HandshakeRequest};
pub use key::parse_key;

use crate::connection::Connection;
use crate::error::HandshakeError;
use crate::ws::WebSocketInfo;

/// Status line of a successful legacy handshake.
pub const HANDSHAKE_STATUS: &str = "101 Web Socket Protocol Handshake";

/// Result of running the handshake on one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// Not a WebSocket request; nothing was written.
    Passthrough,
    /// The `101` response is out and the connection is raw.
    Upgraded(WebSocketInfo),
    /// A `400` was sent and the connection is marked for close.
    Rejected(Draft),
}

/// Runs the legacy handshake on the connection's current request.
///
/// # Errors
///
/// - [`HandshakeError::UnsupportedVersion`] if the request passed the gate
///   but lacks `Host`, so no location can be announced.
/// - [`HandshakeError::MalformedKey`] / [`HandshakeError::KeyOutOfRange`]
///   for undecodable draft-76 keys.
/// - [`HandshakeError::ShortRead`] if the nonce is truncated.
/// - [`HandshakeError::Response`] / [`HandshakeError::Io`] on transport failure.
///
/// Nothing is written to the connection when an error is returned.
pub async fn perform<R, W>(
    conn: &mut Connection<R, W>,
) -> Result<HandshakeOutcome, HandshakeError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let Some(request) = conn.request().and_then(HandshakeRequest::from_request) else {
        return Ok(HandshakeOutcome::Passthrough);
    };

    let Some(location) = request.location() else {
        return Err(HandshakeError::UnsupportedVersion(
            "request has no Host header".to_string(),
        ));
    };

    match request.draft() {
        Draft::Hixie75 => respond_hixie75(conn, request, location).await,
        Draft::Hixie76 => respond_hixie76(conn, request, location).await,
    }
}

async fn respond_hixie75<R, W>(
    conn: &mut Connection<R, W>,
    request: HandshakeRequest,
    location: String,
) -> Result<HandshakeOutcome, HandshakeError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let headers = vec![
        ("Upgrade".to_string(), "WebSocket".to_string()),
        ("Connection".to_string(), "Upgrade".to_string()),
        ("WebSocket-Origin".to_string(), request.origin.clone()),
        ("WebSocket-Protocol".to_string(), request.protocol.clone()),
        ("WebSocket-Location".to_string(), location),
    ];

    conn.upgrade();
    conn.start_response(HANDSHAKE_STATUS, &headers).await?;

    Ok(HandshakeOutcome::Upgraded(WebSocketInfo::new(
        Draft::Hixie75,
        request,
    )))
}

async fn respond_hixie76<R, W>(
    conn: &mut Connection<R, W>,
    request: HandshakeRequest,
    location: String,
) -> Result<HandshakeOutcome, HandshakeError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (key1, key2) = match challenge_keys(&request) {
        Ok(keys) => keys,
        Err(err) => {
            let Some((status, message)) = err.rejection() else {
                return Err(err);
            };
            tracing::warn!(error = %err, kind = err.kind(), "rejecting draft-76 handshake");
            reject(conn, status, message).await?;
            return Ok(HandshakeOutcome::Rejected(Draft::Hixie76));
        }
    };

    let part1 = parse_key(key1)?;
    let part2 = parse_key(key2)?;
    let nonce = read_nonce(conn.reader_mut()).await?;
    let digest = challenge_response(part1, part2, &nonce);

    let headers = vec![
        ("Upgrade".to_string(), "WebSocket".to_string()),
        ("Connection".to_string(), "Upgrade".to_string()),
        ("Sec-WebSocket-Origin".to_string(), request.origin.clone()),
        ("Sec-WebSocket-Protocol".to_string(), request.protocol.clone()),
        ("Sec-WebSocket-Location".to_string(), location),
    ];

    conn.upgrade();
    conn.start_response(HANDSHAKE_STATUS, &headers).await?;
    conn.write(&digest).await?;

    Ok(HandshakeOutcome::Upgraded(WebSocketInfo::new(
        Draft::Hixie76,
        request,
    )))
}

/// Both draft-76 keys, each present and non-empty.
fn challenge_keys(request: &HandshakeRequest) -> Result<(&str, &str), HandshakeError> {
    let key1 = request
        .key1
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or(HandshakeError::MissingKey("Sec-WebSocket-Key1"))?;
    let key2 = request
        .key2
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or(HandshakeError::MissingKey("Sec-WebSocket-Key2"))?;
    Ok((key1, key2))
}

/// Sends a plaintext error with an exact `Content-Length` and marks the
/// connection for close.
async fn reject<R, W>(
    conn: &mut Connection<R, W>,
    status: axum::http::StatusCode,
    message: &str,
) -> Result<(), HandshakeError>
where
    W: AsyncWrite + Unpin,
{
    let status_line = format!(
        "{} {}",
        status.as_str(),
        status.canonical_reason().unwrap_or_default()
    );
    let headers = vec![("Content-Length".to_string(), message.len().to_string())];
    conn.mark_close();
    conn.start_response(&status_line, &headers).await?;
    conn.write(message.as_bytes()).await?;
    conn.finish_response().await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::error::MISSING_KEYS_MESSAGE;
    use crate::http::{SinkKind, read_request_head};

    async fn run(raw: &[u8]) -> (Result<HandshakeOutcome, HandshakeError>, bool, Vec<u8>) {
        let mut conn = Connection::new(raw, Vec::new());
        let Ok(Some(request)) = read_request_head(conn.reader_mut(), 8192).await else {
            panic!("expected a request head");
        };
        conn.begin_request(request);
        let outcome = perform(&mut conn).await;
        let close = conn.should_close();
        let (_, out) = conn.into_parts();
        (outcome, close, out)
    }

    const HIXIE76: &[u8] = b"GET /demo HTTP/1.1\r\n\
        Host: example.com\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key2: 12998 5 Y3 1  .P00\r\n\
        Sec-WebSocket-Protocol: sample\r\n\
        Upgrade: WebSocket\r\n\
        Sec-WebSocket-Key1: 4 @1  46546xW%0l 1 5\r\n\
        Origin: http://example.com\r\n\
        \r\n\
        ^n:ds[4U";

    #[tokio::test]
    async fn hixie75_response_is_exact() {
        let raw = b"GET /chat HTTP/1.1\r\nUpgrade: WebSocket\r\nConnection: Upgrade\r\n\
            Host: example.com\r\nOrigin: http://example.com\r\nWebSocket-Protocol: chat\r\n\r\n";
        let (outcome, close, out) = run(raw).await;
        let Ok(HandshakeOutcome::Upgraded(info)) = outcome else {
            panic!("expected upgrade, got {outcome:?}");
        };
        assert_eq!(info.draft, Draft::Hixie75);
        assert_eq!(info.path, "/chat");
        assert!(close);
        assert_eq!(
            out,
            b"HTTP/1.1 101 Web Socket Protocol Handshake\r\n\
              Upgrade: WebSocket\r\n\
              Connection: Upgrade\r\n\
              WebSocket-Origin: http://example.com\r\n\
              WebSocket-Protocol: chat\r\n\
              WebSocket-Location: ws://example.com/chat\r\n\
              \r\n"
        );
    }

    #[tokio::test]
    async fn hixie76_response_is_exact() {
        let (outcome, _, out) = run(HIXIE76).await;
        let Ok(HandshakeOutcome::Upgraded(info)) = outcome else {
            panic!("expected upgrade, got {outcome:?}");
        };
        assert_eq!(info.draft, Draft::Hixie76);
        assert_eq!(info.protocol, "sample");
        assert_eq!(
            out,
            b"HTTP/1.1 101 Web Socket Protocol Handshake\r\n\
              Upgrade: WebSocket\r\n\
              Connection: Upgrade\r\n\
              Sec-WebSocket-Origin: http://example.com\r\n\
              Sec-WebSocket-Protocol: sample\r\n\
              Sec-WebSocket-Location: ws://example.com/demo\r\n\
              \r\n\
              8jKS'y:G*Co,Wxa-"
        );
    }

    #[tokio::test]
    async fn hixie76_without_protocol_sends_empty_header() {
        let raw = b"GET /demo HTTP/1.1\r\nHost: example.com\r\nConnection: Upgrade\r\n\
            Upgrade: WebSocket\r\nOrigin: http://example.com\r\n\
            Sec-WebSocket-Key1: 4 @1  46546xW%0l 1 5\r\n\
            Sec-WebSocket-Key2: 12998 5 Y3 1  .P00\r\n\r\n\
            \x01\x02\x03\x04\x05\x06\x07\x08";
        let (outcome, _, out) = run(raw).await;
        let Ok(HandshakeOutcome::Upgraded(_)) = outcome else {
            panic!("expected upgrade, got {outcome:?}");
        };
        let Some(body) = out.strip_prefix(
            b"HTTP/1.1 101 Web Socket Protocol Handshake\r\n\
              Upgrade: WebSocket\r\n\
              Connection: Upgrade\r\n\
              Sec-WebSocket-Origin: http://example.com\r\n\
              Sec-WebSocket-Protocol: \r\n\
              Sec-WebSocket-Location: ws://example.com/demo\r\n\
              \r\n"
                .as_slice(),
        ) else {
            panic!("unexpected head: {:?}", String::from_utf8_lossy(&out));
        };
        assert_eq!(
            body,
            [
                0x63, 0x3a, 0x10, 0xcc, 0x2b, 0x10, 0x3a, 0x17, 0xf7, 0x1e, 0x99, 0xe5, 0xb1, 0xc3,
                0x67, 0xb1
            ]
        );
    }

    #[tokio::test]
    async fn missing_key1_is_rejected_with_400() {
        let raw = b"GET /demo HTTP/1.1\r\nHost: example.com\r\nConnection: Upgrade\r\n\
            Upgrade: WebSocket\r\nOrigin: http://example.com\r\n\
            Sec-WebSocket-Key2: 12998 5 Y3 1  .P00\r\n\r\n";
        let (outcome, close, out) = run(raw).await;
        let Ok(HandshakeOutcome::Rejected(Draft::Hixie76)) = outcome else {
            panic!("expected rejection, got {outcome:?}");
        };
        assert!(close);
        let expected = format!(
            "HTTP/1.1 400 Bad Request\r\nContent-Length: {}\r\n\r\n{}",
            MISSING_KEYS_MESSAGE.len(),
            MISSING_KEYS_MESSAGE
        );
        assert_eq!(String::from_utf8_lossy(&out), expected);
        assert!(!MISSING_KEYS_MESSAGE.is_empty());
    }

    #[tokio::test]
    async fn empty_key2_is_rejected_with_400() {
        let raw = b"GET / HTTP/1.1\r\nHost: h\r\nConnection: Upgrade\r\nUpgrade: WebSocket\r\n\
            Origin: http://h\r\nSec-WebSocket-Key1: 1 2\r\nSec-WebSocket-Key2:\r\n\r\n";
        let (outcome, close, out) = run(raw).await;
        let Ok(HandshakeOutcome::Rejected(_)) = outcome else {
            panic!("expected rejection, got {outcome:?}");
        };
        assert!(close);
        assert!(out.starts_with(b"HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn request_without_origin_is_passed_through() {
        let raw = b"GET /demo HTTP/1.1\r\nHost: example.com\r\nConnection: Upgrade\r\n\
            Upgrade: WebSocket\r\nSec-WebSocket-Key1: 1 2\r\nSec-WebSocket-Key2: 1 2\r\n\r\n";
        let mut conn = Connection::new(&raw[..], Vec::new());
        let Ok(Some(request)) = read_request_head(conn.reader_mut(), 8192).await else {
            panic!("expected a request head");
        };
        conn.begin_request(request);
        let Ok(HandshakeOutcome::Passthrough) = perform(&mut conn).await else {
            panic!("expected passthrough");
        };
        assert!(!conn.is_upgraded());
        assert_eq!(conn.sink_kind(), SinkKind::BufferedHttp);
        assert!(!conn.headers_sent());
        let (_, out) = conn.into_parts();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn short_nonce_fails_without_response() {
        let raw = b"GET /demo HTTP/1.1\r\nHost: example.com\r\nConnection: Upgrade\r\n\
            Upgrade: WebSocket\r\nOrigin: http://example.com\r\n\
            Sec-WebSocket-Key1: 4 @1  46546xW%0l 1 5\r\n\
            Sec-WebSocket-Key2: 12998 5 Y3 1  .P00\r\n\r\n\
            ^n:d";
        let (outcome, _, out) = run(raw).await;
        let Err(HandshakeError::ShortRead { received: 4, .. }) = outcome else {
            panic!("expected ShortRead, got {outcome:?}");
        };
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn malformed_key_fails_without_response() {
        let raw = b"GET / HTTP/1.1\r\nHost: h\r\nConnection: Upgrade\r\nUpgrade: WebSocket\r\n\
            Origin: http://h\r\nSec-WebSocket-Key1: 1 0  1\r\n\
            Sec-WebSocket-Key2: 1 2\r\n\r\n12345678";
        let (outcome, _, out) = run(raw).await;
        let Err(HandshakeError::MalformedKey { .. }) = outcome else {
            panic!("expected MalformedKey, got {outcome:?}");
        };
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn version_header_is_ignored_by_detection() {
        let raw = b"GET /chat HTTP/1.1\r\nHost: h\r\nConnection: Upgrade\r\nUpgrade: WebSocket\r\n\
            Origin: http://h\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
            Sec-WebSocket-Version: 13\r\n\r\n";
        let (outcome, _, out) = run(raw).await;
        let Ok(HandshakeOutcome::Upgraded(info)) = outcome else {
            panic!("expected upgrade, got {outcome:?}");
        };
        assert_eq!(info.draft, Draft::Hixie75);
        assert!(out.starts_with(b"HTTP/1.1 101 Web Socket Protocol Handshake\r\n"));
        assert!(out.ends_with(b"WebSocket-Location: ws://h/chat\r\n\r\n"));
    }

    #[tokio::test]
    async fn missing_host_is_unsupported() {
        let raw = b"GET / HTTP/1.1\r\nConnection: Upgrade\r\nUpgrade: WebSocket\r\n\
            Origin: http://h\r\n\r\n";
        let (outcome, _, out) = run(raw).await;
        let Err(HandshakeError::UnsupportedVersion(_)) = outcome else {
            panic!("expected UnsupportedVersion, got {outcome:?}");
        };
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn raw_path_persists_after_handshake() {
        let mut conn = Connection::new(HIXIE76, Vec::new());
        let Ok(Some(request)) = read_request_head(conn.reader_mut(), 8192).await else {
            panic!("expected a request head");
        };
        conn.begin_request(request);
        let Ok(HandshakeOutcome::Upgraded(_)) = perform(&mut conn).await else {
            panic!("expected upgrade");
        };
        let Ok(()) = conn
            .start_response("200 OK", &[("X-A".to_string(), "1".to_string())])
            .await
        else {
            panic!("raw start_response failed");
        };
        let Ok(()) = conn.write(b"\x00hi\xff").await else {
            panic!("raw write failed");
        };
        let (_, out) = conn.into_parts();
        assert!(out.ends_with(b"8jKS'y:G*Co,Wxa-HTTP/1.1 200 OK\r\nX-A: 1\r\n\r\n\x00hi\xff"));
    }
}
