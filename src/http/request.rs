//! HTTP/1.x request head reader.
//!
//! Parses the request line and header block with [`httparse`] and leaves
//! any bytes after the blank line (request body, draft-76 nonce,
//! pipelined frames) unread in the same reader.

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Version, header};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::error::RequestError;

/// Upper bound on header fields in one request head.
const MAX_HEADERS: usize = 64;

/// A parsed request head.
#[derive(Debug, Clone)]
pub struct Request {
    /// Request method, e.g. `GET`.
    pub method: Method,
    /// Raw request-target as received.
    pub target: String,
    /// Request-target up to (excluding) `?`.
    pub path: String,
    /// Query string after `?`, if any.
    pub query: Option<String>,
    /// Protocol version, `HTTP/1.0` or `HTTP/1.1`.
    pub version: Version,
    /// Header fields; repeated names keep every value in arrival order.
    pub headers: HeaderMap,
}

impl Request {
    /// Returns `true` if the connection may serve another request after this one.
    #[must_use]
    pub fn keep_alive(&self) -> bool {
        let connection = self
            .headers
            .get(header::CONNECTION)
            .map(HeaderValue::as_bytes)
            .unwrap_or_default();
        if self.version == Version::HTTP_10 {
            connection.eq_ignore_ascii_case(b"keep-alive")
        } else {
            !connection.eq_ignore_ascii_case(b"close")
        }
    }

    /// Version token for the response status line.
    #[must_use]
    pub fn http_version(&self) -> &'static str {
        if self.version == Version::HTTP_10 {
            "HTTP/1.0"
        } else {
            "HTTP/1.1"
        }
    }

    /// Declared body length.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Malformed`] if `Content-Length` is not a
    /// non-negative integer.
    pub fn content_length(&self) -> Result<Option<u64>, RequestError> {
        self.headers
            .get(header::CONTENT_LENGTH)
            .map(|v| {
                v.to_str()
                    .ok()
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .ok_or_else(|| RequestError::Malformed(format!("bad Content-Length {v:?}")))
            })
            .transpose()
    }
}

/// Reads one request head.
///
/// Blank lines before the request line are skipped. Lines may end in CRLF
/// or a bare LF. Only the bytes of the head are consumed from `reader`.
///
/// Returns `Ok(None)` if the stream ends before any byte of a request.
///
/// # Errors
///
/// - [`RequestError::HeadTooLarge`] if the head exceeds `max_bytes`.
/// - [`RequestError::Malformed`] on an unparseable head or mid-head EOF.
/// - [`RequestError::Io`] on transport failure.
pub async fn read_request_head<R>(
    reader: &mut R,
    max_bytes: usize,
) -> Result<Option<Request>, RequestError>
where
    R: AsyncBufRead + Unpin,
{
    let mut head: Vec<u8> = Vec::new();

    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            if head.iter().all(|b| matches!(b, b'\r' | b'\n')) {
                return Ok(None);
            }
            return Err(RequestError::Malformed(
                "connection closed inside request head".to_string(),
            ));
        }

        let take = chunk.len().min(max_bytes.saturating_sub(head.len()));
        let before = head.len();
        head.extend_from_slice(chunk.get(..take).unwrap_or_default());

        if let Some((request, len)) = parse_head(&head)? {
            reader.consume(len.saturating_sub(before));
            return Ok(Some(request));
        }
        reader.consume(take);

        if head.len() >= max_bytes {
            return Err(RequestError::HeadTooLarge(max_bytes));
        }
    }
}

/// Parses a complete head, or returns `Ok(None)` while more bytes are needed.
fn parse_head(buf: &[u8]) -> Result<Option<(Request, usize)>, RequestError> {
    let mut fields = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Request::new(&mut fields);
    let len = match parsed.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(err) => return Err(RequestError::Malformed(err.to_string())),
    };

    let (Some(method), Some(target), Some(minor)) = (parsed.method, parsed.path, parsed.version)
    else {
        return Err(RequestError::Malformed("incomplete request line".to_string()));
    };
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|err| RequestError::Malformed(err.to_string()))?;
    let version = if minor == 0 {
        Version::HTTP_10
    } else {
        Version::HTTP_11
    };

    let mut headers = HeaderMap::with_capacity(parsed.headers.len());
    for field in parsed.headers.iter() {
        let name = HeaderName::from_bytes(field.name.as_bytes())
            .map_err(|err| RequestError::Malformed(err.to_string()))?;
        let value = HeaderValue::from_bytes(field.value)
            .map_err(|err| RequestError::Malformed(err.to_string()))?;
        headers.append(name, value);
    }

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (target.to_string(), None),
    };

    Ok(Some((
        Request {
            method,
            target: target.to_string(),
            path,
            query,
            version,
            headers,
        },
        len,
    )))
}
