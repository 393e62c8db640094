//! Normal HTTP handling for requests that are not WebSocket upgrades.
//!
//! The parsed request is rebuilt as an [`axum::http::Request`], dispatched
//! to an [`axum::Router`] with [`tower::ServiceExt::oneshot`], and the
//! collected response goes back out through the connection's buffered sink.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{self, Method, StatusCode};
use tokio::io::{AsyncBufRead, AsyncReadExt, AsyncWrite};
use tower::ServiceExt;

use super::Request;
use crate::connection::Connection;
use crate::error::{ConnectionError, RequestError};

/// Serves the connection's current request through `router`.
///
/// # Errors
///
/// Returns [`ConnectionError`] if the request body cannot be read or the
/// response cannot be written. Requests the router cannot accept, and
/// oversized or chunked request bodies, are answered with an HTTP error
/// and mark the connection for close.
pub async fn dispatch<R, W>(
    conn: &mut Connection<R, W>,
    router: &Router,
    max_body_bytes: usize,
) -> Result<(), ConnectionError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let Some(request) = conn.request().cloned() else {
        return Ok(());
    };

    if request.headers.contains_key(http::header::TRANSFER_ENCODING) {
        conn.mark_close();
        return respond_plain(
            conn,
            StatusCode::NOT_IMPLEMENTED,
            "request transfer-encoding is not supported",
        )
        .await;
    }

    let length = match request.content_length() {
        Ok(length) => length.unwrap_or(0),
        Err(err) => return bad_request(conn, &err).await,
    };
    if length > u64::try_from(max_body_bytes).unwrap_or(u64::MAX) {
        conn.mark_close();
        return respond_plain(
            conn,
            StatusCode::PAYLOAD_TOO_LARGE,
            "request body too large",
        )
        .await;
    }

    let mut body = Vec::new();
    conn.reader_mut().take(length).read_to_end(&mut body).await?;
    if (body.len() as u64) < length {
        let err = RequestError::Malformed("connection closed inside request body".to_string());
        return Err(err.into());
    }

    let http_request = match to_http_request(&request, body) {
        Ok(http_request) => http_request,
        Err(err) => return bad_request(conn, &err).await,
    };
    let response = match router.clone().oneshot(http_request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(error = %err, "failed to collect fallback response body");
            conn.mark_close();
            return respond_plain(
                conn,
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error",
            )
            .await;
        }
    };

    let mut headers: Vec<(String, String)> = parts
        .headers
        .iter()
        .filter(|(name, _)| {
            **name != http::header::CONTENT_LENGTH && **name != http::header::TRANSFER_ENCODING
        })
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    if parts
        .headers
        .get(http::header::CONNECTION)
        .is_some_and(|v| v.as_bytes().eq_ignore_ascii_case(b"close"))
    {
        conn.mark_close();
    } else if conn.should_close() {
        headers.push(("Connection".to_string(), "close".to_string()));
    }
    let declared = parts
        .headers
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| bytes.len().to_string(), str::to_string);
    headers.push(("Content-Length".to_string(), declared));

    conn.start_response(&status_line(parts.status), &headers).await?;
    if request.method != Method::HEAD {
        conn.write(&bytes).await?;
    }
    conn.finish_response().await?;

    tracing::debug!(
        method = %request.method,
        path = %request.path,
        status = parts.status.as_u16(),
        "served fallback request"
    );
    Ok(())
}

/// Rebuilds a parsed request head plus body as an `http::Request`.
fn to_http_request(
    request: &Request,
    body: Vec<u8>,
) -> Result<http::Request<Body>, RequestError> {
    let uri = request
        .target
        .parse::<http::Uri>()
        .map_err(|err| RequestError::Malformed(err.to_string()))?;
    let mut http_request = http::Request::new(Body::from(body));
    *http_request.method_mut() = request.method.clone();
    *http_request.uri_mut() = uri;
    *http_request.version_mut() = request.version;
    *http_request.headers_mut() = request.headers.clone();
    Ok(http_request)
}

/// Answers a request the router cannot accept and marks the connection for close.
async fn bad_request<R, W>(
    conn: &mut Connection<R, W>,
    err: &RequestError,
) -> Result<(), ConnectionError>
where
    W: AsyncWrite + Unpin,
{
    tracing::debug!(error = %err, "rejecting unroutable request");
    conn.mark_close();
    respond_plain(conn, StatusCode::BAD_REQUEST, "bad request").await
}

/// `"<code> <canonical reason>"`.
fn status_line(status: StatusCode) -> String {
    format!(
        "{} {}",
        status.as_str(),
        status.canonical_reason().unwrap_or("Unknown")
    )
}

/// Sends a short plaintext response with an exact `Content-Length`.
///
/// # Errors
///
/// Returns [`ConnectionError::Response`] if the response cannot be written.
pub async fn respond_plain<R, W>(
    conn: &mut Connection<R, W>,
    status: StatusCode,
    message: &str,
) -> Result<(), ConnectionError>
where
    W: AsyncWrite + Unpin,
{
    let mut headers = vec![
        ("Content-Type".to_string(), "text/plain".to_string()),
        ("Content-Length".to_string(), message.len().to_string()),
    ];
    if conn.should_close() {
        headers.push(("Connection".to_string(), "close".to_string()));
    }
    conn.start_response(&status_line(status), &headers).await?;
    conn.write(message.as_bytes()).await?;
    conn.finish_response().await?;
    Ok(())
}
