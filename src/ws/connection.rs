//! Echo loop for a single upgraded connection.
//!
//! Legacy frames (`0x00 .. 0xFF` text frames, length-prefixed binary
//! frames) are echoed byte for byte, so a client receives exactly the
//! frames it sent.

use tokio::io::{AsyncBufRead, AsyncWrite};

use super::WebSocket;
use crate::error::ConnectionError;

const READ_CHUNK: usize = 4096;

/// Runs the read/echo loop until the client closes.
///
/// # Errors
///
/// Returns [`ConnectionError`] if reading or writing fails.
pub async fn run_connection<R, W>(mut socket: WebSocket<'_, R, W>) -> Result<(), ConnectionError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    let mut echoed: u64 = 0;

    loop {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let Some(chunk) = buf.get(..n) else {
            break;
        };
        socket.send(chunk).await?;
        echoed += n as u64;
    }

    tracing::debug!(
        draft = %socket.info().draft,
        path = %socket.info().path,
        echoed,
        "ws connection closed"
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::handshake::{HandshakeOutcome, perform};
    use crate::http::read_request_head;

    #[tokio::test]
    async fn echoes_frames_sent_after_handshake() {
        let raw: &[u8] = b"GET /echo HTTP/1.1\r\nHost: h\r\nConnection: Upgrade\r\n\
            Upgrade: WebSocket\r\nOrigin: http://h\r\n\r\n\x00hello\xff\x00world\xff";
        let mut conn = Connection::new(raw, Vec::new());
        let Ok(Some(request)) = read_request_head(conn.reader_mut(), 4096).await else {
            panic!("expected a request head");
        };
        conn.begin_request(request);
        let Ok(HandshakeOutcome::Upgraded(info)) = perform(&mut conn).await else {
            panic!("expected upgrade");
        };

        let Ok(()) = run_connection(WebSocket::new(&mut conn, info)).await else {
            panic!("echo loop failed");
        };
        let (_, out) = conn.into_parts();
        assert!(out.ends_with(b"\r\n\r\n\x00hello\xff\x00world\xff"));
    }
}
