//! TCP accept loop and per-connection driver.
//!
//! Each accepted connection runs in its own task and owns its
//! [`Connection`] exclusively. Requests are served in order until the
//! connection closes, is upgraded, or fails.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::api;
use crate::app_state::AppState;
use crate::config::GatewayConfig;
use crate::connection::Connection;
use crate::error::ConnectionError;
use crate::handshake::{self, HandshakeOutcome};
use crate::http::{fallback, read_request_head};
use crate::ws::WebSocket;
use crate::ws::handler::Application;

/// Pause after a failed `accept` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Upgrade-capable HTTP server.
#[derive(Debug)]
pub struct Gateway<A> {
    app: Arc<A>,
    router: Router,
    state: AppState,
    config: GatewayConfig,
}

impl<A> Clone for Gateway<A> {
    fn clone(&self) -> Self {
        Self {
            app: Arc::clone(&self.app),
            router: self.router.clone(),
            state: self.state.clone(),
            config: self.config.clone(),
        }
    }
}

impl<A: Application> Gateway<A> {
    /// Creates a gateway that hands upgraded connections to `app`.
    pub fn new(app: A, config: GatewayConfig) -> Self {
        let state = AppState::new();
        let router = api::build_router()
            .layer(TraceLayer::new_for_http())
            .with_state(state.clone());
        Self {
            app: Arc::new(app),
            router,
            state,
            config,
        }
    }

    /// Shared state, including handshake counters.
    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// Accepts connections forever, spawning one task per connection.
    ///
    /// # Errors
    ///
    /// Returns an error only if the listener's local address cannot be read.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "server listening");

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    tracing::warn!(error = %err, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };
            let gateway = self.clone();
            let span = tracing::info_span!("conn", conn_id = %uuid::Uuid::new_v4(), %peer);
            tokio::spawn(async move { gateway.handle(stream, peer).await }.instrument(span));
        }
    }

    async fn handle(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(err) = stream.set_nodelay(true) {
            tracing::debug!(error = %err, "set_nodelay failed");
        }
        let (read_half, write_half) = stream.into_split();
        let mut conn = Connection::new(BufReader::new(read_half), BufWriter::new(write_half));
        tracing::debug!(%peer, "connection opened");

        match self.serve_connection(&mut conn).await {
            Ok(()) | Err(ConnectionError::Handshake(_)) => {}
            Err(err) => tracing::debug!(error = %err, "connection ended with error"),
        }
        if let Err(err) = conn.shutdown().await {
            tracing::debug!(error = %err, "shutdown failed");
        }
        tracing::debug!(upgraded = conn.is_upgraded(), "connection closed");
    }

    /// Serves requests on one connection until it closes or is upgraded.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] for unreadable requests, handshake
    /// failures, timeouts, and transport errors. The caller closes the
    /// connection in every case.
    pub async fn serve_connection<R, W>(
        &self,
        conn: &mut Connection<R, W>,
    ) -> Result<(), ConnectionError>
    where
        R: AsyncBufRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let timeout = self.config.handshake_timeout();
        let stats = &self.state.stats;

        loop {
            let head = tokio::time::timeout(
                timeout,
                read_request_head(conn.reader_mut(), self.config.max_header_bytes),
            )
            .await
            .map_err(|_| ConnectionError::Timeout(self.config.handshake_timeout_secs))?;
            let request = match head {
                Ok(Some(request)) => request,
                Ok(None) => return Ok(()),
                Err(err) => {
                    if let Some(status) = err.rejection() {
                        conn.begin_error_response();
                        let reason = status.canonical_reason().unwrap_or("error");
                        fallback::respond_plain(conn, status, reason).await?;
                    }
                    return Err(err.into());
                }
            };
            conn.begin_request(request);

            let outcome = match tokio::time::timeout(timeout, handshake::perform(conn)).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(err)) => {
                    stats.record_failed();
                    tracing::warn!(error = %err, kind = err.kind(), "handshake failed");
                    return Err(err.into());
                }
                Err(_) => {
                    stats.record_failed();
                    tracing::warn!(kind = "timeout", "handshake timed out");
                    return Err(ConnectionError::Timeout(self.config.handshake_timeout_secs));
                }
            };

            match outcome {
                HandshakeOutcome::Passthrough => {
                    stats.record_passthrough();
                    fallback::dispatch(conn, &self.router, self.config.max_body_bytes).await?;
                    if conn.should_close() {
                        return Ok(());
                    }
                }
                HandshakeOutcome::Rejected(draft) => {
                    stats.record_rejected();
                    tracing::debug!(%draft, "handshake rejected, closing");
                    return Ok(());
                }
                HandshakeOutcome::Upgraded(info) => {
                    stats.record_upgrade(info.draft);
                    tracing::info!(
                        draft = %info.draft,
                        origin = %info.origin,
                        path = %info.path,
                        protocol = %info.protocol,
                        "websocket upgraded"
                    );
                    return self.app.on_upgrade(WebSocket::new(conn, info)).await;
                }
            }
        }
    }
}
