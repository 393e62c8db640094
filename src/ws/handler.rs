//! Application hook invoked after a successful upgrade.

use std::future::Future;

use tokio::io::{AsyncBufRead, AsyncWrite};

use super::WebSocket;
use super::connection::run_connection;
use crate::error::ConnectionError;

/// Consumer of upgraded connections.
///
/// Called once per successful handshake with the connection already on the
/// raw passthrough path. The connection closes when the returned future
/// completes.
pub trait Application: Send + Sync + 'static {
    /// Drives one upgraded connection to completion.
    fn on_upgrade<R, W>(
        &self,
        socket: WebSocket<'_, R, W>,
    ) -> impl Future<Output = Result<(), ConnectionError>> + Send
    where
        R: AsyncBufRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send;
}

/// Writes every byte it reads back to the client.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoApplication;

impl Application for EchoApplication {
    async fn on_upgrade<R, W>(&self, socket: WebSocket<'_, R, W>) -> Result<(), ConnectionError>
    where
        R: AsyncBufRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        run_connection(socket).await
    }
}
