//! # legacy-ws-gateway
//!
//! HTTP server that upgrades connections to raw WebSocket streams using the
//! legacy handshake drafts (hixie-75 and hixie-76).
//!
//! Requests carrying `Connection: Upgrade`, `Upgrade: WebSocket` and an
//! `Origin` are answered with the draft's `101 Web Socket Protocol
//! Handshake`; from then on the connection's response path writes straight
//! to the socket. Every other request is served by a small Axum router.
//! Frame parsing is left to the [`ws::handler::Application`].
//!
//! ## Architecture
//!
//! ```text
//! TcpListener (server/)
//!     │
//!     ├── Request head reader (http/request)
//!     ├── Connection context + response sinks (connection, http/sink)
//!     │
//!     ├── Handshake (handshake/)
//!     │     ├── gate + draft detection
//!     │     ├── key parser, challenge digest
//!     │     └── 101 / 400 responder
//!     │
//!     ├── Upgraded → Application (ws/)
//!     └── Passthrough → Axum router (http/fallback, api/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod connection;
pub mod error;
pub mod handshake;
pub mod http;
pub mod server;
pub mod stats;
pub mod ws;
