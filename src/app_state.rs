//! Shared application state injected into the fallback HTTP handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::stats::HandshakeStats;

/// Shared state available to all handlers via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Handshake counters updated by connection tasks.
    pub stats: Arc<HandshakeStats>,
    /// Moment the gateway started.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Creates state with fresh counters, started now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stats: Arc::new(HandshakeStats::new()),
            started_at: Utc::now(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
