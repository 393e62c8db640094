//! Handshake counters shared by all connection tasks.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::handshake::Draft;

/// Lock-free handshake counters.
#[derive(Debug, Default)]
pub struct HandshakeStats {
    simple_upgrades: AtomicU64,
    challenge_upgrades: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
    passthrough: AtomicU64,
}

/// Point-in-time copy of [`HandshakeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Successful draft-75 upgrades.
    pub simple_upgrades: u64,
    /// Successful draft-76 upgrades.
    pub challenge_upgrades: u64,
    /// Handshakes answered with `400`.
    pub rejected: u64,
    /// Handshakes that ended the connection without a response.
    pub failed: u64,
    /// Requests handed to normal HTTP handling.
    pub passthrough: u64,
}

impl HandshakeStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a successful upgrade.
    pub fn record_upgrade(&self, draft: Draft) {
        let counter = match draft {
            Draft::Hixie75 => &self.simple_upgrades,
            Draft::Hixie76 => &self.challenge_upgrades,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a `400` rejection.
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a fatal handshake error.
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a request passed to normal HTTP handling.
    pub fn record_passthrough(&self) {
        self.passthrough.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            simple_upgrades: self.simple_upgrades.load(Ordering::Relaxed),
            challenge_upgrades: self.challenge_upgrades.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            passthrough: self.passthrough.load(Ordering::Relaxed),
        }
    }
}
