//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).

use std::net::SocketAddr;
use std::time::Duration;

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the listener to (e.g. `0.0.0.0:8000`).
    pub listen_addr: SocketAddr,

    /// Seconds allowed for reading a request head and for the handshake
    /// itself (including the draft-76 nonce read).
    pub handshake_timeout_secs: u64,

    /// Maximum size of a request line plus headers.
    pub max_header_bytes: usize,

    /// Maximum request and response body size on the fallback HTTP path.
    pub max_body_bytes: usize,

    /// Emit logs as JSON lines instead of human-readable text.
    pub log_json: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            handshake_timeout_secs: 10,
            max_header_bytes: 16 * 1024,
            max_body_bytes: 1024 * 1024,
            log_json: false,
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set or cannot be
    /// parsed. Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr = match std::env::var("LISTEN_ADDR") {
            Ok(addr) => addr.parse()?,
            Err(_) => defaults.listen_addr,
        };

        Ok(Self {
            listen_addr,
            handshake_timeout_secs: parse_env(
                "HANDSHAKE_TIMEOUT_SECS",
                defaults.handshake_timeout_secs,
            ),
            max_header_bytes: parse_env("MAX_HEADER_BYTES", defaults.max_header_bytes),
            max_body_bytes: parse_env("MAX_BODY_BYTES", defaults.max_body_bytes),
            log_json: std::env::var("LOG_FORMAT")
                .is_ok_and(|format| format.eq_ignore_ascii_case("json")),
        })
    }

    /// Handshake timeout as a [`Duration`].
    #[must_use]
    pub const fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
