//! Upgrade gate and draft detection.

use std::fmt;

use axum::http::HeaderMap;
use serde::Serialize;

use crate::http::Request;

/// Legacy WebSocket handshake variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Draft {
    /// draft-hixie-thewebsocketprotocol-75: no challenge.
    Hixie75,
    /// draft-hixie-thewebsocketprotocol-76: `Key1`/`Key2` plus an 8-byte nonce.
    Hixie76,
}

impl fmt::Display for Draft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hixie75 => f.write_str("hixie-75"),
            Self::Hixie76 => f.write_str("hixie-76"),
        }
    }
}

/// Upgrade-relevant view of a request that passed the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// `Origin` header, non-empty.
    pub origin: String,
    /// `Host` header, if sent.
    pub host: Option<String>,
    /// Requested sub-protocol, empty when none.
    pub protocol: String,
    /// Request path without query.
    pub path: String,
    /// `Sec-WebSocket-Key1`, if sent.
    pub key1: Option<String>,
    /// `Sec-WebSocket-Key2`, if sent.
    pub key2: Option<String>,
}

impl HandshakeRequest {
    /// Applies the upgrade gate.
    ///
    /// Returns `None` unless `Connection` is exactly `Upgrade`, `Upgrade` is
    /// exactly `WebSocket`, and `Origin` is present and non-empty. Such
    /// requests belong to normal HTTP handling.
    #[must_use]
    pub fn from_request(request: &Request) -> Option<Self> {
        let headers = &request.headers;
        if text(headers, "Connection").as_deref() != Some("Upgrade")
            || text(headers, "Upgrade").as_deref() != Some("WebSocket")
        {
            return None;
        }
        let origin = text(headers, "Origin").filter(|o| !o.is_empty())?;

        let protocol = text(headers, "Sec-WebSocket-Protocol")
            .or_else(|| text(headers, "WebSocket-Protocol"))
            .unwrap_or_default();

        Some(Self {
            origin,
            host: text(headers, "Host"),
            protocol,
            path: request.path.clone(),
            key1: text(headers, "Sec-WebSocket-Key1"),
            key2: text(headers, "Sec-WebSocket-Key2"),
        })
    }

    /// Selects the draft: any challenge key present means draft-76.
    #[must_use]
    pub const fn draft(&self) -> Draft {
        if self.key1.is_some() || self.key2.is_some() {
            Draft::Hixie76
        } else {
            Draft::Hixie75
        }
    }

    /// `ws://<Host><path>`, when `Host` was sent.
    #[must_use]
    pub fn location(&self) -> Option<String> {
        self.host
            .as_deref()
            .map(|host| format!("ws://{host}{}", self.path))
    }
}

/// First value of `name`, with bytes outside UTF-8 replaced.
fn text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}
