//! Protocol-upgrade handshake detection.
//!
//! # Design Decisions
//! - Every occurrence of a header is scanned; any matching token wins
//! - Tokens are comma separated, trimmed, compared ASCII case-insensitively
//! - Values are matched as raw bytes, so opaque (non-ASCII) bytes never hide
//!   a valid token elsewhere in the same value

use axum::http::header::{AsHeaderName, CONNECTION, UPGRADE};
use axum::http::HeaderMap;

/// Protocol token browsers send for WebSocket handshakes.
pub const WEBSOCKET: &str = "websocket";

/// Returns true if any `name` header carries `token` in its comma-separated list.
pub fn header_contains<K: AsHeaderName>(headers: &HeaderMap, name: K, token: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .flat_map(|value| value.as_bytes().split(|&b| b == b','))
        .any(|candidate| candidate.trim_ascii().eq_ignore_ascii_case(token.as_bytes()))
}

/// Returns true if the headers request an upgrade to `protocol`.
pub fn is_upgrade_request(headers: &HeaderMap, protocol: &str) -> bool {
    header_contains(headers, CONNECTION, "Upgrade") && header_contains(headers, UPGRADE, protocol)
}

/// Returns true if the headers describe a WebSocket handshake.
pub fn is_websocket_handshake(headers: &HeaderMap) -> bool {
    is_upgrade_request(headers, WEBSOCKET)
}
