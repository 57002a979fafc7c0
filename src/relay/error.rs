//! Relay error types.

use axum::http::StatusCode;
use thiserror::Error;

/// Failures that abort a relay before any byte is exchanged.
///
/// Copy errors are deliberately absent: once the relay runs, they are
/// logged per direction and never surface to the caller.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("hijack error: {0}")]
    Hijack(#[source] hyper::Error),

    #[error("upstream upgrade failed: {0}")]
    UpstreamUpgrade(#[source] hyper::Error),

    #[error("upstream handshake failed: {0}")]
    Handshake(#[from] hyper_util::client::legacy::Error),

    #[error("upstream refused upgrade with status {0}")]
    Refused(StatusCode),
}
