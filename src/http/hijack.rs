//! Taking over the client connection of an upgrade request.
//!
//! # Responsibilities
//! - Detach the upgrade handle from the request before it is consumed
//! - Yield the raw client connection once the `101` response is written
//!
//! # Design Decisions
//! - A server without upgrade support is a setup error: fail loudly
//! - A connection that cannot be taken over is reported, never retried

use axum::http::Request;
use hyper::upgrade::{OnUpgrade, Upgraded};
use hyper_util::rt::TokioIo;

use crate::relay::{ProxyCtx, RelayError};

/// Raw connection obtained from an upgraded HTTP exchange.
pub type UpgradedConn = TokioIo<Upgraded>;

/// Upgrade handle taken from a request that has not been answered yet.
#[derive(Debug)]
pub struct PendingHijack {
    on_upgrade: OnUpgrade,
}

impl PendingHijack {
    /// Detach the upgrade handle from `req`.
    ///
    /// # Panics
    ///
    /// Panics if the request carries no upgrade handle, which means the HTTP
    /// server was not set up to allow connection upgrades.
    pub fn from_request<B>(req: &mut Request<B>) -> Self {
        match req.extensions_mut().remove::<OnUpgrade>() {
            Some(on_upgrade) => Self { on_upgrade },
            None => panic!("http server does not support connection hijacking"),
        }
    }

    /// Wait for the connection to be handed over.
    ///
    /// Resolves only after the response to the request has been sent, so it
    /// must run in a task separate from the one producing that response.
    pub async fn hijack(self, ctx: &ProxyCtx) -> Result<UpgradedConn, RelayError> {
        match self.on_upgrade.await {
            Ok(upgraded) => Ok(TokioIo::new(upgraded)),
            Err(e) => {
                ctx.warn(format_args!("Hijack error: {}", e));
                Err(RelayError::Hijack(e))
            }
        }
    }
}
