//! Upgrade-aware reverse proxy library.
//!
//! Plain requests are forwarded upstream. Connection upgrade handshakes
//! (WebSocket by default) are completed with the upstream, after which the
//! relay engine moves raw bytes between the two connections.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod relay;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use relay::{relay, Capabilities, ProxyCtx};
