//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, hop-by-hop filtering, upstream URI)
//!     → routing layer decides upstream
//!     → upgrade.rs (is this a handshake?)
//!         yes → hijack.rs (take the raw connection) → relay engine
//!         no  → forward to upstream, stream response back
//! ```

pub mod hijack;
pub mod request;
pub mod server;
pub mod upgrade;

pub use hijack::{PendingHijack, UpgradedConn};
pub use request::{MakeRequestUuidV4, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
pub use upgrade::{header_contains, is_upgrade_request, is_websocket_handshake, WEBSOCKET};
