//! Relay subsystem for upgraded (WebSocket-style) connections.
//!
//! # Data Flow
//! ```text
//! Upgrade handshake confirmed by the HTTP layer
//!     → context.rs (ProxyCtx: session ID + registered handlers)
//!     → engine.rs (resolve RelayMode)
//!         Takeover    → RelayHandler owns both streams
//!         Hooked      → CopyHook per direction, joined
//!         Passthrough → copy.rs per direction, joined
//!     → CloseHandler (Hooked/Passthrough only)
//! ```
//!
//! # Design Decisions
//! - The upgraded protocol is never parsed; streams are opaque bytes
//! - Exactly one of takeover or engine-driven copy runs per relay
//! - The engine never closes streams and never times out

pub mod context;
pub mod copy;
pub mod engine;
pub mod error;
pub mod handler;
pub mod hooks;

pub use context::ProxyCtx;
pub use copy::copy_or_warn;
pub use engine::{relay, RelayMode, RelayOutcome};
pub use error::RelayError;
pub use handler::{
    copy_hook_fn, relay_handler_fn, Capabilities, CloseHandler, CopyHook, CopyOutcome, Direction,
    Duplex, RelayHandler,
};
pub use hooks::InspectHook;
