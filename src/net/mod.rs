//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Upgrade request accepted by the HTTP layer
//!     → session.rs (allocate SessionId, count active relay)
//!     → relay engine runs with the session's context
//!     → guard dropped when both directions finished
//! ```
//!
//! # Design Decisions
//! - Session IDs are process-wide and monotonic
//! - Guards release the slot even if the relay task panics

pub mod session;

pub use session::{SessionGuard, SessionId, SessionTracker};
