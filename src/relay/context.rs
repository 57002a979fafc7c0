//! Per-session proxy context.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::net::SessionId;
use crate::relay::handler::Capabilities;

/// State shared by everything that touches one proxied connection.
///
/// The relay engine only reads from it. Logging goes through [`ProxyCtx::warn`]
/// and [`ProxyCtx::log`] so every message carries the session tag.
#[derive(Clone)]
pub struct ProxyCtx {
    /// Session identifier used to correlate log lines.
    pub session: SessionId,
    /// Handlers consulted when the connection is relayed.
    pub capabilities: Capabilities,
    user_data: Option<Arc<dyn Any + Send + Sync>>,
}

impl ProxyCtx {
    /// Context with no handlers registered.
    pub fn new(session: SessionId) -> Self {
        Self {
            session,
            capabilities: Capabilities::default(),
            user_data: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Attach arbitrary state for handlers to pick up later.
    pub fn with_user_data<T: Any + Send + Sync>(mut self, data: T) -> Self {
        self.user_data = Some(Arc::new(data));
        self
    }

    /// Borrow previously attached user data, if it has type `T`.
    pub fn user_data<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.user_data.as_deref()?.downcast_ref::<T>()
    }

    /// Emit a session-scoped warning.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(session = %self.session, "{}", args);
    }

    /// Emit a session-scoped debug message.
    pub fn log(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(session = %self.session, "{}", args);
    }
}

impl fmt::Debug for ProxyCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyCtx")
            .field("session", &self.session)
            .field("capabilities", &self.capabilities)
            .field("user_data", &self.user_data.is_some())
            .finish()
    }
}
