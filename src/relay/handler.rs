//! Interception points for upgraded connections.
//!
//! An embedder customises a relay at one of three levels, highest first:
//!
//! 1. [`RelayHandler`]: takes over both streams for the whole connection.
//! 2. [`CopyHook`]: replaces the byte copy of each direction.
//! 3. Nothing registered: bytes are copied verbatim.
//!
//! A [`CloseHandler`] may be registered next to levels 2 and 3 and is told
//! once the engine's own copy loop has finished.

use std::fmt;
use std::io;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::relay::context::ProxyCtx;

/// A bidirectional byte stream the relay can read from and write to.
pub trait Duplex: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> Duplex for T where T: AsyncRead + AsyncWrite + Unpin + Send + ?Sized {}

/// Which way bytes flow inside a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Client to remote server.
    ClientToServer,
    /// Remote server to client.
    ServerToClient,
}

impl Direction {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::ClientToServer => "client_to_server",
            Direction::ServerToClient => "server_to_client",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full takeover of an upgraded connection.
///
/// The returned future should resolve only once the connection is done. The
/// handler owns concurrency and cleanup; the engine neither copies bytes nor
/// calls the close handler when one is registered.
pub trait RelayHandler: Send + Sync {
    fn handle<'a>(
        &'a self,
        remote: &'a mut dyn Duplex,
        client: &'a mut dyn Duplex,
        ctx: &'a ProxyCtx,
    ) -> BoxFuture<'a, ()>;
}

/// What one direction of a relay moved, and how it ended.
///
/// Bytes written before a failure are still counted.
#[derive(Debug)]
pub struct CopyOutcome {
    pub bytes: u64,
    pub error: Option<io::Error>,
}

impl CopyOutcome {
    /// The direction reached EOF after moving `bytes`.
    pub fn done(bytes: u64) -> Self {
        Self { bytes, error: None }
    }

    /// The direction stopped on `error` after moving `bytes`.
    pub fn failed(bytes: u64, error: io::Error) -> Self {
        Self {
            bytes,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl From<io::Result<u64>> for CopyOutcome {
    /// An error here carries no byte count, so it is recorded as zero.
    fn from(result: io::Result<u64>) -> Self {
        match result {
            Ok(bytes) => Self::done(bytes),
            Err(error) => Self::failed(0, error),
        }
    }
}

/// Replacement for the per-direction copy.
///
/// Called once per direction with the stream half to write to and the one to
/// read from. The outcome is observed by the engine but never fails the relay.
pub trait CopyHook: Send + Sync {
    fn copy<'a>(
        &'a self,
        dst: &'a mut (dyn AsyncWrite + Unpin + Send),
        src: &'a mut (dyn AsyncRead + Unpin + Send),
        direction: Direction,
        ctx: &'a ProxyCtx,
    ) -> BoxFuture<'a, CopyOutcome>;
}

/// Notified when the engine's copy loop has finished both directions.
pub trait CloseHandler: Send + Sync {
    fn on_close(&self, ctx: &ProxyCtx);
}

impl<F> CloseHandler for F
where
    F: Fn(&ProxyCtx) + Send + Sync,
{
    fn on_close(&self, ctx: &ProxyCtx) {
        self(ctx)
    }
}

/// Adapter turning a closure into a [`RelayHandler`].
pub struct FnRelayHandler<F>(F);

/// Wrap a closure as a [`RelayHandler`].
///
/// ```ignore
/// let handler = relay_handler_fn(|remote, client, _ctx| {
///     Box::pin(async move {
///         let _ = tokio::io::copy_bidirectional(remote, client).await;
///     })
/// });
/// ```
pub fn relay_handler_fn<F>(f: F) -> FnRelayHandler<F>
where
    F: for<'a> Fn(&'a mut dyn Duplex, &'a mut dyn Duplex, &'a ProxyCtx) -> BoxFuture<'a, ()>
        + Send
        + Sync,
{
    FnRelayHandler(f)
}

impl<F> RelayHandler for FnRelayHandler<F>
where
    F: for<'a> Fn(&'a mut dyn Duplex, &'a mut dyn Duplex, &'a ProxyCtx) -> BoxFuture<'a, ()>
        + Send
        + Sync,
{
    fn handle<'a>(
        &'a self,
        remote: &'a mut dyn Duplex,
        client: &'a mut dyn Duplex,
        ctx: &'a ProxyCtx,
    ) -> BoxFuture<'a, ()> {
        (self.0)(remote, client, ctx)
    }
}

/// Adapter turning a closure into a [`CopyHook`].
pub struct FnCopyHook<F>(F);

/// Wrap a closure as a [`CopyHook`].
pub fn copy_hook_fn<F>(f: F) -> FnCopyHook<F>
where
    F: for<'a> Fn(
            &'a mut (dyn AsyncWrite + Unpin + Send),
            &'a mut (dyn AsyncRead + Unpin + Send),
            Direction,
            &'a ProxyCtx,
        ) -> BoxFuture<'a, CopyOutcome>
        + Send
        + Sync,
{
    FnCopyHook(f)
}

impl<F> CopyHook for FnCopyHook<F>
where
    F: for<'a> Fn(
            &'a mut (dyn AsyncWrite + Unpin + Send),
            &'a mut (dyn AsyncRead + Unpin + Send),
            Direction,
            &'a ProxyCtx,
        ) -> BoxFuture<'a, CopyOutcome>
        + Send
        + Sync,
{
    fn copy<'a>(
        &'a self,
        dst: &'a mut (dyn AsyncWrite + Unpin + Send),
        src: &'a mut (dyn AsyncRead + Unpin + Send),
        direction: Direction,
        ctx: &'a ProxyCtx,
    ) -> BoxFuture<'a, CopyOutcome> {
        (self.0)(dst, src, direction, ctx)
    }
}

/// The optional handlers registered for a session.
///
/// Cloning is cheap; every slot is shared.
#[derive(Clone, Default)]
pub struct Capabilities {
    pub relay_handler: Option<Arc<dyn RelayHandler>>,
    pub copy_hook: Option<Arc<dyn CopyHook>>,
    pub close_handler: Option<Arc<dyn CloseHandler>>,
}

impl Capabilities {
    /// No customisation: verbatim copy in both directions.
    pub fn passthrough() -> Self {
        Self::default()
    }

    pub fn with_relay_handler(mut self, handler: impl RelayHandler + 'static) -> Self {
        self.relay_handler = Some(Arc::new(handler));
        self
    }

    pub fn with_copy_hook(mut self, hook: impl CopyHook + 'static) -> Self {
        self.copy_hook = Some(Arc::new(hook));
        self
    }

    pub fn with_close_handler(mut self, handler: impl CloseHandler + 'static) -> Self {
        self.close_handler = Some(Arc::new(handler));
        self
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("relay_handler", &self.relay_handler.is_some())
            .field("copy_hook", &self.copy_hook.is_some())
            .field("close_handler", &self.close_handler.is_some())
            .finish()
    }
}
