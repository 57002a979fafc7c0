//! Relay engine for upgraded connections.
//!
//! # Responsibilities
//! - Resolve which capability level applies to a session
//! - Drive both copy directions concurrently
//! - Suspend the caller until both directions have finished
//! - Notify the close handler exactly once
//!
//! # Design Decisions
//! - Capability resolution happens once, before any byte moves
//! - Directions are joined futures, so neither can outlive the call
//! - No timeouts: a direction ends on EOF or I/O error only
//! - Streams are borrowed; the caller closes them

use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::observability::metrics;
use crate::relay::context::ProxyCtx;
use crate::relay::copy::copy_or_warn;
use crate::relay::handler::{CopyHook, CopyOutcome, Direction, Duplex, RelayHandler};

/// How a relay will be carried out, resolved from the session's capabilities.
#[derive(Clone, Copy)]
pub enum RelayMode<'a> {
    /// A full handler owns the connection.
    Takeover(&'a dyn RelayHandler),
    /// The engine drives both directions through the copy hook.
    Hooked(&'a dyn CopyHook),
    /// The engine copies bytes verbatim.
    Passthrough,
}

impl<'a> RelayMode<'a> {
    /// Pick the highest-precedence handler registered on the context.
    pub fn resolve(ctx: &'a ProxyCtx) -> Self {
        let caps = &ctx.capabilities;
        if let Some(handler) = caps.relay_handler.as_deref() {
            RelayMode::Takeover(handler)
        } else if let Some(hook) = caps.copy_hook.as_deref() {
            RelayMode::Hooked(hook)
        } else {
            RelayMode::Passthrough
        }
    }

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayMode::Takeover(_) => "takeover",
            RelayMode::Hooked(_) => "hooked",
            RelayMode::Passthrough => "passthrough",
        }
    }
}

impl std::fmt::Debug for RelayMode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a relay ended.
#[derive(Debug)]
pub enum RelayOutcome {
    /// A full handler owned the connection; the engine moved nothing.
    TakenOver,
    /// The engine drove both directions to completion.
    Copied {
        client_to_server: CopyOutcome,
        server_to_client: CopyOutcome,
    },
}

/// Relay bytes between `remote` and `client` until both directions end.
///
/// With a full handler registered the call simply awaits it. Otherwise both
/// directions run concurrently and the call returns once both have finished,
/// after which the close handler (if any) is invoked exactly once. Copy errors
/// never fail the relay; they are logged and reported per direction.
pub async fn relay<R, C>(ctx: &ProxyCtx, remote: &mut R, client: &mut C) -> RelayOutcome
where
    R: Duplex,
    C: Duplex,
{
    let mode = RelayMode::resolve(ctx);
    metrics::record_relay_session(mode.as_str());
    tracing::debug!(session = %ctx.session, mode = ?mode, "Relay starting");

    let hook = match mode {
        RelayMode::Takeover(handler) => {
            handler.handle(remote, client, ctx).await;
            tracing::debug!(session = %ctx.session, "Relay handler returned");
            return RelayOutcome::TakenOver;
        }
        RelayMode::Hooked(hook) => Some(hook),
        RelayMode::Passthrough => None,
    };

    let start = Instant::now();
    let (mut remote_rx, mut remote_tx) = tokio::io::split(remote);
    let (mut client_rx, mut client_tx) = tokio::io::split(client);

    let (up, down) = tokio::join!(
        copy_direction(ctx, hook, &mut remote_tx, &mut client_rx, Direction::ClientToServer),
        copy_direction(ctx, hook, &mut client_tx, &mut remote_rx, Direction::ServerToClient),
    );

    tracing::debug!(
        session = %ctx.session,
        client_to_server = up.bytes,
        server_to_client = down.bytes,
        clean = up.is_ok() && down.is_ok(),
        elapsed = ?start.elapsed(),
        "Relay finished"
    );

    if let Some(close) = ctx.capabilities.close_handler.as_deref() {
        close.on_close(ctx);
    }

    RelayOutcome::Copied {
        client_to_server: up,
        server_to_client: down,
    }
}

/// Run one direction through the hook or the default copy and record the outcome.
async fn copy_direction<W, S>(
    ctx: &ProxyCtx,
    hook: Option<&dyn CopyHook>,
    dst: &mut W,
    src: &mut S,
    direction: Direction,
) -> CopyOutcome
where
    W: AsyncWrite + Unpin + Send,
    S: AsyncRead + Unpin + Send,
{
    let outcome = match hook {
        Some(hook) => hook.copy(dst, src, direction, ctx).await,
        None => copy_or_warn(ctx, dst, src, direction).await,
    };

    metrics::record_relay_bytes(direction.as_str(), outcome.bytes);
    match &outcome.error {
        None => {
            tracing::trace!(session = %ctx.session, %direction, bytes = outcome.bytes, "Direction finished");
        }
        Some(e) => {
            metrics::record_copy_error(direction.as_str());
            if hook.is_some() {
                tracing::debug!(
                    session = %ctx.session,
                    %direction,
                    bytes = outcome.bytes,
                    error = %e,
                    "Copy hook failed"
                );
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::SessionId;
    use std::io;
    use crate::relay::handler::Capabilities;
    use futures_util::future::BoxFuture;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadBuf};
    use tokio::sync::Notify;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn counting_close(count: &Arc<AtomicUsize>) -> impl Fn(&ProxyCtx) + Send + Sync + 'static {
        let count = count.clone();
        move |_ctx: &ProxyCtx| {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Stream whose every read and write fails.
    struct BrokenStream;

    impl AsyncRead for BrokenStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::ErrorKind::ConnectionReset.into()))
        }
    }

    impl AsyncWrite for BrokenStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    struct RecordingHandler {
        calls: Arc<AtomicUsize>,
    }

    impl RelayHandler for RecordingHandler {
        fn handle<'a>(
            &'a self,
            _remote: &'a mut dyn Duplex,
            _client: &'a mut dyn Duplex,
            _ctx: &'a ProxyCtx,
        ) -> BoxFuture<'a, ()> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    /// Copies to EOF, records each direction, and holds client-to-server
    /// open until released.
    struct GatedHook {
        seen: Mutex<Vec<Direction>>,
        started: Notify,
        release: Notify,
    }

    impl CopyHook for GatedHook {
        fn copy<'a>(
            &'a self,
            dst: &'a mut (dyn AsyncWrite + Unpin + Send),
            src: &'a mut (dyn AsyncRead + Unpin + Send),
            direction: Direction,
            _ctx: &'a ProxyCtx,
        ) -> BoxFuture<'a, CopyOutcome> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(direction);
                self.started.notify_one();
                if direction == Direction::ClientToServer {
                    self.release.notified().await;
                }
                CopyOutcome::from(tokio::io::copy(src, dst).await)
            })
        }
    }

    /// Reads everything and forwards it with a suffix appended.
    struct SuffixHook(&'static [u8]);

    impl CopyHook for SuffixHook {
        fn copy<'a>(
            &'a self,
            dst: &'a mut (dyn AsyncWrite + Unpin + Send),
            src: &'a mut (dyn AsyncRead + Unpin + Send),
            _direction: Direction,
            _ctx: &'a ProxyCtx,
        ) -> BoxFuture<'a, CopyOutcome> {
            Box::pin(async move {
                let mut data = Vec::new();
                if let Err(e) = src.read_to_end(&mut data).await {
                    return CopyOutcome::failed(0, e);
                }
                data.extend_from_slice(self.0);
                match dst.write_all(&data).await {
                    Ok(()) => CopyOutcome::done(data.len() as u64),
                    Err(e) => CopyOutcome::failed(0, e),
                }
            })
        }
    }

    struct FailingHook {
        calls: Arc<AtomicUsize>,
    }

    impl CopyHook for FailingHook {
        fn copy<'a>(
            &'a self,
            _dst: &'a mut (dyn AsyncWrite + Unpin + Send),
            _src: &'a mut (dyn AsyncRead + Unpin + Send),
            _direction: Direction,
            _ctx: &'a ProxyCtx,
        ) -> BoxFuture<'a, CopyOutcome> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                CopyOutcome::failed(0, io::Error::new(io::ErrorKind::Other, "hook failed"))
            })
        }
    }

    #[test]
    fn resolve_prefers_handler_over_hook() {
        let calls = counter();
        let caps = Capabilities::passthrough()
            .with_copy_hook(SuffixHook(b"!"))
            .with_relay_handler(RecordingHandler { calls });
        let ctx = ProxyCtx::new(SessionId::next()).with_capabilities(caps);
        assert!(matches!(RelayMode::resolve(&ctx), RelayMode::Takeover(_)));

        let ctx = ProxyCtx::new(SessionId::next())
            .with_capabilities(Capabilities::passthrough().with_copy_hook(SuffixHook(b"!")));
        assert!(matches!(RelayMode::resolve(&ctx), RelayMode::Hooked(_)));

        let ctx = ProxyCtx::new(SessionId::next());
        assert!(matches!(RelayMode::resolve(&ctx), RelayMode::Passthrough));
    }

    #[tokio::test]
    async fn full_handler_takes_over_without_close_notification() {
        let calls = counter();
        let closes = counter();
        let caps = Capabilities::passthrough()
            .with_relay_handler(RecordingHandler { calls: calls.clone() })
            .with_copy_hook(SuffixHook(b"never"))
            .with_close_handler(counting_close(&closes));
        let ctx = ProxyCtx::new(SessionId::next()).with_capabilities(caps);

        let (mut remote, mut remote_peer) = tokio::io::duplex(64);
        let (mut client, mut client_peer) = tokio::io::duplex(64);
        client_peer.write_all(b"hello").await.unwrap();

        let outcome = relay(&ctx, &mut remote, &mut client).await;

        assert!(matches!(outcome, RelayOutcome::TakenOver));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 0);

        // Nothing was copied on the handler's behalf.
        let mut buf = [0u8; 8];
        let read = tokio::time::timeout(Duration::from_millis(50), remote_peer.read(&mut buf)).await;
        assert!(read.is_err());
    }

    #[tokio::test]
    async fn waits_for_both_directions() {
        let hook = Arc::new(GatedHook {
            seen: Mutex::new(Vec::new()),
            started: Notify::new(),
            release: Notify::new(),
        });
        let closes = counter();

        struct Shared(Arc<GatedHook>);
        impl CopyHook for Shared {
            fn copy<'a>(
                &'a self,
                dst: &'a mut (dyn AsyncWrite + Unpin + Send),
                src: &'a mut (dyn AsyncRead + Unpin + Send),
                direction: Direction,
                ctx: &'a ProxyCtx,
            ) -> BoxFuture<'a, CopyOutcome> {
                self.0.copy(dst, src, direction, ctx)
            }
        }

        let caps = Capabilities::passthrough()
            .with_copy_hook(Shared(hook.clone()))
            .with_close_handler(counting_close(&closes));
        let ctx = ProxyCtx::new(SessionId::next()).with_capabilities(caps);

        let (mut remote, mut remote_peer) = tokio::io::duplex(64);
        let (mut client, mut client_peer) = tokio::io::duplex(64);
        let relay_task = tokio::spawn(async move {
            relay(&ctx, &mut remote, &mut client).await;
        });

        // Wait until both directions have been entered.
        while hook.seen.lock().unwrap().len() < 2 {
            hook.started.notified().await;
        }

        // Server-to-client finishes; client-to-server is still gated.
        remote_peer.shutdown().await.unwrap();
        client_peer.shutdown().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!relay_task.is_finished());
        assert_eq!(closes.load(Ordering::SeqCst), 0);

        hook.release.notify_one();
        tokio::time::timeout(Duration::from_secs(1), relay_task)
            .await
            .expect("relay should finish once both directions are done")
            .unwrap();

        let mut seen = hook.seen.lock().unwrap().clone();
        seen.sort_by_key(|d| d.as_str());
        assert_eq!(seen, vec![Direction::ClientToServer, Direction::ServerToClient]);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_fires_once_when_both_hook_directions_fail() {
        let calls = counter();
        let closes = counter();
        let caps = Capabilities::passthrough()
            .with_copy_hook(FailingHook { calls: calls.clone() })
            .with_close_handler(counting_close(&closes));
        let ctx = ProxyCtx::new(SessionId::next()).with_capabilities(caps);

        let (mut remote, _remote_peer) = tokio::io::duplex(64);
        let (mut client, _client_peer) = tokio::io::duplex(64);
        relay(&ctx, &mut remote, &mut client).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_fires_once_when_default_copy_fails() {
        let closes = counter();
        let ctx = ProxyCtx::new(SessionId::next())
            .with_capabilities(Capabilities::passthrough().with_close_handler(counting_close(&closes)));

        relay(&ctx, &mut BrokenStream, &mut BrokenStream).await;

        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn passthrough_relays_both_ways() {
        let closes = counter();
        let ctx = ProxyCtx::new(SessionId::next())
            .with_capabilities(Capabilities::passthrough().with_close_handler(counting_close(&closes)));

        let (mut remote, mut remote_peer) = tokio::io::duplex(64);
        let (mut client, mut client_peer) = tokio::io::duplex(64);
        let relay_task = tokio::spawn(async move { relay(&ctx, &mut remote, &mut client).await });

        client_peer.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        remote_peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        remote_peer.write_all(b"pong").await.unwrap();
        client_peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");

        remote_peer.write_all(b"!").await.unwrap();
        client_peer.read_exact(&mut buf[..1]).await.unwrap();

        client_peer.shutdown().await.unwrap();
        remote_peer.shutdown().await.unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(1), relay_task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        match outcome {
            RelayOutcome::Copied {
                client_to_server,
                server_to_client,
            } => {
                assert!(client_to_server.is_ok() && server_to_client.is_ok());
                assert_eq!(client_to_server.bytes, 4);
                assert_eq!(server_to_client.bytes, 5);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    /// Forwards everything but reports its own byte counts, failing on the
    /// server-to-client direction after a partial transfer.
    struct ReportingHook;

    impl CopyHook for ReportingHook {
        fn copy<'a>(
            &'a self,
            dst: &'a mut (dyn AsyncWrite + Unpin + Send),
            src: &'a mut (dyn AsyncRead + Unpin + Send),
            direction: Direction,
            _ctx: &'a ProxyCtx,
        ) -> BoxFuture<'a, CopyOutcome> {
            Box::pin(async move {
                let _ = tokio::io::copy(src, dst).await;
                match direction {
                    Direction::ClientToServer => CopyOutcome::done(11),
                    Direction::ServerToClient => {
                        CopyOutcome::failed(7, io::ErrorKind::ConnectionAborted.into())
                    }
                }
            })
        }
    }

    #[tokio::test]
    async fn engine_observes_hook_outcome_per_direction() {
        let closes = counter();
        let caps = Capabilities::passthrough()
            .with_copy_hook(ReportingHook)
            .with_close_handler(counting_close(&closes));
        let ctx = ProxyCtx::new(SessionId::next()).with_capabilities(caps);

        let (mut remote, remote_peer) = tokio::io::duplex(64);
        let (mut client, client_peer) = tokio::io::duplex(64);
        drop(remote_peer);
        drop(client_peer);

        match relay(&ctx, &mut remote, &mut client).await {
            RelayOutcome::Copied {
                client_to_server,
                server_to_client,
            } => {
                assert!(client_to_server.is_ok());
                assert_eq!(client_to_server.bytes, 11);
                assert_eq!(server_to_client.bytes, 7);
                assert_eq!(
                    server_to_client.error.map(|e| e.kind()),
                    Some(io::ErrorKind::ConnectionAborted)
                );
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hook_sees_source_and_destination_per_direction() {
        let ctx = ProxyCtx::new(SessionId::next())
            .with_capabilities(Capabilities::passthrough().with_copy_hook(SuffixHook(b"+proxied")));

        let (mut remote, mut remote_peer) = tokio::io::duplex(256);
        let (mut client, mut client_peer) = tokio::io::duplex(256);
        let relay_task = tokio::spawn(async move {
            relay(&ctx, &mut remote, &mut client).await;
        });

        client_peer.write_all(b"from client").await.unwrap();
        client_peer.shutdown().await.unwrap();
        remote_peer.write_all(b"from server").await.unwrap();
        remote_peer.shutdown().await.unwrap();

        let mut at_server = vec![0u8; "from client+proxied".len()];
        remote_peer.read_exact(&mut at_server).await.unwrap();
        assert_eq!(at_server, b"from client+proxied");

        let mut at_client = vec![0u8; "from server+proxied".len()];
        client_peer.read_exact(&mut at_client).await.unwrap();
        assert_eq!(at_client, b"from server+proxied");

        tokio::time::timeout(Duration::from_secs(1), relay_task)
            .await
            .unwrap()
            .unwrap();
    }
}
