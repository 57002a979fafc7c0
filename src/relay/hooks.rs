//! Built-in handler sets selectable from configuration.

use futures_util::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::schema::{RelayConfig, RelayModeConfig};
use crate::relay::context::ProxyCtx;
use crate::relay::handler::{Capabilities, CopyHook, CopyOutcome, Direction};

/// Copy hook that forwards chunk by chunk and traces every chunk.
///
/// Useful when debugging a misbehaving upgraded protocol without decoding it.
#[derive(Debug, Clone)]
pub struct InspectHook {
    buffer_size: usize,
}

impl InspectHook {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
        }
    }
}

impl CopyHook for InspectHook {
    fn copy<'a>(
        &'a self,
        dst: &'a mut (dyn AsyncWrite + Unpin + Send),
        src: &'a mut (dyn AsyncRead + Unpin + Send),
        direction: Direction,
        ctx: &'a ProxyCtx,
    ) -> BoxFuture<'a, CopyOutcome> {
        Box::pin(async move {
            let mut buf = vec![0u8; self.buffer_size];
            let mut total: u64 = 0;
            loop {
                let n = match src.read(&mut buf).await {
                    Ok(0) => return CopyOutcome::done(total),
                    Ok(n) => n,
                    Err(e) => {
                        ctx.warn(format_args!("Read error on {}: {}", direction, e));
                        return CopyOutcome::failed(total, e);
                    }
                };
                tracing::trace!(
                    session = %ctx.session,
                    %direction,
                    chunk = n,
                    total = total + n as u64,
                    "Relayed chunk"
                );
                let written = match dst.write_all(&buf[..n]).await {
                    Ok(()) => dst.flush().await,
                    Err(e) => Err(e),
                };
                if let Err(e) = written {
                    ctx.warn(format_args!("Write error on {}: {}", direction, e));
                    return CopyOutcome::failed(total, e);
                }
                total += n as u64;
            }
        })
    }
}

/// Close handler that logs the end of a relay.
pub fn log_close(ctx: &ProxyCtx) {
    tracing::info!(session = %ctx.session, "Upgraded connection closed");
}

impl Capabilities {
    /// Build the handler set described by the relay configuration.
    pub fn from_config(config: &RelayConfig) -> Self {
        let caps = Capabilities::passthrough().with_close_handler(log_close);
        match config.mode {
            RelayModeConfig::Passthrough => caps,
            RelayModeConfig::Inspect => caps.with_copy_hook(InspectHook::new(config.buffer_size)),
        }
    }
}
