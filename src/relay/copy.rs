//! Default single-direction copy.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::relay::context::ProxyCtx;
use crate::relay::handler::{CopyOutcome, Direction};

const COPY_BUFFER_SIZE: usize = 8 * 1024;

/// Copy from `src` to `dst` until EOF, warning on failure.
///
/// Every chunk is flushed before the next read. On failure the outcome keeps
/// the bytes already written; the error is already reported, so callers
/// should not log it again.
pub async fn copy_or_warn<W, R>(
    ctx: &ProxyCtx,
    dst: &mut W,
    src: &mut R,
    direction: Direction,
) -> CopyOutcome
where
    W: AsyncWrite + Unpin + ?Sized,
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut bytes = 0u64;
    loop {
        let n = match src.read(&mut buf).await {
            Ok(0) => return CopyOutcome::done(bytes),
            Ok(n) => n,
            Err(e) => {
                ctx.warn(format_args!("Error copying {}: {}", direction, e));
                return CopyOutcome::failed(bytes, e);
            }
        };
        let written = match dst.write_all(&buf[..n]).await {
            Ok(()) => dst.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            ctx.warn(format_args!("Error copying {}: {}", direction, e));
            return CopyOutcome::failed(bytes, e);
        }
        bytes += n as u64;
    }
}
