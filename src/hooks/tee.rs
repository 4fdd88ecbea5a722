//! Bounded stream duplication.
//!
//! [`tee`] yields two independent readers over one producer: every byte read
//! from the source (up to the cap) is delivered identically on both branches.
//! The pump stops at the byte cap, so a consumer that drains its branch always
//! reaches EOF; a branch whose reader is dropped early is skipped without
//! aborting the other.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

/// Pump chunk size.
const CHUNK: usize = 8192;

/// Duplicate `src` into two readers, pumping at most `limit` bytes.
///
/// Returns both branch readers plus the pump task handle; callers must join
/// the handle after both branches are consumed.
pub fn tee<R>(
    src: R,
    limit: u64,
    capacity: usize,
) -> (DuplexStream, DuplexStream, JoinHandle<io::Result<u64>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (a_reader, mut a_writer) = tokio::io::duplex(capacity);
    let (b_reader, mut b_writer) = tokio::io::duplex(capacity);

    let handle = tokio::spawn(async move {
        let mut limited = src.take(limit);
        let mut buf = [0u8; CHUNK];
        let mut total = 0u64;
        let mut a_open = true;
        let mut b_open = true;

        loop {
            let n = limited.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            total += n as u64;
            if a_open && a_writer.write_all(&buf[..n]).await.is_err() {
                a_open = false;
            }
            if b_open && b_writer.write_all(&buf[..n]).await.is_err() {
                b_open = false;
            }
            if !a_open && !b_open {
                break;
            }
        }

        if a_open {
            let _ = a_writer.shutdown().await;
        }
        if b_open {
            let _ = b_writer.shutdown().await;
        }
        Ok(total)
    });

    (a_reader, b_reader, handle)
}
