//! Generic reader: bounded body read, no signature verification.

use axum::http::HeaderMap;
use tokio::io::AsyncRead;
use tracing::debug;

use crate::hooks::definition::HookOptions;
use crate::hooks::providers::{read_bounded, ReadError};

/// Read up to the configured byte ceiling from the request body.
pub async fn read<R>(
    _headers: &HeaderMap,
    body: R,
    options: &HookOptions,
) -> Result<Vec<u8>, ReadError>
where
    R: AsyncRead + Unpin + Send,
{
    debug!(target: "hooks", "reading generic request");
    Ok(read_bounded(body, options.max_bytes).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn returns_payload_unmodified_within_ceiling() {
        let payload = br#"{"kind":"ping","n":1}"#.to_vec();
        let opts = HookOptions {
            max_bytes: 1024,
            ..HookOptions::default()
        };
        let got = read(&HeaderMap::new(), Cursor::new(payload.clone()), &opts)
            .await
            .expect("read");
        assert_eq!(got, payload);
    }

    #[tokio::test]
    async fn truncates_at_the_byte_ceiling() {
        let payload = vec![b'x'; 64];
        let opts = HookOptions {
            max_bytes: 16,
            ..HookOptions::default()
        };
        let got = read(&HeaderMap::new(), Cursor::new(payload), &opts)
            .await
            .expect("read");
        assert_eq!(got.len(), 16);
    }
}
