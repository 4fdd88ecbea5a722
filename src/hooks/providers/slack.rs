//! Slack-style reader: versioned HMAC-SHA256 signature with a freshness
//! window.
//!
//! The signature base is `"v0:{timestamp}:" + body`. The MAC is fed
//! incrementally while the body is read, so verification never needs a second
//! copy of the body. Requests older (or newer) than five minutes are rejected
//! before the signature is checked.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::hooks::auth::timing_safe_eq;
use crate::hooks::definition::HookOptions;
use crate::hooks::providers::ReadError;

type HmacSha256 = Hmac<Sha256>;

/// Signature header name.
pub const SIGNATURE_HEADER: &str = "X-Slack-Signature";

/// Timestamp header name (unix seconds).
pub const TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";

/// Signature version prefix.
pub const SIGNATURE_VERSION: &str = "v0";

/// Maximum allowed clock skew (5 minutes).
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Read and verify a Slack-style request.
pub async fn read<R>(
    headers: &HeaderMap,
    body: R,
    options: &HookOptions,
) -> Result<Vec<u8>, ReadError>
where
    R: AsyncRead + Unpin + Send,
{
    debug!(target: "hooks", "reading slack request");
    read_at(headers, body, options, unix_now()).await
}

/// Same as [`read`] with an explicit clock, for freshness tests.
pub async fn read_at<R>(
    headers: &HeaderMap,
    body: R,
    options: &HookOptions,
    now_unix: i64,
) -> Result<Vec<u8>, ReadError>
where
    R: AsyncRead + Unpin + Send,
{
    let verifier = SignatureVerifier::from_headers(headers, &options.secret, now_unix)?;

    // Tee: the MAC observes exactly the bytes handed downstream.
    let mut mac = verifier.mac;
    let mut payload = Vec::new();
    let mut limited = body.take(options.max_bytes);
    let mut chunk = [0u8; 8192];
    loop {
        let n = limited.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        mac.update(&chunk[..n]);
        payload.extend_from_slice(&chunk[..n]);
    }

    let digest = mac.finalize().into_bytes();
    if !timing_safe_eq(&digest, &verifier.signature) {
        return Err(ReadError::SignatureMismatch);
    }

    Ok(payload)
}

/// Signature state parsed from the request headers.
struct SignatureVerifier {
    signature: Vec<u8>,
    mac: HmacSha256,
}

impl SignatureVerifier {
    /// Parse and freshness-check the signature headers. Missing headers are a
    /// structural failure distinct from a mismatch.
    fn from_headers(
        headers: &HeaderMap,
        secret: &str,
        now_unix: i64,
    ) -> Result<SignatureVerifier, ReadError> {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty());
        let timestamp = headers
            .get(TIMESTAMP_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty());
        let (signature, timestamp) = match (signature, timestamp) {
            (Some(s), Some(t)) => (s, t),
            _ => return Err(ReadError::MissingHeaders),
        };

        let ts: i64 = timestamp.parse().map_err(|_| ReadError::MalformedTimestamp)?;
        // abs_diff: extreme timestamps must not overflow the skew check.
        if now_unix.abs_diff(ts) > SIGNATURE_TOLERANCE_SECS as u64 {
            return Err(ReadError::StaleTimestamp);
        }

        let prefix = format!("{SIGNATURE_VERSION}=");
        let sig_hex = signature
            .strip_prefix(&prefix)
            .ok_or(ReadError::MalformedSignature)?;
        let signature = hex::decode(sig_hex).map_err(|_| ReadError::MalformedSignature)?;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(format!("{SIGNATURE_VERSION}:{timestamp}:").as_bytes());

        Ok(SignatureVerifier { signature, mac })
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// HMAC-SHA256 signature header value for a timestamped body, `v0=<hex>`.
pub fn sign(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(format!("{SIGNATURE_VERSION}:{timestamp}:").as_bytes());
    mac.update(body);
    format!("{SIGNATURE_VERSION}={}", hex::encode(mac.finalize().into_bytes()))
}
