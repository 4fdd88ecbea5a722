//! GitHub-style reader: HMAC-SHA1 signature over the payload bytes.
//!
//! JSON requests carry the payload in the body; form-encoded requests carry
//! it in the `payload` form field. When the hook has a shared secret the
//! `X-Hub-Signature` header (`sha1=<hex>`) must match an HMAC over the exact
//! payload bytes. An empty secret skips verification; that is a development
//! allowance, production hooks are expected to configure one.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha1::Sha1;
use tokio::io::AsyncRead;
use tracing::debug;

use crate::hooks::auth::timing_safe_eq;
use crate::hooks::definition::HookOptions;
use crate::hooks::providers::{media_type, read_bounded, ReadError};

type HmacSha1 = Hmac<Sha1>;

/// Signature header name.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature";

/// Form field holding the JSON payload for form-encoded deliveries.
const PAYLOAD_FORM_PARAM: &str = "payload";

#[derive(Deserialize)]
struct PayloadForm {
    #[serde(default, rename = "payload")]
    payload: String,
}

/// Read and verify a GitHub-style request.
pub async fn read<R>(
    headers: &HeaderMap,
    body: R,
    options: &HookOptions,
) -> Result<Vec<u8>, ReadError>
where
    R: AsyncRead + Unpin + Send,
{
    debug!(target: "hooks", "reading github request");

    let payload = match media_type(headers).as_str() {
        "application/json" => read_bounded(body, options.max_bytes).await?,
        "application/x-www-form-urlencoded" => {
            let raw = read_bounded(body, options.max_bytes).await?;
            let form: PayloadForm = serde_urlencoded::from_bytes(&raw)
                .map_err(|e| ReadError::MalformedForm(e.to_string()))?;
            form.payload.into_bytes()
        }
        other => return Err(ReadError::UnsupportedContentType(other.to_string())),
    };

    if !options.secret.is_empty() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(ReadError::MissingHeaders)?;
        verify_signature(signature, &payload, options.secret.as_bytes())?;
    }

    Ok(payload)
}

/// Check a `sha1=<hex>` header against the HMAC of `payload`.
fn verify_signature(header: &str, payload: &[u8], secret: &[u8]) -> Result<(), ReadError> {
    let expected = parse_signature_header(header).ok_or(ReadError::MalformedSignature)?;
    let digest = compute_signature(payload, secret);
    if timing_safe_eq(&digest, &expected) {
        Ok(())
    } else {
        Err(ReadError::SignatureMismatch)
    }
}

/// Parse an `sha1=<hex>` signature header into raw bytes.
///
/// Returns `None` for malformed headers (missing prefix, invalid hex).
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.strip_prefix("sha1=")?;
    hex::decode(hex_sig).ok()
}

/// HMAC-SHA1 of a payload under the given secret.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Format a signature as an `sha1=<hex>` header value.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("sha1={}", hex::encode(signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::CONTENT_TYPE;
    use std::io::Cursor;

    const SECRET: &str = "qwertyuiop";

    fn options(secret: &str) -> HookOptions {
        HookOptions {
            secret: secret.to_string(),
            max_bytes: 4096,
            ..HookOptions::default()
        }
    }

    fn json_headers(body: &[u8], secret: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "application/json".parse().unwrap());
        let sig = format_signature_header(&compute_signature(body, secret.as_bytes()));
        headers.insert(SIGNATURE_HEADER, sig.parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn json_body_with_valid_signature_passes() {
        let body = br#"{"zen":"Design for failure.","hook_id":271236003}"#.to_vec();
        let headers = json_headers(&body, SECRET);
        let got = read(&headers, Cursor::new(body.clone()), &options(SECRET))
            .await
            .expect("read");
        assert_eq!(got, body);
    }

    #[tokio::test]
    async fn mutated_body_fails_verification() {
        let body = br#"{"zen":"Design for failure."}"#.to_vec();
        let headers = json_headers(&body, SECRET);
        let mut tampered = body.clone();
        tampered[2] ^= 0x01;
        let err = read(&headers, Cursor::new(tampered), &options(SECRET))
            .await
            .unwrap_err();
        assert!(matches!(err, ReadError::SignatureMismatch));
    }

    #[tokio::test]
    async fn mutated_signature_header_fails_verification() {
        let body = br#"{"zen":"Design for failure."}"#.to_vec();
        let mut headers = json_headers(&body, SECRET);
        let sig = format_signature_header(&compute_signature(&body, b"other-secret"));
        headers.insert(SIGNATURE_HEADER, sig.parse().unwrap());
        let err = read(&headers, Cursor::new(body), &options(SECRET))
            .await
            .unwrap_err();
        assert!(matches!(err, ReadError::SignatureMismatch));
    }

    #[tokio::test]
    async fn missing_signature_with_secret_configured_fails() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "application/json".parse().unwrap());
        let err = read(&headers, Cursor::new(b"{}".to_vec()), &options(SECRET))
            .await
            .unwrap_err();
        assert!(matches!(err, ReadError::MissingHeaders));
    }

    #[tokio::test]
    async fn empty_secret_skips_verification() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "application/json".parse().unwrap());
        let body = br#"{"unsigned":true}"#.to_vec();
        let got = read(&headers, Cursor::new(body.clone()), &options(""))
            .await
            .expect("read");
        assert_eq!(got, body);
    }

    #[tokio::test]
    async fn form_encoded_payload_is_extracted_and_verified() {
        let inner = r#"{"action":"opened"}"#;
        let form = serde_urlencoded::to_string([("payload", inner)]).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            "application/x-www-form-urlencoded".parse().unwrap(),
        );
        let sig = format_signature_header(&compute_signature(inner.as_bytes(), SECRET.as_bytes()));
        headers.insert(SIGNATURE_HEADER, sig.parse().unwrap());

        let got = read(&headers, Cursor::new(form.into_bytes()), &options(SECRET))
            .await
            .expect("read");
        assert_eq!(got, inner.as_bytes());
    }

    #[tokio::test]
    async fn unsupported_content_type_is_a_hard_failure() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "text/plain".parse().unwrap());
        let err = read(&headers, Cursor::new(b"hi".to_vec()), &options(""))
            .await
            .unwrap_err();
        assert!(matches!(err, ReadError::UnsupportedContentType(ct) if ct == "text/plain"));
    }

    #[test]
    fn malformed_signature_headers_are_rejected() {
        assert!(parse_signature_header("abcd").is_none());
        assert!(parse_signature_header("sha256=abcd").is_none());
        assert!(parse_signature_header("sha1=zz").is_none());
    }
}
