//! Provider readers: per-provider strategies that authenticate a request and
//! extract its raw payload.
//!
//! Each reader has the shape `read(headers, body, options) -> bytes` with a
//! typed failure. The provider is selected by the hook's type at resolution
//! time; dispatch lives in [`read_payload`].

pub mod generic;
pub mod github;
pub mod slack;

use axum::http::HeaderMap;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::hooks::definition::{HookOptions, ProviderType};

/// Failures raised while reading and authenticating a request payload.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("unsupported content type '{0}'")]
    UnsupportedContentType(String),

    #[error("missing signature or timestamp header")]
    MissingHeaders,

    #[error("malformed signature header")]
    MalformedSignature,

    #[error("malformed timestamp header")]
    MalformedTimestamp,

    #[error("request timestamp outside the allowed window")]
    StaleTimestamp,

    #[error("signature verification failed")]
    SignatureMismatch,

    #[error("malformed form payload: {0}")]
    MalformedForm(String),

    #[error("failed to read request body: {0}")]
    Io(#[from] std::io::Error),
}

/// Dispatch to the reader matching the hook's provider type.
pub async fn read_payload<R>(
    provider: ProviderType,
    headers: &HeaderMap,
    body: R,
    options: &HookOptions,
) -> Result<Vec<u8>, ReadError>
where
    R: AsyncRead + Unpin + Send,
{
    match provider {
        ProviderType::Github => github::read(headers, body, options).await,
        ProviderType::Slack => slack::read(headers, body, options).await,
        ProviderType::Generic => generic::read(headers, body, options).await,
    }
}

/// Media type portion of a Content-Type header, lowercased with parameters
/// stripped.
pub(crate) fn media_type(headers: &HeaderMap) -> String {
    headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Read the body up to `max_bytes`.
pub(crate) async fn read_bounded<R>(body: R, max_bytes: u64) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin + Send,
{
    let mut buf = Vec::new();
    body.take(max_bytes).read_to_end(&mut buf).await?;
    Ok(buf)
}
