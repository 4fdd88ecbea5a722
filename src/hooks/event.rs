//! The normalized, encrypted event envelope produced per accepted request.

use serde::Serialize;

/// Source type stamped on every envelope produced by this gateway.
pub const SOURCE_TYPE_WEB_HOOK: &str = "web_hook";

/// Content type of the encrypted payload.
pub const CONTENT_TYPE_JSON: &str = "json";

/// Normalized output unit handed to the emitter. Constructed fresh per
/// request; owned by the emitter thereafter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Freshly generated per request.
    pub correlation_id: String,
    /// Identity of the ingesting instance.
    pub server_id: String,
    /// Hook id the request resolved to.
    pub source_id: String,
    pub source_type: &'static str,
    pub received_at_nanos: i64,
    /// Encrypted serialized request headers.
    pub header_cipher: Vec<u8>,
    /// Encrypted raw payload bytes.
    pub payload_cipher: Vec<u8>,
    pub encryption_key_id: String,
    pub content_type: &'static str,
}
