//! The ingestion service: resolve, read, index, encrypt, assemble.
//!
//! Per-request state machine:
//! 1. resolve the hook from the store snapshot (missing or inactive is
//!    `InvalidHook`),
//! 2. read the payload through the provider reader, tapping the stream with
//!    the field indexer when the hook enables it and the body is JSON,
//! 3. encrypt the payload under an ephemeral key and the serialized headers
//!    under the same key id,
//! 4. assemble the envelope with a fresh correlation id.
//!
//! One metrics observation is recorded per request regardless of outcome.

use axum::http::HeaderMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::io::AsyncRead;
use tracing::warn;
use uuid::Uuid;

use crate::hooks::crypto::{CryptoError, Encryptor};
use crate::hooks::definition::{Hook, DEFAULT_MAX_BODY_BYTES};
use crate::hooks::event::{EventEnvelope, CONTENT_TYPE_JSON, SOURCE_TYPE_WEB_HOOK};
use crate::hooks::indexer::{index_stream, IndexSink};
use crate::hooks::metrics::HookMetrics;
use crate::hooks::providers::{media_type, read_payload, ReadError};
use crate::hooks::store::HookStore;
use crate::hooks::tee::tee;

/// Tee buffer capacity for the indexing tap.
const TEE_CAPACITY: usize = 8192;

/// Terminal failures of the ingestion state machine.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("unresolvable or inactive hook")]
    InvalidHook,

    #[error("payload read failed: {0}")]
    Read(#[source] ReadError),

    #[error("header serialization failed")]
    HeaderSerialize(#[source] serde_json::Error),

    #[error("encryption failed: {0}")]
    Encryption(#[source] CryptoError),
}

impl HookError {
    /// Stable error code recorded with metrics observations.
    pub fn code(&self) -> &'static str {
        match self {
            HookError::InvalidHook => "invalid_hook",
            HookError::Read(_) | HookError::HeaderSerialize(_) => "invalid_payload",
            HookError::Encryption(_) => "invalid_encrypt",
        }
    }
}

/// Orchestrates hook resolution and payload ingestion.
pub struct HookService {
    store: Arc<HookStore>,
    encryptor: Encryptor,
    metrics: Arc<dyn HookMetrics>,
    index_sink: Option<Arc<dyn IndexSink>>,
    server_id: String,
    default_max_bytes: u64,
}

impl HookService {
    pub fn new(
        store: Arc<HookStore>,
        encryptor: Encryptor,
        metrics: Arc<dyn HookMetrics>,
        server_id: impl Into<String>,
    ) -> Self {
        HookService {
            store,
            encryptor,
            metrics,
            index_sink: None,
            server_id: server_id.into(),
            default_max_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Enable field indexing through the given sink.
    pub fn with_index_sink(mut self, sink: Arc<dyn IndexSink>) -> Self {
        self.index_sink = Some(sink);
        self
    }

    /// Override the fallback body ceiling for hooks without a `maxBytes` meta.
    pub fn with_default_max_bytes(mut self, max_bytes: u64) -> Self {
        self.default_max_bytes = max_bytes;
        self
    }

    /// Resolve a hook by id from the store's current view.
    pub fn resolve(&self, id: &str) -> Option<Hook> {
        let def = self.store.get(id)?;
        Hook::from_definition(&def, self.default_max_bytes)
    }

    /// Record the observation for a request that never resolved to a hook.
    pub fn record_unresolved(&self, hook_id: &str, elapsed: Duration) {
        self.metrics
            .record("", hook_id, HookError::InvalidHook.code(), elapsed);
    }

    /// Read, authenticate, optionally index, and encrypt one request.
    pub async fn read_and_encrypt<R>(
        &self,
        headers: &HeaderMap,
        body: R,
        hook: &Hook,
    ) -> Result<EventEnvelope, HookError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let started = Instant::now();
        let result = self.ingest(headers, body, hook).await;
        let error_code = result.as_ref().err().map(HookError::code).unwrap_or("");
        self.metrics.record(
            hook.provider().as_str(),
            hook.id(),
            error_code,
            started.elapsed(),
        );
        result
    }

    async fn ingest<R>(
        &self,
        headers: &HeaderMap,
        body: R,
        hook: &Hook,
    ) -> Result<EventEnvelope, HookError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        if !hook.is_active() {
            return Err(HookError::InvalidHook);
        }

        let indexed = hook.index_fields() && media_type(headers) == "application/json";
        let payload = match (&self.index_sink, indexed) {
            (Some(sink), true) => {
                self.read_with_index(headers, body, hook, Arc::clone(sink))
                    .await?
            }
            _ => read_payload(hook.provider(), headers, body, hook.options())
                .await
                .map_err(HookError::Read)?,
        };

        let (key_id, payload_cipher) = self
            .encryptor
            .encrypt(&payload)
            .map_err(HookError::Encryption)?;
        let header_json = serialize_headers(headers).map_err(HookError::HeaderSerialize)?;
        let header_cipher = self
            .encryptor
            .encrypt_with_key_id(&header_json, &key_id)
            .map_err(HookError::Encryption)?;

        Ok(EventEnvelope {
            correlation_id: Uuid::new_v4().to_string(),
            server_id: self.server_id.clone(),
            source_id: hook.id().to_string(),
            source_type: SOURCE_TYPE_WEB_HOOK,
            received_at_nanos: unix_nanos(),
            header_cipher,
            payload_cipher,
            encryption_key_id: key_id,
            content_type: CONTENT_TYPE_JSON,
        })
    }

    /// Read via the indexing tap. The scanner task and the provider read race
    /// over the same teed bytes; both must finish before the payload is
    /// returned.
    async fn read_with_index<R>(
        &self,
        headers: &HeaderMap,
        body: R,
        hook: &Hook,
        sink: Arc<dyn IndexSink>,
    ) -> Result<Vec<u8>, HookError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (main, tap, pump) = tee(body, hook.options().max_bytes, TEE_CAPACITY);

        let hook_id = hook.id().to_string();
        let scan = tokio::spawn(async move { index_stream(tap, &hook_id, sink.as_ref()).await });

        let read_result = read_payload(hook.provider(), headers, main, hook.options()).await;

        match scan.await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                warn!(target: "hooks", hook_id = hook.id(), error = %err, "field indexing failed")
            }
            Err(err) => {
                warn!(target: "hooks", hook_id = hook.id(), error = %err, "field indexing task panicked")
            }
        }
        if let Ok(Err(err)) = pump.await {
            warn!(target: "hooks", hook_id = hook.id(), error = %err, "body tee failed");
        }

        read_result.map_err(HookError::Read)
    }
}

/// Serialize request headers to canonical JSON (sorted names, repeated
/// headers as arrays).
fn serialize_headers(headers: &HeaderMap) -> Result<Vec<u8>, serde_json::Error> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        map.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    serde_json::to_vec(&map)
}

fn unix_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::crypto::MemoryKeyProvider;
    use crate::hooks::definition::{HookDefinition, ProviderType};
    use crate::hooks::metrics::InProcessMetrics;
    use axum::http::header::CONTENT_TYPE;
    use parking_lot::Mutex;
    use std::io::Cursor;
    use std::time::Duration;

    struct CollectSink(Mutex<Vec<String>>);

    impl IndexSink for CollectSink {
        fn index(&self, _hook_id: &str, field_path: &str) {
            self.0.lock().push(field_path.to_string());
        }
    }

    fn generic_hook(id: &str, active: bool, index_fields: bool) -> Hook {
        let def = HookDefinition {
            id: id.into(),
            name: id.into(),
            provider_type: Some(ProviderType::Generic),
            active,
            index_fields,
            url_context: "/hook".into(),
            ..HookDefinition::default()
        };
        Hook::from_definition(&def, DEFAULT_MAX_BODY_BYTES).expect("hook")
    }

    fn service_with(
        metrics: Arc<InProcessMetrics>,
        sink: Option<Arc<dyn IndexSink>>,
    ) -> (HookService, Encryptor) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = HookStore::new(dir.path(), Duration::from_secs(60));
        let encryptor = Encryptor::new(Arc::new(MemoryKeyProvider::new()));
        let mut service = HookService::new(store, encryptor.clone(), metrics, "server-1");
        if let Some(sink) = sink {
            service = service.with_index_sink(sink);
        }
        (service, encryptor)
    }

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "application/json".parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn inactive_hook_is_invalid() {
        let metrics = Arc::new(InProcessMetrics::new());
        let (service, _) = service_with(Arc::clone(&metrics), None);
        let hook = generic_hook("hk_1", false, false);

        let err = service
            .read_and_encrypt(&json_headers(), Cursor::new(b"{}".to_vec()), &hook)
            .await
            .unwrap_err();
        assert!(matches!(err, HookError::InvalidHook));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].error_code, "invalid_hook");
    }

    #[tokio::test]
    async fn envelope_decrypts_back_to_the_original_payload() {
        let metrics = Arc::new(InProcessMetrics::new());
        let (service, encryptor) = service_with(Arc::clone(&metrics), None);
        let hook = generic_hook("hk_1", true, false);
        let payload = br#"{"action":"push","ref":"main"}"#.to_vec();

        let envelope = service
            .read_and_encrypt(&json_headers(), Cursor::new(payload.clone()), &hook)
            .await
            .expect("ingest");

        assert_eq!(envelope.source_id, "hk_1");
        assert_eq!(envelope.server_id, "server-1");
        assert_eq!(envelope.source_type, "web_hook");
        assert_eq!(envelope.content_type, "json");
        assert!(!envelope.correlation_id.is_empty());

        let decrypted = encryptor
            .decrypt(&envelope.payload_cipher, &envelope.encryption_key_id)
            .expect("decrypt payload");
        assert_eq!(decrypted, payload);

        let headers = encryptor
            .decrypt(&envelope.header_cipher, &envelope.encryption_key_id)
            .expect("decrypt headers");
        let parsed: serde_json::Value = serde_json::from_slice(&headers).expect("json");
        assert_eq!(parsed["content-type"][0], "application/json");
    }

    #[tokio::test]
    async fn indexed_read_emits_paths_and_preserves_the_payload() {
        let metrics = Arc::new(InProcessMetrics::new());
        let sink = Arc::new(CollectSink(Mutex::new(Vec::new())));
        let (service, encryptor) =
            service_with(Arc::clone(&metrics), Some(Arc::clone(&sink) as _));
        let hook = generic_hook("hk_1", true, true);
        let payload = br#"{"a":{"b":1}}"#.to_vec();

        let envelope = service
            .read_and_encrypt(&json_headers(), Cursor::new(payload.clone()), &hook)
            .await
            .expect("ingest");

        let decrypted = encryptor
            .decrypt(&envelope.payload_cipher, &envelope.encryption_key_id)
            .expect("decrypt");
        assert_eq!(decrypted, payload);
        assert_eq!(*sink.0.lock(), vec!["a".to_string(), "a.b".to_string()]);
    }

    #[tokio::test]
    async fn non_json_requests_skip_the_indexer() {
        let metrics = Arc::new(InProcessMetrics::new());
        let sink = Arc::new(CollectSink(Mutex::new(Vec::new())));
        let (service, _) = service_with(Arc::clone(&metrics), Some(Arc::clone(&sink) as _));
        let hook = generic_hook("hk_1", true, true);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "application/octet-stream".parse().unwrap());
        service
            .read_and_encrypt(&headers, Cursor::new(b"blob".to_vec()), &hook)
            .await
            .expect("ingest");
        assert!(sink.0.lock().is_empty());
    }

    #[tokio::test]
    async fn each_request_records_exactly_one_observation() {
        let metrics = Arc::new(InProcessMetrics::new());
        let (service, _) = service_with(Arc::clone(&metrics), None);
        let hook = generic_hook("hk_1", true, false);

        for _ in 0..3 {
            service
                .read_and_encrypt(&json_headers(), Cursor::new(b"{}".to_vec()), &hook)
                .await
                .expect("ingest");
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].requests, 3);
    }
}
