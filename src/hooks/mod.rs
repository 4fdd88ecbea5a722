//! Hook ingestion core.
//!
//! Receives inbound provider callbacks, authenticates them per the
//! provider's signing protocol, streams and optionally indexes the payload,
//! encrypts payload and headers, and hands a normalized envelope to the
//! emitter seam.

pub mod auth;
pub mod crypto;
pub mod definition;
pub mod emitter;
pub mod event;
pub mod indexer;
pub mod metrics;
pub mod providers;
pub mod service;
pub mod store;
pub mod tee;

pub use crypto::{CryptoError, EncryptionKey, Encryptor, KeyProvider, MemoryKeyProvider};
pub use definition::{Hook, HookDefinition, HookOptions, ProviderType, DEFAULT_MAX_BODY_BYTES};
pub use emitter::{EmitError, Emitter, LogEmitter};
pub use event::EventEnvelope;
pub use indexer::{FieldScanner, IndexSink, LogIndexSink};
pub use metrics::{HookMetrics, InProcessMetrics, MetricsEntry};
pub use providers::ReadError;
pub use service::{HookError, HookService};
pub use store::HookStore;
