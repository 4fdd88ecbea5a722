//! Outbound dispatch seam.
//!
//! Delivery guarantees, retries, and dedup belong to the emitter
//! implementation, not to ingestion.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::hooks::event::EventEnvelope;

/// Emission failures reported back to the HTTP layer.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("emitter rejected the event: {0}")]
    Rejected(String),
}

/// Dispatches an accepted envelope toward its destination.
#[async_trait]
pub trait Emitter: Send + Sync {
    async fn emit(&self, envelope: EventEnvelope) -> Result<(), EmitError>;
}

/// Emitter that logs and drops. Used by the binary until a real destination
/// is wired up, and by tests.
pub struct LogEmitter;

#[async_trait]
impl Emitter for LogEmitter {
    async fn emit(&self, envelope: EventEnvelope) -> Result<(), EmitError> {
        debug!(
            target: "emit",
            correlation_id = %envelope.correlation_id,
            source_id = %envelope.source_id,
            payload_bytes = envelope.payload_cipher.len(),
            "event emitted"
        );
        Ok(())
    }
}
