//! HTTP surface.
//!
//! One route per deployment: `{context}/{id}` accepting POST, PUT, and GET,
//! plus `/healthz`. The handler resolves the hook, streams the body into the
//! ingestion service, and emits the envelope. Failure responses carry status
//! only; internal error text never reaches the caller.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::TryStreamExt;
use serde_json::json;
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::io::StreamReader;
use tracing::{debug, info, warn};

use crate::hooks::emitter::Emitter;
use crate::hooks::metrics::InProcessMetrics;
use crate::hooks::providers::ReadError;
use crate::hooks::service::{HookError, HookService};

/// Shared state for the HTTP surface.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<HookService>,
    pub emitter: Arc<dyn Emitter>,
    pub metrics: Arc<InProcessMetrics>,
    pub server_id: String,
}

/// Build the router. `url_context` must start with `/` and carry no trailing
/// slash (validated by config).
pub fn build_router(state: AppState, url_context: &str) -> Router {
    let hook_path = format!("{url_context}/{{id}}");
    Router::new()
        .route("/healthz", get(healthz))
        .route(&hook_path, post(handle_hook).put(handle_hook).get(handle_hook))
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn serve(addr: &str, state: AppState, url_context: &str) -> io::Result<()> {
    let app = build_router(state, url_context);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(target: "gateway", addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn handle_hook(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let started = Instant::now();

    let Some(hook) = state.service.resolve(&id) else {
        state.service.record_unresolved(&id, started.elapsed());
        return StatusCode::NOT_FOUND.into_response();
    };

    let reader = StreamReader::new(body.into_data_stream().map_err(io::Error::other));
    let envelope = match state.service.read_and_encrypt(&headers, reader, &hook).await {
        Ok(envelope) => envelope,
        Err(err) => {
            debug!(target: "http", hook_id = %id, error = %err, "hook request rejected");
            return error_status(&err).into_response();
        }
    };

    let correlation_id = envelope.correlation_id.clone();
    match state.emitter.emit(envelope).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "ok": true, "correlationId": correlation_id })),
        )
            .into_response(),
        Err(err) => {
            warn!(target: "http", hook_id = %id, error = %err, "event emission failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "serverId": state.server_id,
        "metrics": state.metrics.snapshot(),
    }))
}

/// Map ingestion failures onto response statuses.
fn error_status(err: &HookError) -> StatusCode {
    match err {
        HookError::InvalidHook => StatusCode::NOT_FOUND,
        HookError::Read(read) => match read {
            ReadError::UnsupportedContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ReadError::SignatureMismatch | ReadError::StaleTimestamp => StatusCode::UNAUTHORIZED,
            _ => StatusCode::BAD_REQUEST,
        },
        HookError::HeaderSerialize(_) => StatusCode::BAD_REQUEST,
        HookError::Encryption(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
