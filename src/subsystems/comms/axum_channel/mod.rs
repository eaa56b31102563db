//! Axum-based HTTP channel.
//!
//! `run()` drives the axum event loop; the shared [`CancellationToken`] is
//! wired to axum's graceful shutdown.
//!
//! ## URL layout
//!
//! ```text
//! POST /api/chat                              { message, session_id? } → { message }
//! GET  /api/health
//! GET  /api/sessions/{session_id}/transcript
//! ```

mod api;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::AppError;
use crate::subsystems::chat::ChatRelay;
use crate::subsystems::runtime::{Component, ComponentFuture};

// ── Shared request state ──────────────────────────────────────────────────────

/// Router state injected into every handler. Cheap to clone.
#[derive(Clone)]
pub(crate) struct AxumState {
    /// Channel identifier used in log fields.
    pub channel_id: Arc<str>,
    pub relay: Arc<ChatRelay>,
}

// ── AxumChannel ───────────────────────────────────────────────────────────────

pub struct AxumChannel {
    channel_id: String,
    bind_addr: String,
    relay: Arc<ChatRelay>,
}

impl AxumChannel {
    pub fn new(
        channel_id: impl Into<String>,
        bind_addr: impl Into<String>,
        relay: Arc<ChatRelay>,
    ) -> Self {
        Self { channel_id: channel_id.into(), bind_addr: bind_addr.into(), relay }
    }
}

impl Component for AxumChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_axum(self.channel_id, self.bind_addr, self.relay, shutdown))
    }
}

// ── Server loop ───────────────────────────────────────────────────────────────

async fn run_axum(
    channel_id: String,
    bind_addr: String,
    relay: Arc<ChatRelay>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let router = router_with_id(&channel_id, relay);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| AppError::Comms(format!("axum bind failed on {bind_addr}: {e}")))?;

    info!(%channel_id, %bind_addr, "axum channel listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Comms(format!("axum server error: {e}")))?;

    info!(%channel_id, "axum channel shut down");
    Ok(())
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Router for the chat API, usable without a listener (tests, embedding).
pub fn build_router(relay: Arc<ChatRelay>) -> Router {
    router_with_id("http", relay)
}

fn router_with_id(channel_id: &str, relay: Arc<ChatRelay>) -> Router {
    let state = AxumState { channel_id: Arc::from(channel_id), relay };
    Router::new()
        .route("/api/chat",                                 post(api::chat))
        .route("/api/health",                               get(api::health))
        .route("/api/sessions/{session_id}/transcript",     get(api::session_transcript))
        .with_state(state)
}
