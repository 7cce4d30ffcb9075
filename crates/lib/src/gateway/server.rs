//! Gateway HTTP server (single port) and the event processor behind it.

use crate::config::{self, Settings};
use crate::gateway::signature::{self, SIGNATURE_HEADER};
use crate::relay::{Outcome, Relay};
use crate::webex::{WebexClient, WebhookEvent};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Deliveries waiting behind the event in progress.
const QUEUE_DEPTH: usize = 64;

/// Why a webhook delivery was refused before reaching the relay.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("missing {} header", SIGNATURE_HEADER)]
    MissingSignature,
    #[error("signature mismatch: an unauthorized message was sent to us")]
    BadSignature,
    #[error("malformed event body: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("event processor has stopped")]
    QueueClosed,
}

impl SubmitError {
    pub fn status(&self) -> StatusCode {
        match self {
            SubmitError::MissingSignature | SubmitError::BadSignature => StatusCode::FORBIDDEN,
            SubmitError::Malformed(_) => StatusCode::BAD_REQUEST,
            SubmitError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Authenticate (when a secret is configured) and parse one delivery.
pub fn decode_event(
    secret: Option<&str>,
    body: &[u8],
    signature_header: Option<&str>,
) -> Result<WebhookEvent, SubmitError> {
    if let Some(secret) = secret {
        let provided = signature_header.ok_or(SubmitError::MissingSignature)?;
        if !signature::verify(secret, body, provided) {
            return Err(SubmitError::BadSignature);
        }
    }
    Ok(serde_json::from_slice(body)?)
}

/// Shared state for the gateway routes.
#[derive(Clone)]
pub struct GatewayState {
    pub settings: Arc<Settings>,
    /// Accepted events, consumed in order by the processor task.
    pub queue: mpsc::Sender<WebhookEvent>,
}

impl GatewayState {
    pub async fn submit(&self, body: &[u8], signature_header: Option<&str>) -> Result<(), SubmitError> {
        let event = decode_event(self.settings.webhook_secret.as_deref(), body, signature_header)?;
        log::info!(
            "accepted {}/{} event {}",
            event.resource,
            event.event,
            event.data.id
        );
        self.queue
            .send(event)
            .await
            .map_err(|_| SubmitError::QueueClosed)
    }
}

/// Relay backed by the Webex REST client.
pub fn build_relay(settings: &Settings) -> Result<Relay> {
    let client = WebexClient::new(
        Some(settings.api_base.clone()),
        settings.bot_token.clone(),
        settings.request_timeout,
    )
    .context("building webex client")?;
    Ok(Relay::new(Arc::new(client), settings.relay.clone()))
}

/// Process one delivery without a server (e.g. `herald handle`). The signature is only
/// checked when one is given; giving one without a configured secret is an error.
pub async fn handle_one(
    relay: &Relay,
    settings: &Settings,
    body: &[u8],
    signature_header: Option<&str>,
) -> Result<Option<Outcome>> {
    let secret = match signature_header {
        Some(_) => Some(settings.webhook_secret.as_deref().context(
            "a signature was given but no webhook secret is configured (set webex.webhookSecret or ANNOUNCE_SECRET)",
        )?),
        None => None,
    };
    let event = decode_event(secret, body, signature_header)?;
    Ok(relay.handle_within(&event, settings.event_deadline).await)
}

pub fn router(state: GatewayState) -> Router {
    let webhook_path = state.settings.webhook_path.clone();
    Router::new()
        .route("/", get(health_http))
        .route(&webhook_path, post(webhook))
        .with_state(state)
}

/// Blocks until shutdown (e.g. Ctrl+C).
/// Refuses a non-loopback bind unless a webhook secret is configured.
pub async fn run_gateway(settings: Settings) -> Result<()> {
    if !config::is_loopback_bind(&settings.bind) && settings.webhook_secret.is_none() {
        anyhow::bail!(
            "refusing to bind gateway to {} without a webhook secret (set webex.webhookSecret or {})",
            settings.bind,
            config::ENV_WEBHOOK_SECRET
        );
    }
    if settings.webhook_secret.is_none() {
        log::warn!("no webhook secret configured; deliveries are not authenticated");
    }

    let settings = Arc::new(settings);
    let relay = Arc::new(build_relay(&settings)?);
    let (queue_tx, queue_rx) = mpsc::channel(QUEUE_DEPTH);
    let processor = tokio::spawn(process_events(relay, settings.event_deadline, queue_rx));

    let app = router(GatewayState {
        settings: settings.clone(),
        queue: queue_tx,
    });

    let bind_addr = format!("{}:{}", settings.bind, settings.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!(
        "gateway listening on {} (webhook at {})",
        bind_addr,
        settings.webhook_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;

    // Queued events are dropped; an in-flight one is cancelled and its staged file removed.
    processor.abort();
    let _ = processor.await;
    log::info!("gateway stopped");
    Ok(())
}

/// Handles events strictly one at a time, each under `deadline`.
async fn process_events(
    relay: Arc<Relay>,
    deadline: Duration,
    mut queue: mpsc::Receiver<WebhookEvent>,
) {
    while let Some(event) = queue.recv().await {
        if let Some(outcome) = relay.handle_within(&event, deadline).await {
            log::debug!("event {} finished: {:?}", event.data.id, outcome);
        }
    }
    log::debug!("event queue closed");
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// POST <webhookPath>: verifies the signature, parses the event and queues it.
async fn webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let provided = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    match state.submit(&body, provided).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            log::warn!("rejected webhook delivery: {}", e);
            e.status()
        }
    }
}

/// GET / returns a simple health JSON (for health checks).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "service": "herald",
        "port": state.settings.port,
        "webhookPath": state.settings.webhook_path,
    }))
}
