//! HTTP handlers for the CommitCast broadcast service
//!
//! Only the webhook route of the configured mode is mounted; `/health` is
//! always available.

use axum::{
    extract::{rejection::BytesRejection, DefaultBodyLimit, Path, State},
    http::HeaderMap,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

use crate::config::DeploymentMode;
use crate::error::{BroadcastError, BroadcastResult};
use crate::models::{HealthResponse, WebhookAck};
use crate::webhook::WebhookRouter;
use crate::{SERVICE_NAME, VERSION};

/// Application state shared across handlers
pub struct AppState {
    pub webhooks: WebhookRouter,
    /// Maximum accepted webhook body in bytes
    pub max_body_size: usize,
}

impl AppState {
    pub fn new(webhooks: WebhookRouter, max_body_size: usize) -> Self {
        Self {
            webhooks,
            max_body_size,
        }
    }
}

/// Create the routes for the configured delivery mode
pub fn create_routes(state: Arc<AppState>) -> Router {
    let routes = Router::new().route("/health", get(health_check));

    let routes = match state.webhooks.mode().kind() {
        DeploymentMode::Single => routes.route("/webhook/github", post(single_tenant_webhook)),
        DeploymentMode::Multi => routes.route("/webhook/github/:token", post(tenant_webhook)),
    };

    routes
        .layer(DefaultBodyLimit::max(state.max_body_size))
        .with_state(state)
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Health check requested");

    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        mode: state.webhooks.mode().kind().as_str(),
        version: VERSION,
        dispatch: state.webhooks.dispatch().snapshot(),
    })
}

async fn single_tenant_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> BroadcastResult<Json<WebhookAck>> {
    let body = read_body(body)?;
    let ack = state.webhooks.handle(None, &headers, &body).await?;
    Ok(Json(ack))
}

async fn tenant_webhook(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> BroadcastResult<Json<WebhookAck>> {
    let body = read_body(body)?;
    let ack = state.webhooks.handle(Some(&token), &headers, &body).await?;
    Ok(Json(ack))
}

fn read_body(body: Result<Bytes, BytesRejection>) -> BroadcastResult<Bytes> {
    body.map_err(|rejection| {
        BroadcastError::invalid_payload(format!("unreadable body: {}", rejection.body_text()))
    })
}
