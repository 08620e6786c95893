//! Per-delivery webhook flow
//!
//! resolve target → verify signature → parse → filter → enqueue → acknowledge.
//! The HTTP layer has already read the body by the time [`WebhookRouter::handle`]
//! runs, and nothing after the enqueue can change the response.

use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::signature::{self, SIGNATURE_HEADER};
use crate::dispatch::{BroadcastJob, DispatchHandle};
use crate::error::{BroadcastError, BroadcastResult};
use crate::mode::DeliveryMode;
use crate::models::{PushEvent, WebhookAck};
use crate::tenant::token_prefix;

pub const EVENT_HEADER: &str = "x-github-event";
pub const DELIVERY_HEADER: &str = "x-github-delivery";

#[derive(Clone)]
pub struct WebhookRouter {
    mode: Arc<dyn DeliveryMode>,
    dispatch: DispatchHandle,
}

impl WebhookRouter {
    pub fn new(mode: Arc<dyn DeliveryMode>, dispatch: DispatchHandle) -> Self {
        Self { mode, dispatch }
    }

    pub fn mode(&self) -> &dyn DeliveryMode {
        self.mode.as_ref()
    }

    pub fn dispatch(&self) -> &DispatchHandle {
        &self.dispatch
    }

    /// Run one delivery through the synchronous part of the pipeline.
    pub async fn handle(
        &self,
        token: Option<&str>,
        headers: &HeaderMap,
        body: &[u8],
    ) -> BroadcastResult<WebhookAck> {
        let delivery_id = header_str(headers, DELIVERY_HEADER)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let event_kind = header_str(headers, EVENT_HEADER).unwrap_or_default();
        let token_hint = token.map(token_prefix).unwrap_or_default();

        let target = self.mode.resolve(token).await.map_err(|e| {
            warn!(
                delivery_id = %delivery_id,
                token_prefix = %token_hint,
                error = %e,
                "Delivery target not resolved"
            );
            e
        })?;

        if target.webhook_secret.is_empty() {
            warn!(
                delivery_id = %delivery_id,
                "No webhook secret configured; accepting unsigned delivery"
            );
        }
        let signature = header_str(headers, SIGNATURE_HEADER).unwrap_or_default();
        if !signature::verify(body, signature, &target.webhook_secret) {
            let reason = if signature.is_empty() {
                "missing signature header"
            } else {
                "signature mismatch"
            };
            warn!(
                delivery_id = %delivery_id,
                tenant_id = ?target.tenant_id,
                reason = reason,
                "Webhook signature rejected"
            );
            return Err(BroadcastError::signature_verification(reason));
        }

        let event = PushEvent::parse(event_kind, body)?;
        if !event.is_actionable() {
            info!(
                delivery_id = %delivery_id,
                event_kind = event_kind,
                commit_count = event.commits.len(),
                "Event ignored"
            );
            return Ok(WebhookAck::ignored());
        }

        info!(
            delivery_id = %delivery_id,
            tenant_id = ?target.tenant_id,
            repository = %event.repository.name,
            commit_count = event.commits.len(),
            "Push accepted"
        );

        let job = BroadcastJob {
            delivery_id: delivery_id.clone(),
            tenant_id: target.tenant_id,
            event,
            profile: target.profile,
        };
        if let Err(e) = self.dispatch.enqueue(job) {
            // Still acknowledged: delivery is best effort
            error!(
                delivery_id = %delivery_id,
                tenant_id = ?target.tenant_id,
                error = %e,
                "Broadcast job dropped"
            );
        }

        Ok(WebhookAck::received())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DispatchConfig, SingleTenantConfig};
    use crate::dispatch::Dispatcher;
    use crate::mode::SingleTenantMode;
    use crate::publishing::{MockChannelPublisher, MockPostGenerator};
    use axum::http::{HeaderValue, StatusCode};
    use serde_json::json;

    fn single_tenant(secret: &str) -> Arc<dyn DeliveryMode> {
        Arc::new(SingleTenantMode::new(&SingleTenantConfig {
            github_webhook_secret: secret.to_string(),
            telegram_bot_token: "123:abc".to_string(),
            telegram_channel_id: "@releases".to_string(),
            ai_api_key: "sk-test".to_string(),
            ..Default::default()
        }))
    }

    fn untouched_dispatcher() -> Dispatcher {
        let mut generator = MockPostGenerator::new();
        generator.expect_generate().never();
        let mut publisher = MockChannelPublisher::new();
        publisher.expect_publish().never();
        Dispatcher::start(
            &DispatchConfig::default(),
            Arc::new(generator),
            Arc::new(publisher),
        )
    }

    fn headers(event: &str, signature: Option<String>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(EVENT_HEADER, HeaderValue::from_str(event).unwrap());
        headers.insert(DELIVERY_HEADER, HeaderValue::from_static("delivery-1"));
        if let Some(signature) = signature {
            headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&signature).unwrap());
        }
        headers
    }

    fn push_body(commits: usize) -> Vec<u8> {
        let commits: Vec<_> = (0..commits)
            .map(|i| json!({"id": format!("c{}", i), "message": format!("commit {}", i)}))
            .collect();
        json!({"repository": {"name": "demo"}, "commits": commits})
            .to_string()
            .into_bytes()
    }

    #[tokio::test]
    async fn test_non_push_event_is_ignored() {
        let dispatcher = untouched_dispatcher();
        let router = WebhookRouter::new(single_tenant("hush"), dispatcher.handle());
        let body = push_body(3);

        let ack = router
            .handle(
                None,
                &headers("issues", Some(signature::signature_header(&body, "hush"))),
                &body,
            )
            .await
            .unwrap();

        assert_eq!(ack, WebhookAck::ignored());
        assert_eq!(dispatcher.shutdown().await.enqueued, 0);
    }

    #[tokio::test]
    async fn test_missing_signature_is_rejected_before_parsing() {
        let dispatcher = untouched_dispatcher();
        let router = WebhookRouter::new(single_tenant("hush"), dispatcher.handle());

        let error = router
            .handle(None, &headers("push", None), b"definitely not json")
            .await
            .unwrap_err();

        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_malformed_body_with_valid_signature() {
        let dispatcher = untouched_dispatcher();
        let router = WebhookRouter::new(single_tenant("hush"), dispatcher.handle());
        let body = b"{\"commits\": [".to_vec();

        let error = router
            .handle(
                None,
                &headers("push", Some(signature::signature_header(&body, "hush"))),
                &body,
            )
            .await
            .unwrap_err();

        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_push_without_commits_is_ignored() {
        let dispatcher = untouched_dispatcher();
        let router = WebhookRouter::new(single_tenant(""), dispatcher.handle());
        let body = push_body(0);

        let ack = router
            .handle(None, &headers("push", None), &body)
            .await
            .unwrap();

        assert_eq!(ack, WebhookAck::ignored());
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_push_is_enqueued() {
        let mut generator = MockPostGenerator::new();
        generator
            .expect_generate()
            .times(1)
            .returning(|_, _, _| Ok("post".to_string()));
        let mut publisher = MockChannelPublisher::new();
        publisher
            .expect_publish()
            .times(1)
            .returning(|_, _, _| Ok(()));
        let dispatcher = Dispatcher::start(
            &DispatchConfig::default(),
            Arc::new(generator),
            Arc::new(publisher),
        );
        let router = WebhookRouter::new(single_tenant("hush"), dispatcher.handle());
        let body = push_body(2);

        let ack = router
            .handle(
                None,
                &headers("push", Some(signature::signature_header(&body, "hush"))),
                &body,
            )
            .await
            .unwrap();

        assert_eq!(ack, WebhookAck::received());
        let snapshot = dispatcher.shutdown().await;
        assert_eq!(snapshot.enqueued, 1);
        assert_eq!(snapshot.published, 1);
    }

    #[tokio::test]
    async fn test_closed_queue_still_acknowledges() {
        let dispatcher = untouched_dispatcher();
        let handle = dispatcher.handle();
        dispatcher.shutdown().await;

        let router = WebhookRouter::new(single_tenant(""), handle);
        let body = push_body(1);
        let ack = router
            .handle(None, &headers("push", None), &body)
            .await
            .unwrap();

        assert_eq!(ack, WebhookAck::received());
        assert_eq!(router.dispatch().snapshot().rejected, 1);
    }
}
