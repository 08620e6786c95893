//! Telegram Bot API publisher
//!
//! The bot token is part of the request path, so transport errors are stripped
//! of their URL before they leave this module.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ChannelPublisher;
use crate::config::TelegramConfig;
use crate::error::{BroadcastError, BroadcastResult};

const SERVICE: &str = "telegram";

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Debug, Deserialize)]
struct TelegramErrorBody {
    description: Option<String>,
}

#[derive(Clone)]
pub struct TelegramPublisher {
    client: Client,
    api_base_url: String,
}

impl TelegramPublisher {
    pub fn new(client: Client, config: &TelegramConfig) -> Self {
        Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn send_message_url(&self, bot_token: &str) -> String {
        format!("{}/bot{}/sendMessage", self.api_base_url, bot_token)
    }
}

#[async_trait]
impl ChannelPublisher for TelegramPublisher {
    async fn publish(&self, bot_token: &str, channel_id: &str, text: &str) -> BroadcastResult<()> {
        let request = SendMessageRequest {
            chat_id: channel_id,
            text,
            parse_mode: "Markdown",
        };

        let response = self
            .client
            .post(self.send_message_url(bot_token))
            .json(&request)
            .send()
            .await
            .map_err(|e| BroadcastError::HttpClient {
                source: e.without_url(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let description = response
                .json::<TelegramErrorBody>()
                .await
                .ok()
                .and_then(|body| body.description)
                .unwrap_or_else(|| status.to_string());
            warn!(
                status = status.as_u16(),
                channel_id = channel_id,
                "Telegram sendMessage failed"
            );
            return Err(BroadcastError::external_api(
                SERVICE,
                status.as_u16(),
                description,
            ));
        }

        debug!(channel_id = channel_id, "Telegram message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn publisher(server: &MockServer) -> TelegramPublisher {
        TelegramPublisher::new(
            Client::new(),
            &TelegramConfig {
                api_base_url: format!("{}/", server.uri()),
            },
        )
    }

    #[tokio::test]
    async fn test_publish_posts_markdown_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_json(json!({
                "chat_id": "@releases",
                "text": "*New release* 🚀",
                "parse_mode": "Markdown"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        publisher(&server)
            .publish("123:abc", "@releases", "*New release* 🚀")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_api_error_carries_description_not_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let error = publisher(&server)
            .publish("123:super-secret", "@missing", "hello")
            .await
            .unwrap_err();

        let rendered = error.to_string();
        assert!(rendered.contains("chat not found"));
        assert!(!rendered.contains("super-secret"));
        assert!(matches!(
            error,
            BroadcastError::ExternalApi {
                status_code: 400,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_transport_error_hides_token() {
        // Nothing listens on this port
        let publisher = TelegramPublisher::new(
            Client::new(),
            &TelegramConfig {
                api_base_url: "http://127.0.0.1:9".to_string(),
            },
        );

        let error = publisher
            .publish("123:super-secret", "@releases", "hello")
            .await
            .unwrap_err();
        assert!(matches!(error, BroadcastError::HttpClient { .. }));
        assert!(!error.to_string().contains("super-secret"));
    }
}
