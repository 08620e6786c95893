//! OpenAI-compatible chat completion client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::prompt::{render_prompt, PromptContext};
use super::PostGenerator;
use crate::config::AiConfig;
use crate::error::{BroadcastError, BroadcastResult};
use crate::mode::PublishProfile;

const SERVICE: &str = "ai";
const MAX_ERROR_BODY: usize = 300;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Clone)]
pub struct ChatCompletionGenerator {
    client: Client,
    config: AiConfig,
}

impl ChatCompletionGenerator {
    pub fn new(client: Client, config: AiConfig) -> Self {
        Self { client, config }
    }

    fn build_prompt(&self, summary: &str, repository: &str, profile: &PublishProfile) -> String {
        let template = profile
            .custom_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(&self.config.default_prompt);

        render_prompt(
            template,
            &PromptContext {
                summary,
                repository,
                language: &profile.post_language,
            },
        )
    }

    fn model_for<'a>(&'a self, profile: &'a PublishProfile) -> &'a str {
        if profile.ai_model.is_empty() {
            &self.config.default_model
        } else {
            &profile.ai_model
        }
    }
}

#[async_trait]
impl PostGenerator for ChatCompletionGenerator {
    async fn generate(
        &self,
        summary: &str,
        repository: &str,
        profile: &PublishProfile,
    ) -> BroadcastResult<String> {
        let prompt = self.build_prompt(summary, repository, profile);
        let model = self.model_for(profile);

        let request = ChatCompletionRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!(model = model, prompt_chars = prompt.len(), "Requesting chat completion");

        let mut builder = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&profile.ai_api_key)
            .json(&request);
        if let Some(referer) = &self.config.referer {
            builder = builder.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.config.title {
            builder = builder.header("X-Title", title);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), model = model, "Chat completion request failed");
            return Err(BroadcastError::external_api(
                SERVICE,
                status.as_u16(),
                truncate(&body, MAX_ERROR_BODY),
            ));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| BroadcastError::empty_completion(SERVICE))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SingleTenantConfig;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn generator(server: &MockServer) -> ChatCompletionGenerator {
        let config = AiConfig {
            api_url: format!("{}/api/v1/chat/completions", server.uri()),
            referer: Some("https://commitcast.dev".to_string()),
            ..AiConfig::default()
        };
        ChatCompletionGenerator::new(Client::new(), config)
    }

    fn profile() -> PublishProfile {
        PublishProfile::from(&SingleTenantConfig {
            ai_api_key: "sk-test".to_string(),
            post_language: "en".to_string(),
            ..Default::default()
        })
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({
            "id": "gen-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        })
    }

    #[tokio::test]
    async fn test_generate_sends_chat_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header("x-title", "CommitCast"))
            .and(header("http-referer", "https://commitcast.dev"))
            .and(body_partial_json(json!({
                "model": "meta-llama/llama-3.3-70b-instruct",
                "temperature": 0.7,
                "max_tokens": 500
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("  Shipped it! 🚀 ")))
            .expect(1)
            .mount(&server)
            .await;

        let post = generator(&server)
            .generate("Repository: demo\nCommits: 1", "demo", &profile())
            .await
            .unwrap();
        assert_eq!(post, "Shipped it! 🚀");
    }

    #[tokio::test]
    async fn test_custom_prompt_and_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "model": "mistralai/mistral-7b-instruct",
                "messages": [{"role": "user", "content": "Hype demo in en!\n\nCommits: 1"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let mut profile = profile();
        profile.ai_model = "mistralai/mistral-7b-instruct".to_string();
        profile.custom_prompt = Some("Hype {repository} in {language}!".to_string());

        let post = generator(&server)
            .generate("Commits: 1", "demo", &profile)
            .await
            .unwrap();
        assert_eq!(post, "ok");
    }

    #[tokio::test]
    async fn test_non_success_status_is_external_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let error = generator(&server)
            .generate("Commits: 1", "demo", &profile())
            .await
            .unwrap_err();
        match error {
            BroadcastError::ExternalApi {
                status_code,
                message,
                ..
            } => {
                assert_eq!(status_code, 429);
                assert_eq!(message, "rate limited");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_choices_is_empty_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let error = generator(&server)
            .generate("Commits: 1", "demo", &profile())
            .await
            .unwrap_err();
        assert!(matches!(error, BroadcastError::EmptyCompletion { .. }));
    }

    #[tokio::test]
    async fn test_blank_content_is_empty_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("   ")))
            .mount(&server)
            .await;

        let error = generator(&server)
            .generate("Commits: 1", "demo", &profile())
            .await
            .unwrap_err();
        assert!(matches!(error, BroadcastError::EmptyCompletion { .. }));
    }
}
