// src/analysis/llm_client.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::core::ServiceClient;
use crate::utils::strip_code_fences;

const CHAT_COMPLETIONS_ENDPOINT: &str = "/v1/chat/completions";

/// A chat model that answers with a single JSON object.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete_json(&self, system: &str, user: &str) -> Result<Value>;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat completions client.
pub struct OpenAiChatClient {
    client: ServiceClient,
    model: String,
}

impl OpenAiChatClient {
    pub fn new(client: ServiceClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

/// Parse model output as JSON, tolerating a markdown fence around it.
pub fn parse_json_content(content: &str) -> Result<Value> {
    let body = strip_code_fences(content);
    serde_json::from_str(body)
        .with_context(|| format!("Model did not return valid JSON: {}", body))
}

#[async_trait]
impl LanguageModel for OpenAiChatClient {
    async fn complete_json(&self, system: &str, user: &str) -> Result<Value> {
        let request = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        info!("Sending chat completion to {} ({})", self.client.base_url(), self.model);
        let response: ChatResponse = self
            .client
            .post_json(CHAT_COMPLETIONS_ENDPOINT, &request)
            .await
            .context("Chat completion request failed")?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .context("Chat completion returned no content")?;

        parse_json_content(&content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat_client(server: &MockServer) -> OpenAiChatClient {
        let client = ServiceClient::new(&server.uri(), 5)
            .unwrap()
            .with_bearer_token(Some("sk-test".to_string()))
            .with_retry(1, Duration::from_millis(1));
        OpenAiChatClient::new(client, "gpt-4-turbo")
    }

    #[test]
    fn test_parse_fenced_content() {
        let value = parse_json_content("```json\n{\"skills\": [\"Rust\"]}\n```").unwrap();
        assert_eq!(value["skills"][0], "Rust");
        assert!(parse_json_content("not json").is_err());
    }

    #[tokio::test]
    async fn test_complete_json_requests_json_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4-turbo",
                "temperature": 0.0,
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"summary\": \"ok\"}"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let value = chat_client(&server)
            .complete_json("system prompt", "user prompt")
            .await
            .unwrap();
        assert_eq!(value["summary"], "ok");
    }

    #[tokio::test]
    async fn test_error_status_surfaces_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let err = chat_client(&server)
            .complete_json("s", "u")
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("invalid api key"));
    }

    #[tokio::test]
    async fn test_empty_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        assert!(chat_client(&server).complete_json("s", "u").await.is_err());
    }
}
