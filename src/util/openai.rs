use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

use crate::config::HttpClientConfig;

use super::llm::{
    build_http_client, ChatMessage, CompletionRequest, Embedder, LlmBackend, ProviderSettings,
    Role, TextGenerator,
};

/// Client for the OpenAI chat-completions and embeddings endpoints. Any OpenAI-compatible
/// server works through `base_url`.
pub struct OpenAiClient {
    http: Client,
    settings: ProviderSettings,
}

impl OpenAiClient {
    pub fn new(settings: ProviderSettings, http_config: &HttpClientConfig) -> Result<Self> {
        let http = build_http_client(
            http_config,
            &settings.base_url,
            settings.timeout_secs,
            "openai",
        )?;

        Ok(Self { http, settings })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.settings.base_url.trim_end_matches('/'))
    }

    async fn post_json<B, R>(&self, path: &str, body: &B, what: &str) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let response = self
            .http
            .post(self.endpoint(path))
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.settings.api_key),
            )
            .header(header::CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await
            .with_context(|| format!("openai {what} request failed"))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "openai {what} returned non-success status {}: {}",
                status,
                text
            ));
        }

        response
            .json()
            .await
            .with_context(|| format!("failed to parse openai {what} response"))
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    fn backend(&self) -> LlmBackend {
        LlmBackend::OpenAi
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let body = ChatCompletionRequest {
            model: &self.settings.model,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            temperature: request.temperature,
        };

        let payload: ChatCompletionResponse =
            self.post_json("chat/completions", &body, "completion").await?;

        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("openai response missing message content"))
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = EmbeddingRequest {
            model: &self.settings.embedding_model,
            input: text,
        };

        let payload: EmbeddingResponse = self.post_json("embeddings", &body, "embedding").await?;

        payload
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .filter(|vector| !vector.is_empty())
            .ok_or_else(|| anyhow!("openai embedding response missing vector"))
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
}

impl<'a> From<&'a ChatMessage> for WireMessage<'a> {
    fn from(message: &'a ChatMessage) -> Self {
        Self {
            role: message.role,
            content: &message.content,
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatCompletionMessage,
}

#[derive(Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_roles_in_lowercase() {
        let messages = vec![
            ChatMessage::system("너는 반도체 공정 튜터다"),
            ChatMessage::user("노광이란?"),
        ];
        let body = ChatCompletionRequest {
            model: "gpt-4o-mini",
            messages: messages.iter().map(WireMessage::from).collect(),
            temperature: 0.0,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "노광이란?");
        assert_eq!(json["model"], "gpt-4o-mini");
    }

    #[test]
    fn response_without_content_is_tolerated_by_schema() {
        let payload: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant"}}]}"#).unwrap();
        assert!(payload.choices[0].message.content.is_none());
    }

    #[test]
    fn endpoint_joins_version_prefix() {
        let client = OpenAiClient::new(
            ProviderSettings {
                api_key: "k".to_string(),
                base_url: "http://localhost:8000/".to_string(),
                model: "m".to_string(),
                embedding_model: "e".to_string(),
                timeout_secs: 5,
            },
            &HttpClientConfig::default(),
        )
        .unwrap();
        assert_eq!(
            client.endpoint("chat/completions"),
            "http://localhost:8000/v1/chat/completions"
        );
    }
}
