use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

use crate::config::HttpClientConfig;

use super::llm::{
    build_http_client, ChatMessage, CompletionRequest, Embedder, LlmBackend, ProviderSettings,
    Role, TextGenerator,
};

pub struct GeminiClient {
    http: Client,
    settings: ProviderSettings,
}

impl GeminiClient {
    pub fn new(settings: ProviderSettings, http_config: &HttpClientConfig) -> Result<Self> {
        let http = build_http_client(
            http_config,
            &settings.base_url,
            settings.timeout_secs,
            "gemini",
        )?;

        Ok(Self { http, settings })
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!(
            "{}/v1beta/models/{model}:{method}",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    async fn post_json<B, R>(&self, url: String, body: &B, what: &str) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.settings.api_key)
            .header(header::CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await
            .with_context(|| format!("gemini {what} request failed"))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "gemini {what} returned non-success status {}: {}",
                status,
                text
            ));
        }

        response
            .json()
            .await
            .with_context(|| format!("failed to parse gemini {what} response"))
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn backend(&self) -> LlmBackend {
        LlmBackend::Gemini
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let body = build_generate_request(&request);
        let url = self.endpoint(&self.settings.model, "generateContent");
        let payload: GenerateResponse = self.post_json(url, &body, "generation").await?;

        extract_text(payload).ok_or_else(|| anyhow!("gemini response missing candidate text"))
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = EmbedRequest {
            content: Content {
                role: None,
                parts: vec![Part {
                    text: text.to_string(),
                }],
            },
        };
        let url = self.endpoint(&self.settings.embedding_model, "embedContent");
        let payload: EmbedResponse = self.post_json(url, &body, "embedding").await?;

        let values = payload.embedding.values;
        if values.is_empty() {
            return Err(anyhow!("gemini embedding response missing vector"));
        }
        Ok(values)
    }
}

/// System messages become `systemInstruction`; assistant turns use Gemini's `model` role.
fn build_generate_request(request: &CompletionRequest) -> GenerateRequest {
    let system = request
        .messages
        .iter()
        .filter(|message| message.role == Role::System)
        .map(|message| message.content.as_str())
        .collect::<Vec<_>>();

    let contents = request
        .messages
        .iter()
        .filter(|message| message.role != Role::System)
        .map(to_content)
        .collect();

    GenerateRequest {
        system_instruction: (!system.is_empty()).then(|| Content {
            role: None,
            parts: vec![Part {
                text: system.join("\n\n"),
            }],
        }),
        contents,
        generation_config: GenerationConfig {
            temperature: request.temperature,
        },
    }
}

fn to_content(message: &ChatMessage) -> Content {
    let role = match message.role {
        Role::Assistant => "model",
        _ => "user",
    };
    Content {
        role: Some(role),
        parts: vec![Part {
            text: message.content.clone(),
        }],
    }
}

fn extract_text(payload: GenerateResponse) -> Option<String> {
    let candidate = payload.candidates.into_iter().next()?;
    let text = candidate
        .content?
        .parts
        .into_iter()
        .map(|part| part.text)
        .collect::<Vec<_>>()
        .join("");
    Some(text)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct EmbedRequest {
    content: Content,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    #[serde(default)]
    values: Vec<f32>,
}
