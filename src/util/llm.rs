use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use crate::config::{HttpClientConfig, LlmConfig};

use super::{gemini::GeminiClient, openai::OpenAiClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    OpenAi,
    Gemini,
}

impl LlmBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmBackend::OpenAi => "openai",
            LlmBackend::Gemini => "gemini",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmBackend::OpenAi => "gpt-4o-mini",
            LlmBackend::Gemini => "gemini-1.5-flash",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmBackend::OpenAi => "https://api.openai.com",
            LlmBackend::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    pub fn default_embedding_model(&self) -> &'static str {
        match self {
            LlmBackend::OpenAi => "text-embedding-3-small",
            LlmBackend::Gemini => "text-embedding-004",
        }
    }
}

impl std::str::FromStr for LlmBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(LlmBackend::OpenAi),
            "gemini" => Ok(LlmBackend::Gemini),
            other => Err(anyhow!("unsupported llm backend: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

impl CompletionRequest {
    /// Single user-turn request.
    pub fn prompt(text: impl Into<String>, temperature: f32) -> Self {
        Self {
            messages: vec![ChatMessage::user(text)],
            temperature,
        }
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn backend(&self) -> LlmBackend;

    fn model(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// Query embeddings for vector retrieval.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Connection settings handed to a provider client.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    pub timeout_secs: u64,
}

/// Clients selected once at startup from configuration. Either slot is empty when the chosen
/// backend has no API key.
#[derive(Clone, Default)]
pub struct LlmProviders {
    pub generator: Option<Arc<dyn TextGenerator>>,
    pub embedder: Option<Arc<dyn Embedder>>,
}

pub fn build_providers(config: &LlmConfig, http_config: &HttpClientConfig) -> Result<LlmProviders> {
    let backend = config.backend.parse::<LlmBackend>()?;
    let provider = config.provider(backend);

    let api_key = match provider.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => {
            warn!(
                backend = backend.as_str(),
                "llm api key missing; quiz generation and chat answers disabled"
            );
            return Ok(LlmProviders::default());
        }
    };

    let settings = ProviderSettings {
        api_key,
        base_url: config.base_url(backend),
        model: config
            .model
            .clone()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| backend.default_model().to_string()),
        embedding_model: config
            .embedding_model
            .clone()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| backend.default_embedding_model().to_string()),
        timeout_secs: config.timeout_secs,
    };

    info!(
        backend = backend.as_str(),
        model = %settings.model,
        embedding_model = %settings.embedding_model,
        "llm backend selected"
    );

    let providers = match backend {
        LlmBackend::OpenAi => {
            let client = Arc::new(OpenAiClient::new(settings, http_config)?);
            LlmProviders {
                generator: Some(client.clone()),
                embedder: Some(client),
            }
        }
        LlmBackend::Gemini => {
            let client = Arc::new(GeminiClient::new(settings, http_config)?);
            LlmProviders {
                generator: Some(client.clone()),
                embedder: Some(client),
            }
        }
    };

    Ok(providers)
}

/// HTTP client for a provider endpoint. Loopback endpoints (local OpenAI-compatible servers)
/// bypass the configured proxy.
pub(crate) fn build_http_client(
    http_config: &HttpClientConfig,
    base_url: &str,
    timeout_secs: u64,
    label: &str,
) -> Result<Client> {
    let timeout = Duration::from_secs(timeout_secs.max(1));
    let mut builder = http_config
        .apply(Client::builder())
        .with_context(|| format!("failed to apply proxy settings for {label} client"))?;

    if let Ok(parsed) = Url::parse(base_url) {
        let loopback = parsed
            .host()
            .map(|host| match host {
                url::Host::Domain(domain) => domain.eq_ignore_ascii_case("localhost"),
                url::Host::Ipv4(addr) => addr.is_loopback(),
                url::Host::Ipv6(addr) => addr.is_loopback(),
            })
            .unwrap_or(false);
        if loopback {
            builder = builder.no_proxy();
        }
    }

    builder
        .timeout(timeout)
        .build()
        .with_context(|| format!("failed to build {label} http client"))
}

/// Strip a surrounding Markdown code fence some models wrap their answers in.
pub(crate) fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
            body.trim_end().trim_end_matches("```").trim()
        }
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LlmConfig, ProviderConfig};

    #[test]
    fn backend_parses_case_insensitively() {
        assert_eq!("OpenAI".parse::<LlmBackend>().unwrap(), LlmBackend::OpenAi);
        assert_eq!(" gemini ".parse::<LlmBackend>().unwrap(), LlmBackend::Gemini);
        assert!("claude".parse::<LlmBackend>().is_err());
    }

    #[test]
    fn missing_api_key_leaves_providers_empty() {
        let config = LlmConfig {
            openai: ProviderConfig {
                api_key: Some("   ".to_string()),
                ..ProviderConfig::default()
            },
            ..LlmConfig::default()
        };
        let providers = build_providers(&config, &HttpClientConfig::default()).unwrap();
        assert!(providers.generator.is_none());
        assert!(providers.embedder.is_none());
    }

    #[test]
    fn configured_backend_builds_generator_with_default_model() {
        let config = LlmConfig {
            backend: "gemini".to_string(),
            gemini: ProviderConfig {
                api_key: Some("test-key".to_string()),
                ..ProviderConfig::default()
            },
            ..LlmConfig::default()
        };
        let providers = build_providers(&config, &HttpClientConfig::default()).unwrap();
        let generator = providers.generator.expect("generator");
        assert_eq!(generator.backend(), LlmBackend::Gemini);
        assert_eq!(generator.model(), "gemini-1.5-flash");
        assert!(providers.embedder.is_some());
    }

    #[test]
    fn code_fence_is_stripped() {
        assert_eq!(strip_code_fence("```text\n판정: 정답\n```"), "판정: 정답");
        assert_eq!(strip_code_fence("  plain  "), "plain");
    }
}
