use anyhow::{anyhow, Context};
use reqwest::{ClientBuilder, Proxy};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    service::{chat::QaMode, quiz::HistoryScope},
    util::{llm::LlmBackend, similarity::SimilarityThresholds},
};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub file: String,
    pub level: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: "logs/fabtutor.log".to_string(),
            level: Some("info".to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    pub proxy: Option<String>,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            user_agent: "fabtutor/0.1".to_string(),
        }
    }
}

impl HttpClientConfig {
    pub fn apply(&self, builder: ClientBuilder) -> anyhow::Result<ClientBuilder> {
        let builder = builder.user_agent(self.user_agent.clone());
        match self.proxy.as_deref().map(str::trim) {
            Some(proxy) if !proxy.is_empty() => {
                let proxy = Proxy::all(proxy).with_context(|| format!("invalid proxy url {proxy}"))?;
                Ok(builder.proxy(proxy))
            }
            _ => Ok(builder),
        }
    }
}

/// Credentials and endpoint for one backend. An unset `base_url` resolves to the backend's
/// public API host.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub backend: String,
    pub model: Option<String>,
    pub embedding_model: Option<String>,
    pub timeout_secs: u64,
    pub chat_temperature: f32,
    pub quiz_temperature: f32,
    pub openai: ProviderConfig,
    pub gemini: ProviderConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: "openai".to_string(),
            model: None,
            embedding_model: None,
            timeout_secs: 60,
            chat_temperature: 0.2,
            quiz_temperature: 0.0,
            openai: ProviderConfig::default(),
            gemini: ProviderConfig::default(),
        }
    }
}

impl LlmConfig {
    pub fn provider(&self, backend: LlmBackend) -> &ProviderConfig {
        match backend {
            LlmBackend::OpenAi => &self.openai,
            LlmBackend::Gemini => &self.gemini,
        }
    }

    pub fn base_url(&self, backend: LlmBackend) -> String {
        self.provider(backend)
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(backend.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub enabled: bool,
    pub uri: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub qa_top_k: u64,
    pub quiz_top_k: u64,
    pub quiz_context_query: String,
    pub quiz_context_max_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            uri: "http://localhost:6334".to_string(),
            api_key: None,
            collection: "fab_documents".to_string(),
            qa_top_k: 4,
            quiz_top_k: 6,
            quiz_context_query: "핵심 개념 요약".to_string(),
            quiz_context_max_chars: 6000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub mode: String,
    pub history_pairs: usize,
    pub max_doc_chars: usize,
    pub doc_excerpt_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            mode: "conversational".to_string(),
            history_pairs: 6,
            max_doc_chars: 2400,
            doc_excerpt_chars: 1200,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuizConfig {
    pub jaccard_threshold: f64,
    pub ratio_threshold: f64,
    pub history_scope: String,
    pub shared_bucket: String,
}

impl Default for QuizConfig {
    fn default() -> Self {
        let thresholds = SimilarityThresholds::default();
        Self {
            jaccard_threshold: thresholds.jaccard,
            ratio_threshold: thresholds.ratio,
            history_scope: "per_topic".to_string(),
            shared_bucket: "포토리소그래피".to_string(),
        }
    }
}

impl QuizConfig {
    pub fn thresholds(&self) -> SimilarityThresholds {
        SimilarityThresholds {
            jaccard: self.jaccard_threshold,
            ratio: self.ratio_threshold,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub http_client: HttpClientConfig,
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub chat: ChatConfig,
    pub quiz: QuizConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let explicit_path = std::env::var("CONFIG_FILE").ok();
        let config = if let Some(path) = explicit_path {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(anyhow!("config file {:?} not found", path));
            }
            Self::load_from_file(&path)?
        } else {
            let path = locate_default_config();
            if let Some(path) = path {
                Self::load_from_file(&path)?
            } else {
                AppConfig::default()
            }
        };

        let config = Self::apply_env_overrides(config)?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        Self::from_yaml(&contents).with_context(|| format!("failed to parse config file {:?}", path))
    }

    fn from_yaml(contents: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    fn apply_env_overrides(mut config: AppConfig) -> anyhow::Result<AppConfig> {
        if let Ok(bind) = std::env::var("SERVER_BIND") {
            config.server.bind = bind;
        }

        if let Ok(log_file) = std::env::var("LOG_FILE_PATH") {
            config.logging.file = log_file;
        }

        if let Ok(log_level) = std::env::var("LOG_LEVEL") {
            config.logging.level = Some(log_level);
        }

        if let Ok(proxy) = std::env::var("HTTP_PROXY_URL") {
            config.http_client.proxy = Some(proxy);
        }

        if let Ok(backend) = std::env::var("LLM_BACKEND") {
            config.llm.backend = backend;
        }

        if let Ok(model) = std::env::var("LLM_MODEL") {
            config.llm.model = Some(model);
        }

        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = Some(model);
        }

        if let Some(timeout) = parse_optional_env("LLM_TIMEOUT_SECS")? {
            config.llm.timeout_secs = timeout;
        }

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.llm.openai.api_key = Some(key);
        }

        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.llm.openai.base_url = Some(url);
        }

        if let Ok(key) = std::env::var("GOOGLE_API_KEY") {
            config.llm.gemini.api_key = Some(key);
        }

        if let Ok(url) = std::env::var("GEMINI_BASE_URL") {
            config.llm.gemini.base_url = Some(url);
        }

        if let Some(enabled) = parse_optional_env("RETRIEVAL_ENABLED")? {
            config.retrieval.enabled = enabled;
        }

        if let Ok(uri) = std::env::var("QDRANT_URL") {
            config.retrieval.uri = uri;
        }

        if let Ok(key) = std::env::var("QDRANT_API_KEY") {
            config.retrieval.api_key = Some(key);
        }

        if let Ok(collection) = std::env::var("QDRANT_COLLECTION") {
            config.retrieval.collection = collection;
        }

        if let Ok(mode) = std::env::var("CHAT_MODE") {
            config.chat.mode = mode;
        }

        if let Ok(scope) = std::env::var("QUIZ_HISTORY_SCOPE") {
            config.quiz.history_scope = scope;
        }

        if let Some(ttl) = parse_optional_env("SESSION_TTL_SECS")? {
            config.session.ttl_secs = ttl;
        }

        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.llm
            .backend
            .parse::<LlmBackend>()
            .context("invalid llm.backend")?;
        self.chat.mode.parse::<QaMode>().context("invalid chat.mode")?;
        self.quiz
            .history_scope
            .parse::<HistoryScope>()
            .context("invalid quiz.history_scope")?;

        for (name, value) in [
            ("quiz.jaccard_threshold", self.quiz.jaccard_threshold),
            ("quiz.ratio_threshold", self.quiz.ratio_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(anyhow!("{name} must be within (0, 1], got {value}"));
            }
        }

        if self.chat.history_pairs == 0 {
            return Err(anyhow!("chat.history_pairs must be at least 1"));
        }

        if self.quiz.shared_bucket.trim().is_empty() {
            return Err(anyhow!("quiz.shared_bucket must not be empty"));
        }

        if self.retrieval.enabled && self.retrieval.collection.trim().is_empty() {
            return Err(anyhow!(
                "retrieval enabled without a collection; set QDRANT_COLLECTION or retrieval.collection"
            ));
        }

        Ok(())
    }
}

fn parse_optional_env<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(v) => Ok(Some(
            v.parse::<T>()
                .with_context(|| format!("{key} must be a valid value"))?,
        )),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn locate_default_config() -> Option<PathBuf> {
    let candidates = [
        PathBuf::from("config/config.yaml"),
        PathBuf::from("../config/config.yaml"),
    ];

    candidates.into_iter().find(|path| path.exists())
}
