use std::{str::FromStr, sync::Arc};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    util::{
        llm::{strip_code_fence, ChatMessage, CompletionRequest, TextGenerator},
        qdrant::{Retriever, SourceDocument},
    },
};

use super::session::Session;

pub const UNKNOWN_ANSWER: &str = "정확히 알 수 없습니다.";
pub const INSUFFICIENT_ANSWER: &str = "정보가 부족합니다";

const NO_HISTORY: &str = "(이전 대화 없음)";

const SYSTEM_PROMPT: &str = "당신의 1차 정보원은 업로드된 PDF입니다. \
가능하면 PDF 근거를 우선하여 답하고, 부족하면 일반지식으로 보완하되 그 사실을 한 문장으로 표시하십시오. \
항상 정중한 한국어(존댓말)로 답하십시오.";

const CONDENSE_PROMPT: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.

Chat History:
{chat_history}
Follow Up Input: {question}
Standalone question:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    pub sources: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            sources: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            sources,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QaMode {
    /// Condense, retrieve, then answer with the history as chat messages.
    Conversational,
    /// Retrieve for the raw question and assemble a single prompt.
    Manual,
}

impl QaMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QaMode::Conversational => "conversational",
            QaMode::Manual => "manual",
        }
    }
}

impl FromStr for QaMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "conversational" | "crc" => Ok(QaMode::Conversational),
            "manual" => Ok(QaMode::Manual),
            other => Err(anyhow!("unsupported chat mode: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub mode: QaMode,
    pub history_pairs: usize,
    pub max_doc_chars: usize,
    pub doc_excerpt_chars: usize,
    pub top_k: u64,
    pub temperature: f32,
}

impl ChatSettings {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self {
            mode: config.chat.mode.parse()?,
            history_pairs: config.chat.history_pairs,
            max_doc_chars: config.chat.max_doc_chars,
            doc_excerpt_chars: config.chat.doc_excerpt_chars,
            top_k: config.retrieval.qa_top_k,
            temperature: config.llm.chat_temperature,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub sources: Vec<String>,
    pub mode: QaMode,
}

#[derive(Clone)]
pub struct ChatService {
    generator: Option<Arc<dyn TextGenerator>>,
    retriever: Option<Arc<dyn Retriever>>,
    settings: ChatSettings,
}

impl ChatService {
    pub fn new(
        generator: Option<Arc<dyn TextGenerator>>,
        retriever: Option<Arc<dyn Retriever>>,
        settings: ChatSettings,
    ) -> Self {
        let service = Self {
            generator,
            retriever,
            settings,
        };
        if service.mode() != service.settings.mode {
            info!(
                configured = service.settings.mode.as_str(),
                "conversational chat needs an llm and a retriever; using manual mode"
            );
        }
        service
    }

    /// Mode actually used; conversational needs both a generator and a retriever.
    pub fn mode(&self) -> QaMode {
        match self.settings.mode {
            QaMode::Conversational if self.generator.is_some() && self.retriever.is_some() => {
                QaMode::Conversational
            }
            _ => QaMode::Manual,
        }
    }

    /// Answer `question` in the context of the session's chat history and record both turns.
    pub async fn ask(&self, session: &mut Session, question: &str) -> AppResult<ChatAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::BadRequest("질문을 입력하세요".to_string()));
        }

        let mode = self.mode();
        let (answer, documents) = match mode {
            QaMode::Conversational => self.answer_conversational(&session.chat_history, question).await,
            QaMode::Manual => self.answer_manual(&session.chat_history, question).await,
        };

        let sources: Vec<String> = documents.iter().map(SourceDocument::citation).collect();
        debug!(mode = mode.as_str(), sources = sources.len(), "chat answered");

        session.chat_history.push(ChatTurn::user(question));
        session
            .chat_history
            .push(ChatTurn::assistant(answer.clone(), sources.clone()));

        Ok(ChatAnswer {
            answer,
            sources,
            mode,
        })
    }

    async fn answer_conversational(
        &self,
        history: &[ChatTurn],
        question: &str,
    ) -> (String, Vec<SourceDocument>) {
        let (Some(generator), Some(retriever)) = (self.generator.as_deref(), self.retriever.as_deref())
        else {
            return self.answer_manual(history, question).await;
        };

        let pairs = hist_pairs(history, self.settings.history_pairs);

        let standalone = if pairs.is_empty() {
            question.to_string()
        } else {
            let transcript = pairs
                .iter()
                .map(|(user, assistant)| format!("Human: {user}\nAssistant: {assistant}"))
                .collect::<Vec<_>>()
                .join("\n");
            let prompt = CONDENSE_PROMPT
                .replace("{chat_history}", &transcript)
                .replace("{question}", question);
            match generator
                .complete(CompletionRequest::prompt(prompt, 0.0))
                .await
            {
                Ok(text) if !text.trim().is_empty() => strip_code_fence(&text).to_string(),
                Ok(_) => question.to_string(),
                Err(err) => {
                    warn!(error = ?err, "question condensing failed");
                    return (UNKNOWN_ANSWER.to_string(), Vec::new());
                }
            }
        };

        let documents = match retriever.retrieve(&standalone, self.settings.top_k).await {
            Ok(documents) => documents,
            Err(err) => {
                warn!(error = ?err, "chat retrieval failed");
                Vec::new()
            }
        };

        let context = documents
            .iter()
            .map(|doc| doc.content.trim())
            .filter(|content| !content.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut messages = Vec::with_capacity(pairs.len() * 2 + 2);
        messages.push(ChatMessage::system(format!(
            "{SYSTEM_PROMPT}\n\n[PDF 발췌]\n{context}"
        )));
        for (user, assistant) in &pairs {
            messages.push(ChatMessage::user(*user));
            messages.push(ChatMessage::assistant(*assistant));
        }
        messages.push(ChatMessage::user(standalone.as_str()));

        let request = CompletionRequest {
            messages,
            temperature: self.settings.temperature,
        };
        let answer = match generator.complete(request).await {
            Ok(text) => non_empty_answer(&text),
            Err(err) => {
                warn!(error = ?err, "conversational answer failed");
                UNKNOWN_ANSWER.to_string()
            }
        };

        (answer, documents)
    }

    async fn answer_manual(
        &self,
        history: &[ChatTurn],
        question: &str,
    ) -> (String, Vec<SourceDocument>) {
        let documents = match self.retriever.as_deref() {
            Some(retriever) => match retriever.retrieve(question, self.settings.top_k).await {
                Ok(documents) => documents,
                Err(err) => {
                    warn!(error = ?err, "chat retrieval failed");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let history_text = hist_text(history, self.settings.history_pairs);
        let history_text = if history_text.is_empty() {
            NO_HISTORY
        } else {
            history_text.as_str()
        };
        let doc_block = summarize_docs(
            &documents,
            self.settings.max_doc_chars,
            self.settings.doc_excerpt_chars,
        );

        let prompt = if doc_block.is_empty() {
            format!(
                "다음은 최근 대화입니다.\n{history_text}\n\n\
                 업로드된 PDF에서 충분한 근거를 찾지 못했습니다. 일반지식으로 답하되, \
                 모호하면 '정보가 부족합니다'라고 밝혀주십시오. 한국어(존댓말)로 답하십시오.\n\
                 [질문] {question}"
            )
        } else {
            format!(
                "규칙:\n\
                 1) 아래 [PDF 발췌]에서 먼저 근거를 찾고 답하십시오.\n\
                 2) 충분한 근거가 없으면 일반지식으로 보완하고, 그 사실을 한 문장으로 표시하십시오.\n\
                 3) 한국어(존댓말)로 간결하고 정확히 답하십시오.\n\n\
                 [대화 맥락]\n{history_text}\n\n\
                 [PDF 발췌]\n{doc_block}\n\n\
                 [질문]\n{question}\n"
            )
        };

        let answer = match self.generator.as_deref() {
            None => UNKNOWN_ANSWER.to_string(),
            Some(generator) => match generator
                .complete(CompletionRequest::prompt(prompt, self.settings.temperature))
                .await
            {
                Ok(text) => non_empty_answer(&text),
                Err(err) => {
                    warn!(error = ?err, "manual chat answer failed");
                    UNKNOWN_ANSWER.to_string()
                }
            },
        };

        (answer, documents)
    }
}

fn non_empty_answer(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        INSUFFICIENT_ANSWER.to_string()
    } else {
        text.to_string()
    }
}

/// Adjacent user -> assistant pairs, most recent `limit` kept. Unmatched turns are skipped.
pub fn hist_pairs(history: &[ChatTurn], limit: usize) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();
    let mut i = 0;
    while i + 1 < history.len() {
        let (a, b) = (&history[i], &history[i + 1]);
        if a.role == ChatRole::User && b.role == ChatRole::Assistant {
            pairs.push((a.content.as_str(), b.content.as_str()));
            i += 2;
        } else {
            i += 1;
        }
    }
    let skip = pairs.len().saturating_sub(limit);
    pairs.split_off(skip)
}

pub fn hist_text(history: &[ChatTurn], limit: usize) -> String {
    hist_pairs(history, limit)
        .into_iter()
        .map(|(user, assistant)| format!("사용자: {user}\n도우미: {assistant}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Document excerpts tagged with their citation. Stops adding once `max_chars` is reached.
pub fn summarize_docs(documents: &[SourceDocument], max_chars: usize, excerpt_chars: usize) -> String {
    let mut parts = Vec::new();
    let mut total = 0;

    for doc in documents {
        let text = doc.content.trim();
        if text.is_empty() {
            continue;
        }
        let excerpt: String = text.chars().take(excerpt_chars).collect();
        let fragment = format!("<<{}>>\n{excerpt}", doc.citation());
        total += fragment.chars().count();
        parts.push(fragment);
        if total >= max_chars {
            break;
        }
    }

    parts.join("\n\n")
}
