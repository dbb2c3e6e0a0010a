use std::{str::FromStr, sync::Arc};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    catalog::Topic,
    config::AppConfig,
    error::{AppError, AppResult},
    util::{
        llm::{strip_code_fence, CompletionRequest, TextGenerator},
        qdrant::Retriever,
        quiz_parser::{
            extract_open_questions, parse_evaluation, parse_multiple_choice, OptionLetter,
            ParseOutcome, QuizItem, Verdict,
        },
        similarity::SimilarityThresholds,
    },
};

use super::{
    dedup::{generate_unique, CandidateSource},
    session::Session,
};

pub const ALLOWED_ITEM_COUNTS: [usize; 3] = [1, 3, 5];

const NO_ANSWER: &str = "(무응답)";
const NO_CONTEXT: &str = "(컨텍스트 없음)";

const MC_PROMPT: &str = "당신은 반도체 공정 과목의 교수입니다.
주제: {category}
난이도: 초급
출제 문항 수: {n_items}

{context}

요구사항:
- 4지선다 객관식 문제를 {n_items}개 생성
- 각 문항은 반드시 아래 '정확한 형식'을 지킬 것 (추가 텍스트 금지)
- 보기는 A) B) C) D) 로 표시, 정답은 하나만
- 각 문항에 간단한 해설 1~2문장 포함

[정확한 형식 예시 — 이 틀을 그대로 지킬 것]
1) 질문 텍스트
A) 보기 A
B) 보기 B
C) 보기 C
D) 보기 D
정답: A
해설: 한두 문장 설명
";

const OPEN_PROMPT: &str = "당신은 반도체 공정 과목의 교수입니다.
주제: {category}
난이도: 고급
출제 문항 수: {n_items}

{context}

위 내용을 참고하여, 주제에 맞는 랜덤 서술형 문제를 {n_items}개 만들어주세요.
문항은 1), 2), 3)... 처럼 번호를 붙여 한 줄씩 시작하세요.
답은 포함하지 마세요.
";

const EVAL_PROMPT: &str = "당신은 {category} 분야의 채점 보조입니다.
다음 문항과 수험자 답안을 평가하세요.

[문항]
{question}

[수험자 답안]
{answer}

(선택) 참고 컨텍스트:
{context}

평가 기준:
- 사실 일치 여부, 핵심 개념 포함 여부, 논리성.
- 간결히 '정답' 또는 '오답'으로 판정하고, 2~3문장의 피드백 제공.

반드시 아래 형식을 정확히 지키세요(줄바꿈 포함, 다른 텍스트 금지):
판정: 정답|오답
피드백: <두세 문장 피드백>
";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Multiple choice.
    Basic,
    /// Open-ended.
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryScope {
    PerTopic,
    Shared,
}

impl HistoryScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryScope::PerTopic => "per_topic",
            HistoryScope::Shared => "shared",
        }
    }
}

impl FromStr for HistoryScope {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "per_topic" | "topic" => Ok(HistoryScope::PerTopic),
            "shared" => Ok(HistoryScope::Shared),
            other => Err(anyhow!("unsupported quiz history scope: {other}")),
        }
    }
}

/// The quiz currently issued for a topic.
#[derive(Debug, Clone)]
pub struct IssuedQuiz {
    pub difficulty: Difficulty,
    pub items: Vec<QuizItem>,
    pub with_context: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct GeneratedQuiz {
    pub quiz: IssuedQuiz,
    pub requested: usize,
    pub generation_calls: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GradedItem {
    pub index: usize,
    pub question: String,
    pub verdict: Verdict,
    pub feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<OptionLetter>,
}

#[derive(Debug, Clone)]
pub struct QuizSettings {
    pub thresholds: SimilarityThresholds,
    pub history_scope: HistoryScope,
    pub shared_bucket: String,
    pub temperature: f32,
    pub context_query: String,
    pub context_top_k: u64,
    pub context_max_chars: usize,
}

impl QuizSettings {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self {
            thresholds: config.quiz.thresholds(),
            history_scope: config.quiz.history_scope.parse()?,
            shared_bucket: config.quiz.shared_bucket.clone(),
            temperature: config.llm.quiz_temperature,
            context_query: config.retrieval.quiz_context_query.clone(),
            context_top_k: config.retrieval.quiz_top_k,
            context_max_chars: config.retrieval.quiz_context_max_chars,
        })
    }
}

#[derive(Clone)]
pub struct QuizService {
    generator: Option<Arc<dyn TextGenerator>>,
    retriever: Option<Arc<dyn Retriever>>,
    settings: QuizSettings,
}

impl QuizService {
    pub fn new(
        generator: Option<Arc<dyn TextGenerator>>,
        retriever: Option<Arc<dyn Retriever>>,
        settings: QuizSettings,
    ) -> Self {
        Self {
            generator,
            retriever,
            settings,
        }
    }

    pub fn history_bucket<'a>(&'a self, topic: &'a Topic) -> &'a str {
        match self.settings.history_scope {
            HistoryScope::PerTopic => topic.category,
            HistoryScope::Shared => &self.settings.shared_bucket,
        }
    }

    fn generator(&self) -> AppResult<&dyn TextGenerator> {
        self.generator
            .as_deref()
            .ok_or_else(|| AppError::Unavailable("LLM 백엔드가 설정되지 않았습니다".to_string()))
    }

    /// Generate a quiz for `topic`, skipping questions already issued in the topic's history
    /// bucket, and make it the topic's current quiz.
    pub async fn generate(
        &self,
        session: &mut Session,
        topic: &Topic,
        difficulty: Difficulty,
        n_items: usize,
        with_context: bool,
    ) -> AppResult<GeneratedQuiz> {
        if !ALLOWED_ITEM_COUNTS.contains(&n_items) {
            return Err(AppError::BadRequest(format!(
                "문항 수는 {ALLOWED_ITEM_COUNTS:?} 중 하나여야 합니다"
            )));
        }
        let generator = self.generator()?;

        let context = self.gather_context(with_context).await;
        let source = PromptSource {
            generator,
            category: topic.category,
            difficulty,
            context: &context,
            temperature: self.settings.temperature,
        };

        let parse = match difficulty {
            Difficulty::Basic => multiple_choice_items,
            Difficulty::Advanced => open_items,
        };

        let bucket = self.history_bucket(topic).to_string();
        let history = session.history_bucket(&bucket);
        let outcome = generate_unique(&source, parse, n_items, history, self.settings.thresholds)
            .await
            .map_err(AppError::upstream)?;

        info!(
            topic = topic.slug,
            scope = self.settings.history_scope.as_str(),
            bucket = %bucket,
            requested = n_items,
            accepted = outcome.accepted.len(),
            generation_calls = outcome.generation_calls,
            "quiz generated"
        );

        let quiz = IssuedQuiz {
            difficulty,
            items: outcome.accepted,
            with_context,
            created_at: Utc::now(),
        };
        session
            .current_quiz
            .insert(topic.slug.to_string(), quiz.clone());

        Ok(GeneratedQuiz {
            quiz,
            requested: n_items,
            generation_calls: outcome.generation_calls,
            warnings: outcome.warnings,
        })
    }

    /// Grade `answers` (aligned with the current quiz items) for `topic`. Multiple-choice items
    /// are graded locally; open-ended ones go through the generator.
    pub async fn grade(
        &self,
        session: &Session,
        topic: &Topic,
        answers: &[Option<String>],
    ) -> AppResult<Vec<GradedItem>> {
        let quiz = session
            .current_quiz
            .get(topic.slug)
            .ok_or_else(|| AppError::NotFound("생성된 문제가 없습니다".to_string()))?;

        let has_open = quiz
            .items
            .iter()
            .any(|item| matches!(item, QuizItem::Open { .. }));
        let context = if has_open {
            self.generator()?;
            self.gather_context(quiz.with_context).await
        } else {
            String::new()
        };

        let mut results = Vec::with_capacity(quiz.items.len());
        for (index, item) in quiz.items.iter().enumerate() {
            let answer = answers
                .get(index)
                .and_then(|answer| answer.as_deref())
                .map(str::trim)
                .filter(|answer| !answer.is_empty());

            let graded = match item {
                QuizItem::MultipleChoice(question) => {
                    let selected = answer.and_then(selected_letter);
                    let verdict = if selected == Some(question.answer) {
                        Verdict::Correct
                    } else {
                        Verdict::Incorrect
                    };
                    GradedItem {
                        index,
                        question: question.text.clone(),
                        verdict,
                        feedback: Some(question.explanation.clone())
                            .filter(|explanation| !explanation.is_empty()),
                        correct_answer: Some(question.answer),
                    }
                }
                QuizItem::Open { text } => {
                    self.grade_open(topic, text, answer, &context, index)
                        .await?
                }
            };
            results.push(graded);
        }

        Ok(results)
    }

    async fn grade_open(
        &self,
        topic: &Topic,
        question: &str,
        answer: Option<&str>,
        context: &str,
        index: usize,
    ) -> AppResult<GradedItem> {
        let prompt = EVAL_PROMPT
            .replace("{category}", topic.category)
            .replace("{question}", question)
            .replace("{answer}", answer.unwrap_or(NO_ANSWER))
            .replace("{context}", &context_block(context));

        let judged = self
            .generator()?
            .complete(CompletionRequest::prompt(prompt, self.settings.temperature))
            .await
            .map_err(AppError::upstream)?;

        let (verdict, feedback) = match parse_evaluation(strip_code_fence(&judged)) {
            ParseOutcome::Parsed(evaluation) => (
                evaluation.verdict,
                Some(evaluation.feedback).filter(|feedback| !feedback.is_empty()),
            ),
            ParseOutcome::Unparseable { reason } => {
                warn!(topic = topic.slug, index, reason, "grading output could not be parsed");
                (Verdict::Unknown, None)
            }
        };

        Ok(GradedItem {
            index,
            question: question.to_string(),
            verdict,
            feedback,
            correct_answer: None,
        })
    }

    /// Retrieved reference text for prompts. Empty when disabled or when retrieval fails.
    async fn gather_context(&self, enabled: bool) -> String {
        let Some(retriever) = self.retriever.as_ref().filter(|_| enabled) else {
            return String::new();
        };

        match retriever
            .retrieve(&self.settings.context_query, self.settings.context_top_k)
            .await
        {
            Ok(documents) => {
                let joined = documents
                    .iter()
                    .map(|doc| doc.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                truncate_chars(&joined, self.settings.context_max_chars)
            }
            Err(err) => {
                warn!(error = ?err, "quiz context retrieval failed");
                String::new()
            }
        }
    }
}

struct PromptSource<'a> {
    generator: &'a dyn TextGenerator,
    category: &'a str,
    difficulty: Difficulty,
    context: &'a str,
    temperature: f32,
}

#[async_trait]
impl CandidateSource for PromptSource<'_> {
    async fn generate(&self, n_items: usize) -> anyhow::Result<String> {
        let template = match self.difficulty {
            Difficulty::Basic => MC_PROMPT,
            Difficulty::Advanced => OPEN_PROMPT,
        };
        let prompt = template
            .replace("{category}", self.category)
            .replace("{n_items}", &n_items.to_string())
            .replace("{context}", &context_block(self.context));

        let raw = self
            .generator
            .complete(CompletionRequest::prompt(prompt, self.temperature))
            .await?;
        Ok(strip_code_fence(&raw).to_string())
    }
}

fn context_block(context: &str) -> String {
    if context.is_empty() {
        NO_CONTEXT.to_string()
    } else {
        format!("[컨텍스트]\n{context}")
    }
}

fn multiple_choice_items(raw: &str) -> ParseOutcome<Vec<QuizItem>> {
    match parse_multiple_choice(raw) {
        ParseOutcome::Parsed(questions) => ParseOutcome::Parsed(
            questions
                .into_iter()
                .map(QuizItem::MultipleChoice)
                .collect(),
        ),
        ParseOutcome::Unparseable { reason } => ParseOutcome::Unparseable { reason },
    }
}

fn open_items(raw: &str) -> ParseOutcome<Vec<QuizItem>> {
    match extract_open_questions(raw) {
        ParseOutcome::Parsed(texts) => ParseOutcome::Parsed(
            texts
                .into_iter()
                .map(|text| QuizItem::Open { text })
                .collect(),
        ),
        ParseOutcome::Unparseable { reason } => ParseOutcome::Unparseable { reason },
    }
}

/// Accepts `B`, `b`, `B)` or a full labelled option such as `B) 보기`.
fn selected_letter(answer: &str) -> Option<OptionLetter> {
    let head = answer
        .split(|c: char| c == ')' || c == '.')
        .next()
        .unwrap_or(answer);
    head.parse().ok()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}
