use serde::{Deserialize, Serialize};

use crate::{
    catalog::Topic,
    service::{
        chat::{ChatTurn, QaMode},
        quiz::{Difficulty, GradedItem, IssuedQuiz},
        topics::ProgressReport,
    },
    util::quiz_parser::{QuizItem, Verdict},
};

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub session_id: String,
    pub expires_in: u64,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct TopicSummary {
    pub slug: &'static str,
    pub category: &'static str,
    pub title: &'static str,
    pub overview: &'static str,
    pub step_count: usize,
}

impl From<&'static Topic> for TopicSummary {
    fn from(topic: &'static Topic) -> Self {
        Self {
            slug: topic.slug,
            category: topic.category,
            title: topic.title,
            overview: topic.overview,
            step_count: topic.steps.len(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TopicDetail {
    pub slug: &'static str,
    pub category: &'static str,
    pub title: &'static str,
    pub overview: &'static str,
    pub key_points: &'static [&'static str],
    pub progress: ProgressReport,
}

#[derive(Debug, Deserialize)]
pub struct ProgressUpdate {
    pub step: String,
    pub completed: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct ChatHistoryOut {
    pub mode: QaMode,
    pub turns: Vec<ChatTurn>,
}

fn default_with_context() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct QuizRequest {
    pub difficulty: Difficulty,
    pub n_items: usize,
    #[serde(default = "default_with_context")]
    pub with_context: bool,
}

/// A quiz item as shown to the learner; answers and explanations are withheld.
#[derive(Debug, Serialize)]
pub struct QuizItemOut {
    pub index: usize,
    pub kind: &'static str,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl QuizItemOut {
    pub fn new(index: usize, item: &QuizItem) -> Self {
        match item {
            QuizItem::Open { text } => Self {
                index,
                kind: "open",
                text: text.clone(),
                options: None,
            },
            QuizItem::MultipleChoice(question) => Self {
                index,
                kind: "multiple_choice",
                text: question.text.clone(),
                options: Some(question.labelled_options()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuizOut {
    pub topic: &'static str,
    pub difficulty: Difficulty,
    pub created_at: String,
    pub items: Vec<QuizItemOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl QuizOut {
    pub fn new(topic: &'static str, quiz: &IssuedQuiz) -> Self {
        Self {
            topic,
            difficulty: quiz.difficulty,
            created_at: quiz.created_at.to_rfc3339(),
            items: quiz
                .items
                .iter()
                .enumerate()
                .map(|(index, item)| QuizItemOut::new(index, item))
                .collect(),
            requested: None,
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    #[serde(default)]
    pub answers: Vec<Option<String>>,
}

#[derive(Debug, Serialize)]
pub struct GradeOut {
    pub correct: usize,
    pub total: usize,
    pub results: Vec<GradedItem>,
}

impl From<Vec<GradedItem>> for GradeOut {
    fn from(results: Vec<GradedItem>) -> Self {
        Self {
            correct: results
                .iter()
                .filter(|item| item.verdict == Verdict::Correct)
                .count(),
            total: results.len(),
            results,
        }
    }
}
