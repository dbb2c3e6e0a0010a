use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::util::{
    quiz_parser::{ParseOutcome, QuizItem},
    similarity::{is_similar_to_any, SimilarityThresholds},
};

/// Produces raw generator text asking for `n_items` questions.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn generate(&self, n_items: usize) -> Result<String>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupOutcome {
    pub accepted: Vec<QuizItem>,
    pub generation_calls: usize,
    pub warnings: Vec<String>,
}

/// Ask `source` for `n_items` questions and keep those not similar to `history` or to each
/// other. A shortfall triggers exactly one backfill request for the missing count. Accepted
/// texts are appended to `history` only once the whole interaction succeeded.
pub async fn generate_unique<S, P>(
    source: &S,
    parse: P,
    n_items: usize,
    history: &mut Vec<String>,
    thresholds: SimilarityThresholds,
) -> Result<DedupOutcome>
where
    S: CandidateSource + ?Sized,
    P: Fn(&str) -> ParseOutcome<Vec<QuizItem>>,
{
    let mut outcome = DedupOutcome::default();
    if n_items == 0 {
        return Ok(outcome);
    }

    let raw = source.generate(n_items).await?;
    outcome.generation_calls += 1;
    let candidates = candidates_from(&parse, &raw, "first pass", &mut outcome.warnings);
    accept_unique(candidates, n_items, history, thresholds, &mut outcome.accepted);

    if outcome.accepted.len() < n_items {
        let need = n_items - outcome.accepted.len();
        debug!(need, "backfilling quiz items");
        let raw = source.generate(need).await?;
        outcome.generation_calls += 1;
        let candidates = candidates_from(&parse, &raw, "backfill", &mut outcome.warnings);
        accept_unique(candidates, n_items, history, thresholds, &mut outcome.accepted);
    }

    if outcome.accepted.len() < n_items {
        outcome.warnings.push(format!(
            "중복을 제외하고 {}개 중 {}개의 문항만 생성되었습니다",
            n_items,
            outcome.accepted.len()
        ));
    }

    history.extend(outcome.accepted.iter().map(|item| item.text().to_string()));
    Ok(outcome)
}

fn candidates_from<P>(parse: &P, raw: &str, pass: &str, warnings: &mut Vec<String>) -> Vec<QuizItem>
where
    P: Fn(&str) -> ParseOutcome<Vec<QuizItem>>,
{
    match parse(raw) {
        ParseOutcome::Parsed(items) => items,
        ParseOutcome::Unparseable { reason } => {
            warn!(pass, reason, "generator output could not be parsed");
            warnings.push(format!("생성 결과를 해석하지 못했습니다 ({pass}: {reason})"));
            Vec::new()
        }
    }
}

fn accept_unique(
    candidates: Vec<QuizItem>,
    n_items: usize,
    history: &[String],
    thresholds: SimilarityThresholds,
    accepted: &mut Vec<QuizItem>,
) {
    for candidate in candidates {
        if accepted.len() >= n_items {
            break;
        }

        let seen = history
            .iter()
            .map(String::as_str)
            .chain(accepted.iter().map(QuizItem::text));
        if is_similar_to_any(candidate.text(), seen, thresholds) {
            debug!(question = candidate.text(), "dropping near-duplicate question");
            continue;
        }

        accepted.push(candidate);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };

    use super::*;
    use crate::util::quiz_parser::extract_open_questions;

    struct ScriptedSource {
        responses: Mutex<VecDeque<String>>,
        requested: Mutex<Vec<usize>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
                requested: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CandidateSource for ScriptedSource {
        async fn generate(&self, n_items: usize) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().unwrap().push(n_items);
            Ok(self.responses.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl CandidateSource for FailingSource {
        async fn generate(&self, _n_items: usize) -> Result<String> {
            Err(anyhow::anyhow!("backend down"))
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

    fn texts(outcome: &DedupOutcome) -> Vec<&str> {
        outcome.accepted.iter().map(QuizItem::text).collect()
    }

    #[tokio::test]
    async fn collisions_in_first_pass_do_not_trigger_backfill_when_enough_remain() {
        let source = ScriptedSource::new(&[
            "1. 노광 공정의 원리는?\n\
             2. 감광막의 종류를 비교하라\n\
             3. 이온 주입 공정의 장단점을 설명하라\n\
             4. CMP 공정에서 슬러리의 역할은?\n\
             5. 산화막 두께 측정 방법은?",
        ]);
        let mut history = vec![
            "노광 공정의 원리는?".to_string(),
            "이온주입 공정의 장점과 단점을 논하시오".to_string(),
        ];

        let outcome = generate_unique(
            &source,
            open_items,
            3,
            &mut history,
            SimilarityThresholds::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.generation_calls, 1);
        assert_eq!(
            texts(&outcome),
            vec![
                "감광막의 종류를 비교하라",
                "CMP 공정에서 슬러리의 역할은?",
                "산화막 두께 측정 방법은?"
            ]
        );
        assert_eq!(history.len(), 5);
        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn shortfall_triggers_exactly_one_backfill_for_the_gap() {
        let source = ScriptedSource::new(&[
            "1. 노광 공정의 원리는?\n2. 습식 식각의 특징은?\n3. 노광 공정의 원리는 무엇인가?",
            "1. 습식 식각의 특징은?\n2. 확산 공정의 드라이브인 단계를 설명하라\n3. PVD와 CVD의 차이는?",
            "1. 이 응답은 쓰이면 안 된다",
        ]);
        let mut history = vec!["노광 공정의 원리는?".to_string()];

        let outcome = generate_unique(
            &source,
            open_items,
            3,
            &mut history,
            SimilarityThresholds::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.generation_calls, 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(*source.requested.lock().unwrap(), vec![3, 2]);
        assert_eq!(
            texts(&outcome),
            vec![
                "습식 식각의 특징은?",
                "확산 공정의 드라이브인 단계를 설명하라",
                "PVD와 CVD의 차이는?"
            ]
        );
    }

    #[tokio::test]
    async fn shortfall_after_backfill_returns_fewer_items() {
        let source = ScriptedSource::new(&[
            "1. 노광 공정의 원리는?",
            "1. 노광 공정의 원리는?\n2. 증착 공정의 콘포멀리티란?",
        ]);
        let mut history = vec!["노광 공정의 원리는?".to_string()];

        let outcome = generate_unique(
            &source,
            open_items,
            3,
            &mut history,
            SimilarityThresholds::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.generation_calls, 2);
        assert_eq!(texts(&outcome), vec!["증착 공정의 콘포멀리티란?"]);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn unparseable_batch_counts_as_empty() {
        let source = ScriptedSource::new(&[
            "   ",
            "1. 금속배선에서 배리어층의 역할은?\n2. 시드층이 얇아야 하는 이유는?",
        ]);
        let mut history = Vec::new();

        let outcome = generate_unique(
            &source,
            open_items,
            1,
            &mut history,
            SimilarityThresholds::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.generation_calls, 2);
        assert_eq!(texts(&outcome), vec!["금속배선에서 배리어층의 역할은?"]);
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[tokio::test]
    async fn source_errors_propagate_without_touching_history() {
        let mut history = vec!["노광 공정의 원리는?".to_string()];
        let result = generate_unique(
            &FailingSource,
            open_items,
            3,
            &mut history,
            SimilarityThresholds::default(),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(history.len(), 1);
    }
}
