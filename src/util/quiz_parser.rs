//! Extraction of quiz items and grading verdicts from free-form model output.
//!
//! The generator is only asked (not forced) to follow the templates, so every parser returns
//! [`ParseOutcome::Unparseable`] instead of failing when nothing usable is found.

use std::{fmt, str::FromStr, sync::LazyLock};

use anyhow::anyhow;
use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\d+[.)\]]\s+").expect("numbered item regex"));
static RE_PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n+").expect("paragraph regex"));
static RE_MC_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\d+\)\s+").expect("mc block regex"));
static RE_MC_OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([abcd])[).]\s*(.+)$").expect("mc option regex"));
static RE_MC_ANSWER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^정답\s*:\s*([abcd])\s*$").expect("mc answer regex"));
static RE_MC_EXPLANATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^해설\s*:\s*(.*)$").expect("mc explanation regex"));
static RE_VERDICT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"판정\s*:\s*(정답|오답)").expect("verdict regex"));
static RE_FEEDBACK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)피드백\s*:\s*(.*)").expect("feedback regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome<T> {
    Parsed(T),
    Unparseable { reason: &'static str },
}

#[cfg(test)]
impl<T> ParseOutcome<T> {
    pub fn parsed(self) -> Option<T> {
        match self {
            ParseOutcome::Parsed(value) => Some(value),
            ParseOutcome::Unparseable { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionLetter {
    A,
    B,
    C,
    D,
}

impl OptionLetter {
    pub const ALL: [OptionLetter; 4] = [
        OptionLetter::A,
        OptionLetter::B,
        OptionLetter::C,
        OptionLetter::D,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OptionLetter::A => "A",
            OptionLetter::B => "B",
            OptionLetter::C => "C",
            OptionLetter::D => "D",
        }
    }

    fn index(&self) -> usize {
        match self {
            OptionLetter::A => 0,
            OptionLetter::B => 1,
            OptionLetter::C => 2,
            OptionLetter::D => 3,
        }
    }
}

impl FromStr for OptionLetter {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(OptionLetter::A),
            "B" => Ok(OptionLetter::B),
            "C" => Ok(OptionLetter::C),
            "D" => Ok(OptionLetter::D),
            other => Err(anyhow!("invalid option letter: {other}")),
        }
    }
}

impl fmt::Display for OptionLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McQuestion {
    pub text: String,
    /// Option bodies in A..D order, without the letter prefix.
    pub options: [String; 4],
    pub answer: OptionLetter,
    pub explanation: String,
}

impl McQuestion {
    pub fn option(&self, letter: OptionLetter) -> &str {
        &self.options[letter.index()]
    }

    /// Options rendered as `A) ...` lines.
    pub fn labelled_options(&self) -> Vec<String> {
        OptionLetter::ALL
            .iter()
            .map(|letter| format!("{letter}) {}", self.option(*letter)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuizItem {
    Open { text: String },
    MultipleChoice(McQuestion),
}

impl QuizItem {
    pub fn text(&self) -> &str {
        match self {
            QuizItem::Open { text } => text,
            QuizItem::MultipleChoice(question) => &question.text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Incorrect,
    Unknown,
}

impl Verdict {
    fn from_label(label: &str) -> Self {
        match label {
            "정답" => Verdict::Correct,
            "오답" => Verdict::Incorrect,
            _ => Verdict::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub verdict: Verdict,
    pub feedback: String,
}

/// Split open-ended questions out of generator text: numbered items first, then paragraphs,
/// finally the whole text as one question.
pub fn extract_open_questions(raw: &str) -> ParseOutcome<Vec<String>> {
    let text = raw.trim();
    if text.is_empty() {
        return ParseOutcome::Unparseable {
            reason: "empty generator output",
        };
    }

    let mut parts = split_non_empty(&RE_NUMBERED, text);
    if parts.len() <= 1 {
        parts = split_non_empty(&RE_PARAGRAPH, text);
    }
    if parts.len() <= 1 {
        let joined = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        parts = vec![joined];
    }

    ParseOutcome::Parsed(parts)
}

fn split_non_empty(re: &Regex, text: &str) -> Vec<String> {
    re.split(text)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.to_string())
        .collect()
}

#[derive(Clone, Copy, PartialEq)]
enum Phase {
    Question,
    Options,
    Answer,
    Explanation,
}

/// Parse `1) question / A) .. D) / 정답: X / 해설: ..` blocks. Blocks missing the question, any
/// option, or the answer are dropped.
pub fn parse_multiple_choice(raw: &str) -> ParseOutcome<Vec<McQuestion>> {
    let text = raw.trim();
    if text.is_empty() {
        return ParseOutcome::Unparseable {
            reason: "empty generator output",
        };
    }

    let items: Vec<McQuestion> = RE_MC_BLOCK
        .split(text)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .filter_map(parse_mc_block)
        .collect();

    if items.is_empty() {
        return ParseOutcome::Unparseable {
            reason: "no complete multiple-choice block",
        };
    }

    ParseOutcome::Parsed(items)
}

fn parse_mc_block(block: &str) -> Option<McQuestion> {
    let mut question_lines = Vec::new();
    let mut options: [Option<String>; 4] = Default::default();
    let mut answer = None;
    let mut explanation = String::new();
    let mut phase = Phase::Question;

    for line in block.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if let Some(caps) = RE_MC_OPTION.captures(line) {
            phase = Phase::Options;
            if let Ok(letter) = caps[1].parse::<OptionLetter>() {
                options[letter.index()] = Some(caps[2].trim().to_string());
            }
            continue;
        }
        if let Some(caps) = RE_MC_ANSWER.captures(line) {
            answer = caps[1].parse::<OptionLetter>().ok();
            phase = Phase::Answer;
            continue;
        }
        if let Some(caps) = RE_MC_EXPLANATION.captures(line) {
            explanation = caps[1].trim().to_string();
            phase = Phase::Explanation;
            continue;
        }
        match phase {
            Phase::Question => question_lines.push(line),
            Phase::Explanation => {
                explanation.push(' ');
                explanation.push_str(line);
            }
            Phase::Options | Phase::Answer => {}
        }
    }

    let text = question_lines.join(" ").trim().to_string();
    if text.is_empty() {
        return None;
    }
    let [a, b, c, d] = options;
    let options = [a?, b?, c?, d?];
    if options.iter().any(|option| option.is_empty()) {
        return None;
    }

    Some(McQuestion {
        text,
        options,
        answer: answer?,
        explanation: explanation.trim().to_string(),
    })
}

/// Read `판정: 정답|오답` and `피드백: ...` out of a grading reply. Feedback without any verdict
/// is kept with [`Verdict::Unknown`].
pub fn parse_evaluation(raw: &str) -> ParseOutcome<Evaluation> {
    let text = raw.trim().replace("\r\n", "\n");
    if text.is_empty() {
        return ParseOutcome::Unparseable {
            reason: "empty grading output",
        };
    }

    let verdict_match = RE_VERDICT.captures(&text);
    let mut feedback = RE_FEEDBACK
        .captures(&text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|feedback| !feedback.is_empty());

    if feedback.is_none() {
        if let Some(caps) = verdict_match.as_ref() {
            let whole = caps.get(0).map(|m| m.end()).unwrap_or(0);
            let tail = text[whole..].trim();
            if !tail.is_empty() && !tail.starts_with("피드백") {
                feedback = Some(tail.to_string());
            }
        }
    }

    let verdict = match verdict_match {
        Some(caps) => Verdict::from_label(&caps[1]),
        None if text.contains("정답") => Verdict::Correct,
        None if text.contains("오답") => Verdict::Incorrect,
        None if feedback.is_some() => Verdict::Unknown,
        None => {
            return ParseOutcome::Unparseable {
                reason: "no verdict in grading output",
            }
        }
    };

    ParseOutcome::Parsed(Evaluation {
        verdict,
        feedback: feedback.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MC_OUTPUT: &str = "\
1) EUV 노광에 사용하는 파장은?
A) 193nm
B) 248nm
C) 13.5nm
D) 365nm
정답: C
해설: EUV는 13.5nm 파장을 사용합니다.
추가로 반사형 광학계를 씁니다.

2) 포지티브 PR에서 현상 시 제거되는 영역은?
A) 노광된 영역
B) 노광되지 않은 영역
C) 전체 영역
정답: A
해설: 보기 D가 없어 버려져야 합니다.

3) 소프트 베이크의 주 목적은?
a. 용매 제거
b. 패턴 경화
c. 산 확산
d. 결함 검사
정답: a
해설: PR 내 용매를 증발시킵니다.
";

    #[test]
    fn multiple_choice_keeps_complete_blocks_only() {
        let items = parse_multiple_choice(MC_OUTPUT).parsed().expect("parsed");
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].text, "EUV 노광에 사용하는 파장은?");
        assert_eq!(items[0].option(OptionLetter::C), "13.5nm");
        assert_eq!(items[0].answer, OptionLetter::C);
        assert_eq!(
            items[0].explanation,
            "EUV는 13.5nm 파장을 사용합니다. 추가로 반사형 광학계를 씁니다."
        );

        assert_eq!(items[1].text, "소프트 베이크의 주 목적은?");
        assert_eq!(items[1].answer, OptionLetter::A);
        assert_eq!(items[1].labelled_options()[0], "A) 용매 제거");
    }

    #[test]
    fn multiple_choice_without_blocks_is_unparseable() {
        assert!(matches!(
            parse_multiple_choice("문제를 생성할 수 없습니다."),
            ParseOutcome::Unparseable { .. }
        ));
        assert!(matches!(
            parse_multiple_choice("   "),
            ParseOutcome::Unparseable { .. }
        ));
    }

    #[test]
    fn multiple_choice_requires_answer() {
        let raw = "1) 질문\nA) a\nB) b\nC) c\nD) d\n해설: 없음";
        assert!(matches!(
            parse_multiple_choice(raw),
            ParseOutcome::Unparseable { .. }
        ));
    }

    #[test]
    fn open_questions_split_on_numbering() {
        let raw = "1) 노광 공정의 해상도 공식을 설명하시오.\n2. PEB의 역할은?\n3] 하드 베이크 조건을 논하시오.";
        let items = extract_open_questions(raw).parsed().expect("parsed");
        assert_eq!(
            items,
            vec![
                "노광 공정의 해상도 공식을 설명하시오.",
                "PEB의 역할은?",
                "하드 베이크 조건을 논하시오."
            ]
        );
    }

    #[test]
    fn open_questions_fall_back_to_paragraphs() {
        let raw = "첫 번째 질문입니다.\n이어지는 줄\n\n두 번째 질문입니다.";
        let items = extract_open_questions(raw).parsed().expect("parsed");
        assert_eq!(items, vec!["첫 번째 질문입니다.\n이어지는 줄", "두 번째 질문입니다."]);
    }

    #[test]
    fn open_questions_fall_back_to_single_joined_question() {
        let raw = "  식각 선택비란?\n  설명하시오.  ";
        let items = extract_open_questions(raw).parsed().expect("parsed");
        assert_eq!(items, vec!["식각 선택비란? 설명하시오."]);
        assert!(matches!(
            extract_open_questions(""),
            ParseOutcome::Unparseable { .. }
        ));
    }

    #[test]
    fn evaluation_reads_labelled_verdict_and_feedback() {
        let raw = "판정: 오답\r\n피드백: 핵심 개념이 빠졌습니다.\n용매 증발을 언급하세요.";
        let evaluation = parse_evaluation(raw).parsed().expect("parsed");
        assert_eq!(evaluation.verdict, Verdict::Incorrect);
        assert_eq!(
            evaluation.feedback,
            "핵심 개념이 빠졌습니다.\n용매 증발을 언급하세요."
        );
    }

    #[test]
    fn evaluation_uses_tail_when_feedback_label_missing() {
        let evaluation = parse_evaluation("판정: 정답\n잘 설명했습니다.")
            .parsed()
            .expect("parsed");
        assert_eq!(evaluation.verdict, Verdict::Correct);
        assert_eq!(evaluation.feedback, "잘 설명했습니다.");
    }

    #[test]
    fn evaluation_falls_back_to_keywords() {
        let evaluation = parse_evaluation("이 답안은 오답으로 보입니다.")
            .parsed()
            .expect("parsed");
        assert_eq!(evaluation.verdict, Verdict::Incorrect);
        assert_eq!(evaluation.feedback, "");

        assert!(matches!(
            parse_evaluation("채점할 수 없습니다."),
            ParseOutcome::Unparseable { .. }
        ));
    }

    #[test]
    fn evaluation_keeps_feedback_without_verdict() {
        let evaluation = parse_evaluation("피드백: 산화막 성장 메커니즘을 더 설명하세요.")
            .parsed()
            .expect("parsed");
        assert_eq!(evaluation.verdict, Verdict::Unknown);
        assert_eq!(evaluation.feedback, "산화막 성장 메커니즘을 더 설명하세요.");
    }
}
