use std::collections::{BTreeSet, HashMap};

pub const DEFAULT_JACCARD_THRESHOLD: f64 = 0.55;
pub const DEFAULT_RATIO_THRESHOLD: f64 = 0.70;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "of", "and", "to", "in", "port", "on", "for", "with", "by", "at", "from",
    "is", "are", "was", "were", "be", "as", "및", "과", "와", "에서", "으로", "으로써", "에",
    "의", "를", "을", "은", "는", "이다", "한다", "하는", "또는",
];

/// Thresholds for the two duplicate signals. Either one crossing marks a pair as similar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityThresholds {
    pub jaccard: f64,
    pub ratio: f64,
}

impl Default for SimilarityThresholds {
    fn default() -> Self {
        Self {
            jaccard: DEFAULT_JACCARD_THRESHOLD,
            ratio: DEFAULT_RATIO_THRESHOLD,
        }
    }
}

fn is_hangul_syllable(ch: char) -> bool {
    ('\u{AC00}'..='\u{D7A3}').contains(&ch)
}

/// Normalize a question into comparison tokens: lowercase, replace everything that is not an
/// ASCII letter/digit, Hangul syllable or whitespace with a space, split, and drop stop-words.
pub fn normalize_tokens(text: &str) -> Vec<String> {
    let mut cleaned = String::with_capacity(text.len());

    for ch in text.chars().flat_map(char::to_lowercase) {
        let keep = ch.is_ascii_digit()
            || ch.is_ascii_lowercase()
            || is_hangul_syllable(ch)
            || ch.is_whitespace();
        if keep {
            cleaned.push(ch);
        } else {
            cleaned.push(' ');
        }
    }

    cleaned
        .split_whitespace()
        .filter(|token| !STOPWORDS.contains(token))
        .map(|token| token.to_string())
        .collect()
}

pub fn jaccard_similarity(a: &[String], b: &[String]) -> f64 {
    let a: BTreeSet<&str> = a.iter().map(String::as_str).collect();
    let b: BTreeSet<&str> = b.iter().map(String::as_str).collect();

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let intersection = a.intersection(&b).count() as f64;
    let union = a.union(&b).count() as f64;

    intersection / union
}

/// Ratcliff/Obershelp similarity `2 * M / (|a| + |b|)` over characters, where `M` is the total
/// size of the matching blocks.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();

    if total == 0 {
        return 1.0;
    }

    let matches = matching_characters(&a, &b);
    2.0 * matches as f64 / total as f64
}

/// Sequences at least this long have their popular characters left out of the match index.
const AUTOJUNK_MIN_LEN: usize = 200;

/// Positions of each character of `b`. For long `b`, characters occurring more than
/// `len / 100 + 1` times are dropped; blocks are later extended across them.
fn index_positions(b: &[char]) -> HashMap<char, Vec<usize>> {
    let mut b_index: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, ch) in b.iter().enumerate() {
        b_index.entry(*ch).or_default().push(j);
    }

    if b.len() >= AUTOJUNK_MIN_LEN {
        let limit = b.len() / 100 + 1;
        b_index.retain(|_, positions| positions.len() <= limit);
    }

    b_index
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let b_index = index_positions(b);

    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, &b_index, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }

        matched += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }

    matched
}

/// Longest common block inside `a[alo..ahi]` and `b[blo..bhi]`. Ties resolve to the block that
/// starts earliest in `a`, then earliest in `b`. The indexed match is then grown over equal
/// neighbours, which picks up characters pruned from the index.
fn longest_match(
    a: &[char],
    b: &[char],
    b_index: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    let mut run_lengths: HashMap<usize, usize> = HashMap::new();

    for (i, ch) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next_lengths = HashMap::new();
        if let Some(positions) = b_index.get(ch) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = j
                    .checked_sub(1)
                    .and_then(|prev| run_lengths.get(&prev))
                    .copied()
                    .unwrap_or(0)
                    + 1;
                next_lengths.insert(j, k);
                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            }
        }
        run_lengths = next_lengths;
    }

    while best_i > alo && best_j > blo && a[best_i - 1] == b[best_j - 1] {
        best_i -= 1;
        best_j -= 1;
        best_size += 1;
    }
    while best_i + best_size < ahi
        && best_j + best_size < bhi
        && a[best_i + best_size] == b[best_j + best_size]
    {
        best_size += 1;
    }

    (best_i, best_j, best_size)
}

/// Two questions are similar when their token sets overlap enough (Jaccard) or their joined
/// token sequences are near-verbatim (sequence ratio). Empty token sequences are never similar.
///
/// The sequence ratio depends on argument order once a side reaches the popular-character
/// cutoff, so both orders are scored and the higher one counts.
pub fn is_similar(candidate: &str, previous: &str, thresholds: SimilarityThresholds) -> bool {
    let a = normalize_tokens(candidate);
    let b = normalize_tokens(previous);

    if a.is_empty() || b.is_empty() {
        return false;
    }

    if jaccard_similarity(&a, &b) >= thresholds.jaccard {
        return true;
    }

    let (a, b) = (a.join(" "), b.join(" "));
    sequence_ratio(&a, &b).max(sequence_ratio(&b, &a)) >= thresholds.ratio
}

/// Returns true when `candidate` is similar to any of `previous`.
pub fn is_similar_to_any<'a, I>(
    candidate: &str,
    previous: I,
    thresholds: SimilarityThresholds,
) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    previous
        .into_iter()
        .any(|existing| is_similar(candidate, existing, thresholds))
}
