//! Small text helpers shared by the keyword extractor, the audit rules and
//! the extractive synthesizer.

use regex::{Match, Regex};
use std::collections::HashSet;
use std::sync::OnceLock;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "what", "which", "who", "whom", "this", "that", "with",
    "from", "does", "did", "how", "when", "where", "why", "any", "all", "can", "will", "shall",
    "there", "their", "its", "has", "have", "under", "into", "our", "you", "your", "not",
];

/// Lowercased content words of at least three characters.
pub fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(|w| w.to_lowercase())
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

fn sentence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^.!?\n]+[.!?]*").expect("valid sentence regex"))
}

/// Sentence-like spans: runs of text ending in `.`, `!`, `?` or a newline.
pub fn sentences(text: &str) -> impl Iterator<Item = Match<'_>> {
    sentence_regex()
        .find_iter(text)
        .filter(|m| !m.as_str().trim().is_empty())
}

/// First sentence containing every keyword, case-insensitively.
pub fn find_sentence<'t>(text: &'t str, keywords: &[&str]) -> Option<Match<'t>> {
    sentences(text).find(|m| {
        let lower = m.as_str().to_lowercase();
        keywords.iter().all(|kw| lower.contains(kw))
    })
}

/// Convert a byte offset in `text` into a character offset.
pub fn char_offset(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

/// Global character range `[start, end)` of a regex match, trimmed of
/// surrounding whitespace.
pub fn char_range(text: &str, m: &Match<'_>) -> (usize, usize) {
    let raw = m.as_str();
    let lead = raw.len() - raw.trim_start().len();
    let trail = raw.len() - raw.trim_end().len();
    (
        char_offset(text, m.start() + lead),
        char_offset(text, m.end() - trail),
    )
}
