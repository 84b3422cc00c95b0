//! Admission check run on every new message before the model is called.
//!
//! Two independent tests: the message must mention a study-planning keyword,
//! and it must not ask for more than [`MAX_STUDY_HOURS`] hours of study.
//! Only the latest message is inspected; earlier turns play no part.

use regex::Regex;
use std::sync::OnceLock;

/// Phrases that put a message on topic. Matched on word boundaries.
pub const STUDY_PLANNER_KEYWORDS: &[&str] = &[
    "study planner",
    "study plan",
    "study guide",
    "homework",
    "exam preparation",
    "study tips",
    "timetable",
    "revision",
    "schedule",
    "study routine",
    "goal setting",
    "test prep",
];

pub const MAX_STUDY_HOURS: u64 = 12;

/// Why a message was turned away before reaching the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    OffTopic,
    TimeLimitExceeded,
}

impl Rejection {
    /// Fixed user-facing refusal text.
    pub fn message(&self) -> &'static str {
        match self {
            Rejection::OffTopic => {
                "Sorry, I can only assist with study planning-related questions. Please ask a relevant question."
            }
            Rejection::TimeLimitExceeded => {
                "Sorry, you cannot study for more than 12 hours a day. It's important to take breaks and rest!"
            }
        }
    }
}

fn keyword_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        STUDY_PLANNER_KEYWORDS
            .iter()
            .filter_map(|keyword| Regex::new(&format!(r"\b{}\b", regex::escape(keyword))).ok())
            .collect()
    })
}

fn study_hours_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)study(?:\s+for)?\s*(\d+)\s*hours").ok())
        .as_ref()
}

/// True if the text mentions any study-planning keyword as a whole word,
/// or names a daily study duration ("study for N hours").
///
/// The duration phrase lets an over-long request reach the time limit and
/// get the safety refusal instead of the off-topic one.
pub fn is_on_topic(text: &str) -> bool {
    let lowered = text.to_lowercase();
    keyword_patterns().iter().any(|pattern| pattern.is_match(&lowered))
        || requested_hours(text).is_some()
}

/// The hour count from the first "study [for] N hours" phrase, if any.
///
/// `Some(u64::MAX)` stands in for a digit run too long to fit in a `u64`.
pub fn requested_hours(text: &str) -> Option<u64> {
    let captures = study_hours_pattern()?.captures(text)?;
    let digits = captures.get(1)?.as_str();
    Some(digits.parse().unwrap_or(u64::MAX))
}

/// True if the text asks to study for more than [`MAX_STUDY_HOURS`] hours.
pub fn exceeds_limit(text: &str) -> bool {
    requested_hours(text).is_some_and(|hours| hours > MAX_STUDY_HOURS)
}

/// Run both checks in order: topic first, then the time limit.
pub fn admit(text: &str) -> Result<(), Rejection> {
    if !is_on_topic(text) {
        return Err(Rejection::OffTopic);
    }
    if exceeds_limit(text) {
        return Err(Rejection::TimeLimitExceeded);
    }
    Ok(())
}
