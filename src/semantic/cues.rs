//! Text-shape cues extracted from a single line of text.
//!
//! These are the only inputs the semantic filter sees besides the words
//! themselves: no font, size or position information is available here.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::HeadingLevel;
use crate::text::ends_with_sentence_punctuation;

/// "1 Scope", "2.3 Methods", "4.1.2) Limits"
static NUMBERED_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,3}(?:\.\d{1,3}){0,3})[.)]?\s+\p{L}").unwrap());

/// "Chapter 4", "Part II", "Appendix", "Section B"
static KEYWORD_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(chapter|part|appendix|annex|section)(?:\s+(?:\d+|[ivxlc]+|[a-z])\b|\s*$)")
        .unwrap()
});

/// "IV. Results", "B) Scope"
static ENUMERATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[IVXLC]{1,6}|[A-Z])[.)]\s+\S").unwrap());

static LEADING_STOP_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:the|a|an|this|that|these|those|in|on|at|to|for|with|by|from|it|we|our|if|when|as|and|or|but)\s",
    )
    .unwrap()
});

static DISCOURSE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:however|therefore|furthermore|moreover|according|said|says|reported|mentioned|thus|hence)\b",
    )
    .unwrap()
});

static URL_OR_EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:https?://|www\.|[\w.+-]+@[\w-]+\.\w+)").unwrap());

static PAGE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[-–—\s]*(?:page\s+)?\d+(?:\s*(?:of|/)\s*\d+)?[-–—\s]*$").unwrap()
});

static DOT_LEADERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.{4,}|(?:\.\s){4,}|…{2,}|·{4,}").unwrap());

static COPYRIGHT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:©|\(c\)\s*\d{4}|\bcopyright\b|all rights reserved)").unwrap()
});

/// Questions up to this many words read as headings ("What is AI?").
const SHORT_QUESTION_WORDS: usize = 8;

/// Whether the whole line is a page label such as "12", "- 4 -" or
/// "Page 3 of 10".
pub fn is_page_label(text: &str) -> bool {
    PAGE_LABEL.is_match(text.trim())
}

/// Shape features of one line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextCues {
    /// Depth of a decimal section number prefix ("2.1" → 2), capped at 3
    pub numbering_depth: Option<u8>,
    /// Level implied by a Chapter/Part/Appendix/Section prefix
    pub keyword_level: Option<HeadingLevel>,
    pub enumeration: bool,
    pub all_caps: bool,
    pub title_case: bool,
    pub trailing_colon: bool,
    pub trailing_punctuation: bool,
    pub leading_stop_word: bool,
    pub discourse_marker: bool,
    pub url_or_email: bool,
    pub page_label: bool,
    pub dot_leaders: bool,
    pub copyright: bool,
    pub lowercase_start: bool,
    pub comma_count: usize,
    pub word_count: usize,
    pub letter_count: usize,
}

impl TextCues {
    /// Extract cues from already cleaned text.
    pub fn analyze(text: &str) -> Self {
        let text = text.trim();
        let words: Vec<&str> = text.split_whitespace().collect();
        let letter_count = text.chars().filter(|c| c.is_alphabetic()).count();

        let numbering_depth = NUMBERED_PREFIX.captures(text).and_then(|caps| {
            caps.get(1)
                .map(|m| m.as_str().split('.').count().min(3) as u8)
        });

        let keyword_level = KEYWORD_PREFIX.captures(text).and_then(|caps| {
            caps.get(1)
                .map(|m| match m.as_str().to_ascii_lowercase().as_str() {
                    "section" => HeadingLevel::H2,
                    _ => HeadingLevel::H1,
                })
        });

        let short_question = text.ends_with('?') && words.len() <= SHORT_QUESTION_WORDS;
        let has_lower = text.chars().any(|c| c.is_lowercase());
        let all_caps = letter_count >= 3 && !has_lower;

        Self {
            numbering_depth,
            keyword_level,
            enumeration: ENUMERATION.is_match(text),
            all_caps,
            title_case: !all_caps && is_title_case(&words),
            trailing_colon: text.ends_with(':'),
            trailing_punctuation: !short_question && ends_with_sentence_punctuation(text),
            leading_stop_word: LEADING_STOP_WORD.is_match(text),
            discourse_marker: DISCOURSE_MARKER.is_match(text),
            url_or_email: URL_OR_EMAIL.is_match(text),
            page_label: PAGE_LABEL.is_match(text),
            dot_leaders: DOT_LEADERS.is_match(text),
            copyright: COPYRIGHT.is_match(text),
            lowercase_start: text.chars().next().map_or(false, |c| c.is_lowercase()),
            comma_count: text.matches(',').count(),
            word_count: words.len(),
            letter_count,
        }
    }

    /// Heading level suggested by the numbering scheme alone.
    ///
    /// `1.` → H1, `1.1` → H2, `1.1.1` → H3; Chapter/Part/Appendix → H1,
    /// Section → H2.
    pub fn level_hint(&self) -> Option<HeadingLevel> {
        self.numbering_depth
            .and_then(|depth| HeadingLevel::from_rank(depth as usize))
            .or(self.keyword_level)
    }
}

/// Every significant word starts with an uppercase letter.
fn is_title_case(words: &[&str]) -> bool {
    let mut significant = 0;
    for word in words {
        let Some(first) = word.chars().find(|c| c.is_alphabetic()) else {
            continue;
        };
        let letters = word.chars().filter(|c| c.is_alphabetic()).count();
        if letters <= 3 && significant > 0 {
            // Short function words ("of", "and", "the") may stay lowercase.
            continue;
        }
        if !first.is_uppercase() {
            return false;
        }
        significant += 1;
    }
    significant > 0
}
