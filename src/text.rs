//! Small text helpers shared by the parser and the analysis stages.

use unicode_normalization::UnicodeNormalization;

/// Check if a character belongs to a script that doesn't use word spaces.
///
/// CJK ideographs and Japanese kana; Hangul is deliberately excluded since
/// Korean separates words with spaces.
pub fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;

    // CJK Unified Ideographs and Extension A
    (0x4E00..=0x9FFF).contains(&code)
        || (0x3400..=0x4DBF).contains(&code)
        // Extensions B-F
        || (0x20000..=0x2EBEF).contains(&code)
        // Hiragana, Katakana
        || (0x3040..=0x30FF).contains(&code)
        // CJK Symbols and Punctuation
        || (0x3000..=0x303F).contains(&code)
}

/// Whether two fragments should be joined with a space.
pub fn needs_separator(left: &str, right: &str) -> bool {
    match (left.chars().next_back(), right.chars().next()) {
        (Some(l), Some(r)) => {
            !(l.is_whitespace()
                || r.is_whitespace()
                || (is_spaceless_script_char(l) && is_spaceless_script_char(r)))
        }
        _ => false,
    }
}

/// NFKC-normalize, drop control characters and collapse whitespace runs.
pub fn clean_text(text: &str) -> String {
    let normalized: String = text
        .nfkc()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .filter(|&c| c != '\u{FFFD}')
        .collect();
    collapse_whitespace(&normalized)
}

/// Collapse every whitespace run to one space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether the text ends like a sentence rather than a label.
///
/// A trailing ellipsis counts; a trailing colon does not.
pub fn ends_with_sentence_punctuation(text: &str) -> bool {
    matches!(
        text.trim_end().chars().next_back(),
        Some('.' | '!' | '?' | ';' | ',' | '。' | '！' | '？' | '…')
    )
}

/// Key used to recognize repeated boilerplate: NFKC, lowercase and
/// whitespace collapsed. Digits are kept, so "Chapter 1" and "Chapter 2"
/// stay distinct.
pub fn boilerplate_key(text: &str) -> String {
    let lowered: String = text.nfkc().flat_map(char::to_lowercase).collect();
    collapse_whitespace(&lowered)
}

/// Fold every digit run to a single `#` so "page 3" matches "page 14".
pub fn fold_digits(key: &str) -> String {
    let mut folded = String::with_capacity(key.len());
    for c in key.chars() {
        if c.is_numeric() {
            if !folded.ends_with('#') {
                folded.push('#');
            }
        } else {
            folded.push(c);
        }
    }
    folded
}
