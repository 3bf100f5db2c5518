//! Logistic heading model over text-shape cues and a word vocabulary.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::cues::TextCues;
use super::{HeadingFilter, TextScore};
use crate::error::{Error, Result};

/// Weights shipped with the crate.
const BUNDLED_WEIGHTS: &str = include_str!("../../models/heading_filter.json");

/// Weights of the text-shape features.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeWeights {
    pub numbered_prefix: f32,
    pub keyword_prefix: f32,
    pub enumeration: f32,
    pub all_caps: f32,
    pub title_case: f32,
    pub trailing_colon: f32,
    pub trailing_punctuation: f32,
    pub leading_stop_word: f32,
    pub discourse_marker: f32,
    pub url_or_email: f32,
    pub page_label: f32,
    pub dot_leaders: f32,
    pub copyright: f32,
    pub lowercase_start: f32,
    /// Two or more commas
    pub comma_heavy: f32,
    /// 1 to 12 words
    pub short_text: f32,
    /// 13 to 20 words
    pub medium_text: f32,
    /// More than 20 words
    pub long_text: f32,
    /// Fewer than three letters
    pub few_letters: f32,
}

impl ShapeWeights {
    fn values(&self) -> [f32; 19] {
        [
            self.numbered_prefix,
            self.keyword_prefix,
            self.enumeration,
            self.all_caps,
            self.title_case,
            self.trailing_colon,
            self.trailing_punctuation,
            self.leading_stop_word,
            self.discourse_marker,
            self.url_or_email,
            self.page_label,
            self.dot_leaders,
            self.copyright,
            self.lowercase_start,
            self.comma_heavy,
            self.short_text,
            self.medium_text,
            self.long_text,
            self.few_letters,
        ]
    }

    /// Sum of the weights whose cue fires.
    fn contribution(&self, cues: &TextCues) -> f32 {
        let flags = [
            (cues.numbering_depth.is_some(), self.numbered_prefix),
            (cues.keyword_level.is_some(), self.keyword_prefix),
            (cues.enumeration, self.enumeration),
            (cues.all_caps, self.all_caps),
            (cues.title_case, self.title_case),
            (cues.trailing_colon, self.trailing_colon),
            (cues.trailing_punctuation, self.trailing_punctuation),
            (cues.leading_stop_word, self.leading_stop_word),
            (cues.discourse_marker, self.discourse_marker),
            (cues.url_or_email, self.url_or_email),
            (cues.page_label, self.page_label),
            (cues.dot_leaders, self.dot_leaders),
            (cues.copyright, self.copyright),
            (cues.lowercase_start, self.lowercase_start),
            (cues.comma_count >= 2, self.comma_heavy),
            ((1..=12).contains(&cues.word_count), self.short_text),
            ((13..=20).contains(&cues.word_count), self.medium_text),
            (cues.word_count > 20, self.long_text),
            (cues.letter_count < 3, self.few_letters),
        ];
        flags
            .iter()
            .filter(|(fires, _)| *fires)
            .map(|(_, weight)| weight)
            .sum()
    }
}

/// Serialized form of the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelWeights {
    /// Free-form version tag, logged on load
    #[serde(default)]
    pub version: String,
    pub bias: f32,
    #[serde(default)]
    pub shape: ShapeWeights,
    /// Lowercase unigrams and space-joined bigrams
    #[serde(default)]
    pub vocabulary: HashMap<String, f32>,
}

/// Text-only heading classifier: `sigmoid(bias + shape + tokens / sqrt(n))`.
#[derive(Debug, Clone)]
pub struct LinearHeadingModel {
    weights: ModelWeights,
}

impl LinearHeadingModel {
    /// Build a model from weights, rejecting non-finite values.
    pub fn new(weights: ModelWeights) -> Result<Self> {
        let finite = weights.bias.is_finite()
            && weights.shape.values().iter().all(|w| w.is_finite())
            && weights.vocabulary.values().all(|w| w.is_finite());
        if !finite {
            return Err(Error::ModelUnavailable(
                "model weights contain non-finite values".into(),
            ));
        }
        Ok(Self { weights })
    }

    /// Parse weights from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let weights: ModelWeights = serde_json::from_str(json)
            .map_err(|e| Error::ModelUnavailable(format!("malformed model weights: {}", e)))?;
        Self::new(weights)
    }

    /// Load weights from a local file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::ModelUnavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// The weights compiled into the crate.
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_WEIGHTS)
    }

    pub fn weights(&self) -> &ModelWeights {
        &self.weights
    }

    /// Raw logit before the sigmoid.
    pub fn logit(&self, text: &str, cues: &TextCues) -> f32 {
        let tokens = tokenize(text);
        let vocabulary = &self.weights.vocabulary;

        let mut token_sum = 0.0;
        for (i, token) in tokens.iter().enumerate() {
            token_sum += vocabulary.get(token.as_str()).copied().unwrap_or(0.0);
            if let Some(next) = tokens.get(i + 1) {
                let bigram = format!("{} {}", token, next);
                token_sum += vocabulary.get(&bigram).copied().unwrap_or(0.0);
            }
        }
        let token_term = if tokens.is_empty() {
            0.0
        } else {
            token_sum / (tokens.len() as f32).sqrt()
        };

        self.weights.bias + self.weights.shape.contribution(cues) + token_term
    }
}

impl HeadingFilter for LinearHeadingModel {
    fn name(&self) -> &str {
        if self.weights.version.is_empty() {
            "linear"
        } else {
            &self.weights.version
        }
    }

    fn score(&self, text: &str) -> TextScore {
        let cues = TextCues::analyze(text);
        let probability = sigmoid(self.logit(text, &cues));
        TextScore {
            probability,
            level_hint: cues.level_hint(),
        }
    }
}

/// Lowercase alphabetic word tokens; numbers and punctuation are dropped.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|t| t.trim_matches('\''))
        .filter(|t| t.chars().any(|c| c.is_alphabetic()))
        .map(|t| t.to_lowercase())
        .collect()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
