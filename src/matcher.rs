//! Keyword matching
//!
//! Resolves keyword rules (exact word, partial/substring, multi-word phrase)
//! against a word index and the ordered word sequence, producing the matched
//! bounding boxes per output keyword.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::RecognizedWord;
use crate::geometry::{union_all, Rect};
use crate::index::WordIndex;

/// Visual metadata a rule carries for the external renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerStyle {
    /// Marker/label identity the renderer resolves to a visual asset.
    #[serde(default)]
    pub marker_id: String,
    /// RGB highlight color.
    #[serde(default)]
    pub color: [u8; 3],
}

/// Caller-specified match pattern plus visualization metadata.
///
/// A keyword containing whitespace (and not marked partial) is treated as a
/// multi-word phrase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub keyword: String,
    #[serde(default)]
    pub partial: bool,
    #[serde(default)]
    pub style: MarkerStyle,
}

impl KeywordRule {
    /// Exact single-word or phrase rule.
    pub fn exact(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            partial: false,
            style: MarkerStyle::default(),
        }
    }

    /// Substring rule: matches every indexed word containing the keyword.
    pub fn partial(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            partial: true,
            style: MarkerStyle::default(),
        }
    }

    pub fn with_style(mut self, style: MarkerStyle) -> Self {
        self.style = style;
        self
    }
}

/// Resolve rules, in rule-list order, against the index and word sequence.
///
/// Output keys: partial rules write under each *matched* (lowercased) index
/// key, so one partial rule can populate several keys; exact and phrase
/// rules write under the rule's literal keyword. The first rule to produce
/// a key wins — later rules never overwrite an existing key, which makes
/// rule-list order the precedence order.
pub fn match_rules(
    rules: &[KeywordRule],
    index: &WordIndex,
    words: &[RecognizedWord],
) -> HashMap<String, Vec<Rect>> {
    let mut matched: HashMap<String, Vec<Rect>> = HashMap::new();

    for rule in rules {
        if rule.partial {
            let needle = rule.keyword.to_lowercase();
            for key in index.keys() {
                if key.contains(&needle) {
                    if let Some(rects) = index.get(key) {
                        matched
                            .entry(key.to_string())
                            .or_insert_with(|| rects.to_vec());
                    }
                }
            }
        } else if rule.keyword.split_whitespace().count() > 1 {
            let unions = match_phrase(&rule.keyword, words);
            if !unions.is_empty() {
                matched.entry(rule.keyword.clone()).or_insert(unions);
            }
        } else if let Some(rects) = index.get(&rule.keyword) {
            matched
                .entry(rule.keyword.clone())
                .or_insert_with(|| rects.to_vec());
        }
    }

    debug!("{} rules resolved to {} matched keywords", rules.len(), matched.len());

    matched
}

/// Slide a window of phrase length over the ordered word sequence; every
/// token must equal the word at its position, case-insensitively. Each match
/// contributes the union box of its window. The window advances past a
/// match, so reported matches never overlap.
fn match_phrase(phrase: &str, words: &[RecognizedWord]) -> Vec<Rect> {
    let tokens: Vec<String> = phrase.split_whitespace().map(|t| t.to_lowercase()).collect();
    let mut unions = Vec::new();
    if tokens.is_empty() || words.len() < tokens.len() {
        return unions;
    }

    let mut i = 0;
    while i + tokens.len() <= words.len() {
        let window = &words[i..i + tokens.len()];
        let is_match = window
            .iter()
            .zip(&tokens)
            .all(|(w, t)| w.text.to_lowercase() == *t);

        if is_match {
            let rects: Vec<Rect> = window.iter().map(|w| w.bounds).collect();
            if let Some(u) = union_all(&rects) {
                unions.push(u);
            }
            i += tokens.len();
        } else {
            i += 1;
        }
    }

    unions
}
