//! Word index
//!
//! Case-insensitive mapping from recognized word text to every bounding box
//! where that exact text occurred. Derived entirely from a recognized-word
//! list and rebuilt whenever that list changes; never mutated independently.

use std::collections::HashMap;

use tracing::debug;

use crate::engine::RecognizedWord;
use crate::geometry::Rect;

#[derive(Debug, Clone, Default)]
pub struct WordIndex {
    entries: HashMap<String, Vec<Rect>>,
}

impl WordIndex {
    /// Group a word list by lowercased text. Repeated occurrences keep
    /// separate rect entries in original sequence order. No punctuation
    /// stripping or accent folding.
    pub fn build(words: &[RecognizedWord]) -> Self {
        let mut entries: HashMap<String, Vec<Rect>> = HashMap::new();
        for word in words {
            entries
                .entry(word.text.to_lowercase())
                .or_default()
                .push(word.bounds);
        }

        debug!(
            "indexed {} words into {} distinct keys",
            words.len(),
            entries.len()
        );

        Self { entries }
    }

    /// All rects for an exact word, case-insensitive.
    pub fn get(&self, word: &str) -> Option<&[Rect]> {
        self.entries.get(&word.to_lowercase()).map(|v| v.as_slice())
    }

    /// Lowercased index keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, x: u32) -> RecognizedWord {
        RecognizedWord {
            text: text.to_string(),
            bounds: Rect::new(x, 0, 10, 10),
            confidence: 90,
        }
    }

    #[test]
    fn test_groups_case_insensitively() {
        let words = [word("Revenue", 0), word("REVENUE", 50), word("growth", 100)];
        let index = WordIndex::build(&words);

        assert_eq!(index.len(), 2);
        let rects = index.get("revenue").unwrap();
        assert_eq!(rects.len(), 2);
        assert_eq!(rects[0].x, 0);
        assert_eq!(rects[1].x, 50);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let index = WordIndex::build(&[word("Growth", 0)]);
        assert!(index.get("growth").is_some());
        assert!(index.get("GROWTH").is_some());
        assert!(index.get("grow").is_none());
    }

    #[test]
    fn test_every_occurrence_retained_in_order() {
        let words = [word("a", 0), word("b", 10), word("a", 20), word("a", 30)];
        let index = WordIndex::build(&words);
        let xs: Vec<u32> = index.get("a").unwrap().iter().map(|r| r.x).collect();
        assert_eq!(xs, vec![0, 20, 30]);
    }

    #[test]
    fn test_no_punctuation_normalization() {
        let index = WordIndex::build(&[word("Revenue,", 0), word("Revenue", 10)]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("revenue,").unwrap().len(), 1);
    }

    #[test]
    fn test_empty_list() {
        let index = WordIndex::build(&[]);
        assert!(index.is_empty());
        assert!(index.get("anything").is_none());
    }
}
