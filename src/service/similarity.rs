//! Lexical similarity scorer used for context reconciliation

use std::collections::HashSet;

use async_trait::async_trait;

use crate::service::capabilities::{CapabilityError, SimilarityScorer};

/// Words too common to say anything about whether two statements overlap
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "of", "in", "on", "at", "to", "for", "by", "with", "is",
    "are", "was", "were", "be", "been", "that", "this", "it", "its", "as", "from",
];

/// Jaccard word-overlap similarity over normalized tokens
#[derive(Debug, Clone, Default)]
pub struct LexicalSimilarity;

impl LexicalSimilarity {
    pub fn new() -> Self {
        Self
    }

    /// Similarity in [0, 1]; 0 when either side has no content words
    pub fn score(a: &str, b: &str) -> f64 {
        let words_a = content_words(a);
        let words_b = content_words(b);

        if words_a.is_empty() || words_b.is_empty() {
            return 0.0;
        }

        let intersection = words_a.intersection(&words_b).count();
        let union = words_a.union(&words_b).count();

        intersection as f64 / union as f64
    }
}

/// Lowercase alphanumeric tokens without stop words
fn content_words(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(w))
        .map(String::from)
        .collect()
}

#[async_trait]
impl SimilarityScorer for LexicalSimilarity {
    async fn similarity(&self, a: &str, b: &str) -> Result<f64, CapabilityError> {
        Ok(Self::score(a, b))
    }
}
