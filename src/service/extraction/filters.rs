//! Filtering of weak or off-topic extracted statements

use crate::model::extracted::ExtractedEvidenceItem;

/// Statements shorter than this carry no checkable content
const MIN_STATEMENT_CHARS: usize = 20;

/// Statements about the page itself rather than about the world
const META_PHRASES: &[&str] = &[
    "this article",
    "this page",
    "this website",
    "the author",
    "the document states",
    "according to the excerpt",
    "this excerpt",
    "the text says",
];

/// Page furniture that extraction sometimes picks up
const NOISE_PATTERNS: &[&str] = &[
    "cookie",
    "subscribe",
    "newsletter",
    "sign up",
    "log in",
    "all rights reserved",
    "privacy policy",
];

/// Drop statements that are too short, meta-commentary, or page noise
pub fn filter_weak_items(items: Vec<ExtractedEvidenceItem>) -> Vec<ExtractedEvidenceItem> {
    items.into_iter().filter(is_substantive).collect()
}

fn is_substantive(item: &ExtractedEvidenceItem) -> bool {
    let statement = item.statement.trim();
    if statement.chars().count() < MIN_STATEMENT_CHARS {
        tracing::debug!(statement = %statement, "Filtering out short statement");
        return false;
    }

    let lower = statement.to_lowercase();
    if let Some(phrase) = META_PHRASES.iter().find(|p| lower.contains(*p)) {
        tracing::debug!(
            phrase = %phrase,
            statement_preview = statement.chars().take(100).collect::<String>(),
            "Filtering out meta-commentary statement"
        );
        return false;
    }

    if NOISE_PATTERNS.iter().any(|p| lower.contains(p)) {
        tracing::debug!(
            statement_preview = statement.chars().take(100).collect::<String>(),
            "Filtering out page noise"
        );
        return false;
    }

    true
}
