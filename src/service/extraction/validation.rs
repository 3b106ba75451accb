//! Grounding checks for extracted evidence statements
//!
//! A statement counts as grounded when it appears in the fetched page either
//! verbatim, as a long contiguous fragment, or as an in-order word sequence
//! that tolerates light paraphrasing and punctuation drift.

/// Share of a statement that must match contiguously
const CONTIGUOUS_RATIO: f32 = 0.70;

/// Share of statement words that must appear in the page in order
const WORD_SUBSEQUENCE_RATIO: f32 = 0.70;

/// Result of grounding a batch of statements
#[derive(Debug)]
pub struct GroundingReport {
    /// Per-statement grounding flags, in input order
    pub grounded: Vec<bool>,
    /// Quality problems worth logging but not fatal
    pub warnings: Vec<String>,
}

impl GroundingReport {
    pub fn ungrounded_count(&self) -> usize {
        self.grounded.iter().filter(|g| !**g).count()
    }

    fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

/// Check every statement against the page content
pub fn ground_statements<'a, I>(statements: I, page_content: &str) -> GroundingReport
where
    I: IntoIterator<Item = &'a str>,
{
    let normalized_page = normalize_whitespace(page_content).to_lowercase();
    let mut report = GroundingReport {
        grounded: Vec::new(),
        warnings: Vec::new(),
    };

    for (i, statement) in statements.into_iter().enumerate() {
        let grounded = is_grounded(statement, page_content, &normalized_page);
        if !grounded {
            report.add_warning(format!(
                "Statement {} not found in source: '{}'",
                i + 1,
                statement.chars().take(100).collect::<String>()
            ));
        }
        report.grounded.push(grounded);
    }

    report
}

fn is_grounded(statement: &str, page_content: &str, normalized_page: &str) -> bool {
    let normalized = normalize_whitespace(statement).to_lowercase();
    if normalized.is_empty() {
        return false;
    }
    normalized_page.contains(&normalized)
        || words_in_order_present(statement, page_content, WORD_SUBSEQUENCE_RATIO)
        || is_substantially_present(&normalized, normalized_page)
}

/// Collapse runs of whitespace and trim
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase and strip surrounding punctuation
fn normalize_word(w: &str) -> String {
    w.trim_matches(|c: char| c.is_ascii_punctuation())
        .to_lowercase()
}

/// A contiguous fragment covering most of the (already lowercased) statement
/// appears in the page
fn is_substantially_present(statement: &str, page: &str) -> bool {
    let chars: Vec<char> = statement.chars().collect();
    let threshold = ((chars.len() as f32 * CONTIGUOUS_RATIO) as usize).max(1);

    for window in (threshold..=chars.len()).rev() {
        for start in 0..=(chars.len() - window) {
            let fragment: String = chars[start..start + window].iter().collect();
            if page.contains(&fragment) {
                return true;
            }
        }
    }

    false
}

/// At least `min_ratio` of statement words appear in the page in order
fn words_in_order_present(statement: &str, page: &str, min_ratio: f32) -> bool {
    let statement_words: Vec<String> = statement
        .split_whitespace()
        .map(normalize_word)
        .filter(|w| !w.is_empty())
        .collect();
    if statement_words.is_empty() {
        return false;
    }

    let page_words: Vec<String> = page
        .split_whitespace()
        .map(normalize_word)
        .filter(|w| !w.is_empty())
        .collect();

    // A word missing from the page does not consume the rest of it
    let mut page_idx = 0;
    let mut matched = 0;
    for word in &statement_words {
        if let Some(offset) = page_words[page_idx..].iter().position(|w| w == word) {
            matched += 1;
            page_idx += offset + 1;
        }
    }

    matched as f32 / statement_words.len() as f32 >= min_ratio
}
