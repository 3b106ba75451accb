//! Prompts for relevance classification

use crate::model::{RelevanceMode, SearchResult};
use crate::service::capabilities::ResearchTarget;

pub const RELEVANCE_SYSTEM_PROMPT: &str = r#"You screen web search results for a fact-checking analysis.

Classify the result as exactly one of:
- primary_source: the result itself reports the facts at issue (official statistics, court or
  legislative records, the study itself, the organisation's own publication, first-hand reporting).
- secondary_commentary: the result discusses, summarises or comments on the facts at issue.
- unrelated: the result does not address the claim, or addresses a different jurisdiction,
  period or subject.

Judge from the title, URL and snippet only. Give a one-sentence rationale."#;

/// Build the user prompt for one candidate
pub fn build_relevance_prompt(
    candidate: &SearchResult,
    target: &ResearchTarget,
    mode: RelevanceMode,
) -> String {
    let boundary = &target.context.boundary;
    let mut frame = Vec::new();
    if let Some(jurisdiction) = &boundary.jurisdiction {
        frame.push(format!("jurisdiction {}", jurisdiction));
    }
    if let Some(window) = &boundary.time_window {
        frame.push(format!("period {}", window));
    }

    let guidance = match mode {
        RelevanceMode::Strict => {
            "Institutional or legal context: prefer official and first-hand sources."
        }
        RelevanceMode::Moderate => "Both first-hand sources and informed commentary are useful.",
        RelevanceMode::Relaxed => {
            "Earlier searches found nothing; accept anything that meaningfully addresses the claim."
        }
    };

    format!(
        "## Claim\n{}\n\n## Context\n{}{}\n\n{}\n\n## Search result\nTitle: {}\nURL: {}\nSnippet: {}\n",
        target.claim.text,
        target.context.assessed_statement,
        if frame.is_empty() {
            String::new()
        } else {
            format!(" ({})", frame.join(", "))
        },
        guidance,
        candidate.title,
        candidate.url,
        candidate.snippet
    )
}
