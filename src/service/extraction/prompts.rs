//! Prompts for evidence extraction

use crate::service::capabilities::ExtractionHints;

pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You extract evidence from a web page for a fact-checking analysis.

## Rules

1. Extract only statements the page actually makes. Quote them verbatim or near-verbatim.
2. Each statement must bear on one of the listed claims. Set claim_id to that claim's id, or null when it only bears on the context in general.
3. category: study | report | statistic | official_record | expert_opinion | statement | criticism | other.
   Use study/report/statistic/official_record only for documented findings, not for opinions about them.
4. direction relative to the claim: supports | contradicts | neutral.
5. probative_value (0.0-1.0): how much the statement helps decide the claim. Vague or second-hand statements score low.
6. No meta-commentary ("this article says"). No navigation text, ads or cookie notices.
7. distinct_frames: only when the page shows that a listed claim is really about a different
   jurisdiction, time window or methodology than the current context. Give the claim ids that belong there.
   Leave empty otherwise.

Return an empty items array if the page has nothing relevant."#;

/// Build the user prompt for one page
pub fn build_extraction_prompt(hints: &ExtractionHints<'_>, title: &str, content: &str) -> String {
    let context = hints.context;
    let mut prompt = format!(
        "## Context {}\n{}\n",
        context.short_name, context.assessed_statement
    );
    if let Some(jurisdiction) = &context.boundary.jurisdiction {
        prompt.push_str(&format!("Jurisdiction: {}\n", jurisdiction));
    }
    if let Some(window) = &context.boundary.time_window {
        prompt.push_str(&format!("Time window: {}\n", window));
    }

    prompt.push_str("\n## Claims\n");
    for claim in hints.claims {
        prompt.push_str(&format!("- [{}] {}\n", claim.id, claim.text));
    }

    if hints.contradiction {
        prompt.push_str(
            "\nFocus on evidence that contradicts or qualifies the claims, including criticism and counter-studies.\n",
        );
    }

    prompt.push_str(&format!("\n## Page: {}\n\n{}\n", title, content));
    prompt
}
