//! Prompts for verdict generation

use crate::service::capabilities::VerdictRequest;

/// Upper bound on evidence statements listed in one prompt
const MAX_PROMPT_EVIDENCE: usize = 60;

pub const VERDICT_SYSTEM_PROMPT: &str = r#"You are a fact-checking analyst. You assign calibrated truth verdicts to claims using only the evidence provided.

## Rules

1. Judge each claim strictly within its analysis context (jurisdiction, time window, methodology).
2. Use only the listed evidence. Cite evidence by id. Never invent ids.
3. truth_percentage: 0 = certainly false, 50 = undetermined, 100 = certainly true.
   The score expresses how true the CLAIM is, not how strong the evidence is.
4. confidence: how well the evidence covers the claim (0-100). Little or no evidence means low confidence.
5. contestation:
   - "contested": documented counter-evidence (studies, reports, statistics, official records) contradicts the claim. List those ids in counter_evidence_ids.
   - "doubted": disagreement exists but is opinion or rhetoric only.
   - "none": no meaningful disagreement.
6. Reasoning must be 1-3 direct sentences about the claim, not about the evidence list.

## Output

Return ONLY a JSON object, no prose:
{"verdicts": [{"claim_id": "...", "truth_percentage": 0-100, "confidence": 0-100, "reasoning": "...",
  "supporting_evidence_ids": [], "contradicting_evidence_ids": [], "contestation": "none|doubted|contested",
  "counter_evidence_ids": []}]}

Return exactly one verdict per listed claim."#;

/// Build the user prompt for one verdict batch
pub fn build_verdict_prompt(request: &VerdictRequest<'_>) -> String {
    let context = request.context;
    let mut prompt = format!(
        "## Analysis context {}\nName: {}\nAssessed statement: {}\n",
        context.id, context.short_name, context.assessed_statement
    );

    let boundary = &context.boundary;
    if let Some(jurisdiction) = &boundary.jurisdiction {
        prompt.push_str(&format!("Jurisdiction: {}\n", jurisdiction));
    }
    if let Some(window) = &boundary.time_window {
        prompt.push_str(&format!("Time window: {}\n", window));
    }
    if let Some(methodology) = &boundary.methodology {
        prompt.push_str(&format!("Methodology: {}\n", methodology));
    }

    prompt.push_str("\n## Claims\n");
    for claim in request.claims {
        prompt.push_str(&format!(
            "- [{}] ({:?} centrality) {}\n",
            claim.id, claim.centrality, claim.text
        ));
    }

    prompt.push_str("\n## Evidence\n");
    if request.evidence.is_empty() {
        prompt.push_str("No evidence was found. Use truth_percentage near 50 with low confidence.\n");
    }
    for item in request.evidence.iter().take(MAX_PROMPT_EVIDENCE) {
        let claim = item.claim_id.as_deref().unwrap_or("-");
        prompt.push_str(&format!(
            "- [{}] claim={} {:?}/{:?} direction={:?}: {} (source: {})\n",
            item.id,
            claim,
            item.category,
            item.specificity,
            item.direction,
            item.statement,
            item.source_url
        ));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Centrality;
    use crate::service::testing::{claim, context};

    #[test]
    fn test_prompt_lists_claims_and_notes_missing_evidence() {
        let ctx = context("CTX_1", "Coffee consumption trends");
        let claims = vec![claim("C1", "Coffee consumption rose", "CTX_1", Centrality::High)];
        let request = VerdictRequest {
            context: &ctx,
            claims: &claims,
            evidence: &[],
            batch_index: 0,
        };

        let prompt = build_verdict_prompt(&request);
        assert!(prompt.contains("[C1]"));
        assert!(prompt.contains("Assessed statement: Coffee consumption trends"));
        assert!(prompt.contains("No evidence was found"));
    }
}
