//! LLM-backed evidence extraction from fetched pages
//!
//! Extracted statements are filtered for weak content and grounded against the
//! page text. Ungrounded statements are kept for the audit trail but get a
//! probative score of zero, so they never weigh on a verdict.

use async_trait::async_trait;
use std::time::Instant;

use crate::model::extracted::{ExtractedEvidence, ExtractedFrame};
use crate::service::capabilities::{
    CapabilityError, ContextProposal, EvidenceDraft, EvidenceExtractor, ExtractionHints,
    ExtractionOutput, FetchedPage,
};
use crate::service::llm::{LlmClient, LlmRole};

pub mod filters;
pub mod prompts;
pub mod validation;

use filters::filter_weak_items;
use prompts::{EXTRACTION_SYSTEM_PROMPT, build_extraction_prompt};
use validation::ground_statements;

/// Pages shorter than this are not worth a model call
const MIN_CONTENT_CHARS: usize = 50;

/// Content beyond this many characters is cut before prompting
const MAX_CONTENT_CHARS: usize = 15000;

pub struct LlmEvidenceExtractor {
    llm_client: LlmClient,
    model: String,
}

impl LlmEvidenceExtractor {
    pub fn new(llm_client: LlmClient) -> Self {
        let model = llm_client.model_for(LlmRole::Extraction);
        tracing::info!(model = %model, "Evidence extractor initialized");
        Self { llm_client, model }
    }
}

#[async_trait]
impl EvidenceExtractor for LlmEvidenceExtractor {
    async fn extract(
        &self,
        page: &FetchedPage,
        hints: &ExtractionHints<'_>,
    ) -> Result<ExtractionOutput, CapabilityError> {
        if page.content.chars().count() < MIN_CONTENT_CHARS {
            return Ok(ExtractionOutput::default());
        }

        let content = truncate_chars(&page.content, MAX_CONTENT_CHARS);
        let title = page.title.as_deref().unwrap_or(page.url.as_str());
        let prompt = build_extraction_prompt(hints, title, content);
        let prompt_length = prompt.len();

        tracing::debug!(
            url = %page.url,
            context = %hints.context.id,
            model = %self.model,
            prompt_length = prompt_length,
            content_length = content.len(),
            "Initiating evidence extraction call"
        );

        let start_time = Instant::now();
        let extractor = self
            .llm_client
            .openai_client()
            .extractor::<ExtractedEvidence>(&self.model)
            .preamble(EXTRACTION_SYSTEM_PROMPT)
            .additional_params(serde_json::json!({
                "temperature": 0.0,
                "seed": 42
            }))
            .build();

        let extracted = match extractor.extract(&prompt).await {
            Ok(result) => {
                tracing::info!(
                    url = %page.url,
                    context = %hints.context.id,
                    model = %self.model,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    items_extracted = result.items.len(),
                    frames = result.distinct_frames.len(),
                    "Evidence extraction call completed"
                );
                result
            }
            Err(e) => {
                tracing::error!(
                    url = %page.url,
                    context = %hints.context.id,
                    model = %self.model,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    prompt_length = prompt_length,
                    error = %e,
                    "Evidence extraction call failed"
                );
                return Err(CapabilityError::Call(e.to_string()));
            }
        };

        Ok(into_output(extracted, &page.content, hints))
    }
}

/// Filter, ground and convert the model output
fn into_output(
    extracted: ExtractedEvidence,
    page_content: &str,
    hints: &ExtractionHints<'_>,
) -> ExtractionOutput {
    let raw_count = extracted.items.len();
    let items = filter_weak_items(extracted.items);

    // Ground against the full page, not the truncated prompt content
    let report = ground_statements(items.iter().map(|i| i.statement.as_str()), page_content);
    if !report.warnings.is_empty() {
        tracing::warn!(
            context = %hints.context.id,
            ungrounded = report.ungrounded_count(),
            warnings = ?report.warnings,
            "Extracted statements not grounded in source"
        );
    }

    let known_claim = |id: &str| hints.claims.iter().any(|c| c.id == id);

    let drafts: Vec<EvidenceDraft> = items
        .into_iter()
        .zip(report.grounded)
        .map(|(item, grounded)| EvidenceDraft {
            statement: item.statement.trim().to_string(),
            category: item.category.into(),
            specificity: item.specificity.into(),
            direction: item.direction.into(),
            claim_id: item.claim_id.filter(|id| known_claim(id.as_str())),
            probative_score: if grounded {
                item.probative_value.clamp(0.0, 1.0)
            } else {
                0.0
            },
        })
        .collect();

    let supplemental_contexts = extracted
        .distinct_frames
        .into_iter()
        .filter_map(|frame| into_proposal(frame, hints))
        .collect();

    tracing::debug!(
        context = %hints.context.id,
        raw_items = raw_count,
        kept_items = drafts.len(),
        "Converted extracted evidence"
    );

    ExtractionOutput {
        items: drafts,
        supplemental_contexts,
    }
}

/// A frame becomes a proposal only if it moves at least one known claim
fn into_proposal(frame: ExtractedFrame, hints: &ExtractionHints<'_>) -> Option<ContextProposal> {
    let (context, claim_ids) = frame.into_context(String::new());
    let claim_ids: Vec<String> = claim_ids
        .into_iter()
        .filter(|id| hints.claims.iter().any(|c| &c.id == id))
        .collect();

    if claim_ids.is_empty() || context.assessed_statement.trim().is_empty() {
        return None;
    }

    Some(ContextProposal {
        short_name: context.short_name,
        assessed_statement: context.assessed_statement,
        boundary: context.boundary,
        claim_ids,
    })
}

/// Cut to at most `max` characters on a char boundary
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
