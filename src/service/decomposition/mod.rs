//! LLM-backed decomposition of free text into claims and contexts

use std::collections::HashSet;
use std::time::Instant;

use async_trait::async_trait;

use crate::model::extracted::ExtractedDecomposition;
use crate::model::{AnalysisContext, Claim};
use crate::service::capabilities::{CapabilityError, ClaimDecomposer};
use crate::service::llm::{LlmClient, LlmRole};

pub mod prompts;

use prompts::{DECOMPOSITION_SYSTEM_PROMPT, build_decomposition_prompt};

pub struct LlmDecomposer {
    llm_client: LlmClient,
    model: String,
}

impl LlmDecomposer {
    pub fn new(llm_client: LlmClient) -> Self {
        let model = llm_client.model_for(LlmRole::Decomposition);
        tracing::info!(model = %model, "Claim decomposer initialized");
        Self { llm_client, model }
    }
}

#[async_trait]
impl ClaimDecomposer for LlmDecomposer {
    async fn decompose(
        &self,
        text: &str,
        language: Option<&str>,
    ) -> Result<(Vec<Claim>, Vec<AnalysisContext>), CapabilityError> {
        let prompt = build_decomposition_prompt(text, language);
        let start_time = Instant::now();

        let extractor = self
            .llm_client
            .openai_client()
            .extractor::<ExtractedDecomposition>(&self.model)
            .preamble(DECOMPOSITION_SYSTEM_PROMPT)
            .additional_params(serde_json::json!({
                "temperature": 0.0,
                "seed": 42
            }))
            .build();

        let extracted = extractor.extract(&prompt).await.map_err(|e| {
            tracing::error!(
                model = %self.model,
                elapsed_ms = start_time.elapsed().as_millis(),
                error = %e,
                "Decomposition call failed"
            );
            CapabilityError::Call(e.to_string())
        })?;

        let (claims, contexts) = sanitize(extracted);
        tracing::info!(
            model = %self.model,
            elapsed_ms = start_time.elapsed().as_millis(),
            claims = claims.len(),
            contexts = contexts.len(),
            "Decomposition call completed"
        );

        Ok((claims, contexts))
    }
}

/// Drop empty and duplicate entries and dangling dependencies
fn sanitize(extracted: ExtractedDecomposition) -> (Vec<Claim>, Vec<AnalysisContext>) {
    let mut context_ids = HashSet::new();
    let contexts: Vec<AnalysisContext> = extracted
        .contexts
        .into_iter()
        .map(AnalysisContext::from)
        .filter(|c| !c.id.trim().is_empty() && context_ids.insert(c.id.clone()))
        .collect();

    let mut claim_ids = HashSet::new();
    let mut claims: Vec<Claim> = extracted
        .claims
        .into_iter()
        .map(Claim::from)
        .filter(|c| !c.text.trim().is_empty() && claim_ids.insert(c.id.clone()))
        .collect();

    for claim in &mut claims {
        let own_id = claim.id.clone();
        claim
            .depends_on
            .retain(|dep| *dep != own_id && claim_ids.contains(dep));
    }

    (claims, contexts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::extracted::{
        ExtractedCentrality, ExtractedDecomposedClaim, ExtractedDecomposedContext,
    };

    fn claim(id: &str, text: &str, depends_on: &[&str]) -> ExtractedDecomposedClaim {
        ExtractedDecomposedClaim {
            id: id.to_string(),
            text: text.to_string(),
            context_id: "CTX_1".to_string(),
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            centrality: ExtractedCentrality::High,
        }
    }

    #[test]
    fn test_sanitize_drops_duplicates_and_dangling_dependencies() {
        let extracted = ExtractedDecomposition {
            contexts: vec![ExtractedDecomposedContext {
                id: "CTX_1".to_string(),
                short_name: "coffee".to_string(),
                assessed_statement: "Coffee consumption in Europe".to_string(),
                jurisdiction: Some("EU".to_string()),
                time_window: None,
                methodology: Some(String::new()),
            }],
            claims: vec![
                claim("C1", "Coffee consumption rose", &[]),
                claim("C1", "Duplicate id", &[]),
                claim("C2", "  ", &[]),
                claim("C3", "Prices fell", &["C1", "C3", "C9"]),
            ],
        };

        let (claims, contexts) = sanitize(extracted);

        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].boundary.methodology, None);
        let ids: Vec<&str> = claims.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["C1", "C3"]);
        assert_eq!(claims[1].depends_on, vec!["C1".to_string()]);
    }
}
