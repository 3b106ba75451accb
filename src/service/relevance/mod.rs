//! LLM-backed relevance classification of search candidates

use async_trait::async_trait;
use std::time::Instant;

use crate::model::extracted::ExtractedRelevance;
use crate::model::{RelevanceClass, RelevanceMode, SearchResult};
use crate::service::capabilities::{CapabilityError, RelevanceClassifier, ResearchTarget};
use crate::service::llm::{LlmClient, LlmRole};

pub mod prompts;

use prompts::{RELEVANCE_SYSTEM_PROMPT, build_relevance_prompt};

pub struct LlmRelevanceClassifier {
    llm_client: LlmClient,
    model: String,
}

impl LlmRelevanceClassifier {
    pub fn new(llm_client: LlmClient) -> Self {
        let model = llm_client.model_for(LlmRole::Relevance);
        tracing::info!(model = %model, "Relevance classifier initialized");
        Self { llm_client, model }
    }
}

#[async_trait]
impl RelevanceClassifier for LlmRelevanceClassifier {
    async fn classify(
        &self,
        candidate: &SearchResult,
        target: &ResearchTarget,
        mode: RelevanceMode,
    ) -> Result<RelevanceClass, CapabilityError> {
        let prompt = build_relevance_prompt(candidate, target, mode);
        let start_time = Instant::now();

        let extractor = self
            .llm_client
            .openai_client()
            .extractor::<ExtractedRelevance>(&self.model)
            .preamble(RELEVANCE_SYSTEM_PROMPT)
            .additional_params(serde_json::json!({
                "temperature": 0.0,
                "seed": 42
            }))
            .build();

        match extractor.extract(&prompt).await {
            Ok(result) => {
                let class = RelevanceClass::from(result.classification);
                tracing::debug!(
                    url = %candidate.url,
                    mode = ?mode,
                    class = ?class,
                    rationale = %result.rationale,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    "Classified search candidate"
                );
                Ok(class)
            }
            Err(e) => {
                tracing::warn!(
                    url = %candidate.url,
                    model = %self.model,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    error = %e,
                    "Relevance classification call failed"
                );
                Err(CapabilityError::Call(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::research_target;

    #[test]
    fn test_prompt_carries_mode_guidance_and_candidate() {
        let mut target = research_target();
        target.context.boundary.jurisdiction = Some("EU".to_string());
        let candidate = SearchResult {
            url: "https://ec.europa.eu/eurostat/coffee".to_string(),
            title: "Coffee imports 2021".to_string(),
            snippet: "Imports rose by 4.2%".to_string(),
        };

        let prompt = build_relevance_prompt(&candidate, &target, RelevanceMode::Strict);

        assert!(prompt.contains("Coffee consumption in Europe rose in 2021"));
        assert!(prompt.contains("(jurisdiction EU)"));
        assert!(prompt.contains("prefer official and first-hand sources"));
        assert!(prompt.contains("https://ec.europa.eu/eurostat/coffee"));
    }
}
