//! LLM-backed verdict generation

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use std::time::Instant;

use super::prompts::{VERDICT_SYSTEM_PROMPT, build_verdict_prompt};
use super::recovery::parse_verdicts;
use crate::service::capabilities::{
    CapabilityError, GenerationOutcome, VerdictGenerator, VerdictRequest,
};
use crate::service::llm::{LlmClient, LlmRole};

/// Generates verdicts as raw JSON text so truncated output can be salvaged
pub struct LlmVerdictGenerator {
    llm_client: LlmClient,
    model: String,
}

impl LlmVerdictGenerator {
    pub fn new(llm_client: LlmClient) -> Self {
        let model = llm_client.model_for(LlmRole::Verdict);
        tracing::info!(model = %model, "Verdict generator initialized");
        Self { llm_client, model }
    }
}

#[async_trait]
impl VerdictGenerator for LlmVerdictGenerator {
    async fn generate(
        &self,
        request: &VerdictRequest<'_>,
    ) -> Result<GenerationOutcome, CapabilityError> {
        let prompt = build_verdict_prompt(request);
        let start_time = Instant::now();

        let agent = self
            .llm_client
            .openai_client()
            .agent(&self.model)
            .preamble(VERDICT_SYSTEM_PROMPT)
            .temperature(0.0)
            .additional_params(serde_json::json!({ "seed": 42 }))
            .build();

        let raw = match agent.prompt(prompt.as_str()).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(
                    context = %request.context.id,
                    batch = request.batch_index,
                    model = %self.model,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    error = %e,
                    "Verdict generation call failed"
                );
                return Err(CapabilityError::Call(e.to_string()));
            }
        };

        let outcome = parse_verdicts(&raw);
        tracing::info!(
            context = %request.context.id,
            batch = request.batch_index,
            claims = request.claims.len(),
            model = %self.model,
            elapsed_ms = start_time.elapsed().as_millis(),
            output_length = raw.len(),
            outcome = outcome_label(&outcome),
            "Verdict generation call completed"
        );

        Ok(outcome)
    }
}

fn outcome_label(outcome: &GenerationOutcome) -> &'static str {
    match outcome {
        GenerationOutcome::Parsed(_) => "parsed",
        GenerationOutcome::Partial { .. } => "partial",
        GenerationOutcome::Unparseable(_) => "unparseable",
    }
}
