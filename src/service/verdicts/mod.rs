//! Batched verdict generation with partial recovery and fallback
//!
//! Claims are split per context into batches of at most `max_batch_size`.
//! Batches of one context run one after another; contexts run concurrently,
//! bounded by the job's call limiter. Every claim leaves this module with
//! exactly one verdict: generated, salvaged, or a neutral fallback.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use futures::future::join_all;

use crate::model::extracted::ExtractedVerdict;
use crate::model::{AnalysisContext, Claim, ClaimVerdict, EngineConfig, EvidenceItem, FALLBACK_SCORE};
use crate::service::capabilities::{GenerationOutcome, VerdictGenerator, VerdictRequest};
use crate::service::limits::CallLimiter;
use crate::service::reconciler::ContextSet;

pub mod error;
pub mod llm;
pub mod prompts;
pub mod recovery;

pub use error::GenerationFailure;
pub use llm::LlmVerdictGenerator;

/// Verdicts of one context, open to correction until frozen
#[derive(Debug, Clone)]
pub struct PendingVerdicts {
    context_id: String,
    verdicts: Vec<ClaimVerdict>,
}

impl PendingVerdicts {
    pub fn new(context_id: impl Into<String>, verdicts: Vec<ClaimVerdict>) -> Self {
        Self {
            context_id: context_id.into(),
            verdicts,
        }
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn verdicts(&self) -> &[ClaimVerdict] {
        &self.verdicts
    }

    pub(crate) fn verdicts_mut(&mut self) -> &mut [ClaimVerdict] {
        &mut self.verdicts
    }

    /// End the correction phase; the returned verdicts are final
    pub fn freeze(self) -> Vec<ClaimVerdict> {
        self.verdicts
    }
}

/// What one batch attempt sequence produced
enum BatchResult {
    Verdicts {
        verdicts: Vec<ExtractedVerdict>,
        partial_error: Option<String>,
    },
    Failed(GenerationFailure),
}

pub struct VerdictBatchGenerator<'a> {
    config: &'a EngineConfig,
    generator: &'a dyn VerdictGenerator,
    limiter: &'a CallLimiter,
}

impl<'a> VerdictBatchGenerator<'a> {
    pub fn new(
        config: &'a EngineConfig,
        generator: &'a dyn VerdictGenerator,
        limiter: &'a CallLimiter,
    ) -> Self {
        Self {
            config,
            generator,
            limiter,
        }
    }

    /// Generate verdicts for every claim of every context
    pub async fn generate_all(
        &self,
        contexts: &ContextSet,
        evidence: &[EvidenceItem],
    ) -> Vec<PendingVerdicts> {
        let start_time = Instant::now();

        let per_context = contexts.contexts().iter().map(|context| {
            let claims = contexts.claims_for(&context.id);
            async move {
                let verdicts = self.generate_context(context, &claims, evidence).await;
                PendingVerdicts::new(context.id.clone(), verdicts)
            }
        });
        let pending = join_all(per_context).await;

        let total: usize = pending.iter().map(|p| p.verdicts.len()).sum();
        let fallback: usize = pending
            .iter()
            .flat_map(|p| p.verdicts.iter())
            .filter(|v| v.fallback)
            .count();
        tracing::info!(
            contexts = pending.len(),
            verdicts = total,
            fallback_verdicts = fallback,
            elapsed_ms = start_time.elapsed().as_millis(),
            "Verdict generation complete"
        );

        pending
    }

    async fn generate_context(
        &self,
        context: &AnalysisContext,
        claims: &[Claim],
        evidence: &[EvidenceItem],
    ) -> Vec<ClaimVerdict> {
        let batch_size = self.config.max_batch_size.max(1);
        let mut verdicts = Vec::with_capacity(claims.len());

        for (batch_index, batch) in claims.chunks(batch_size).enumerate() {
            let offered = offered_evidence(context, batch, evidence);
            verdicts.extend(self.run_batch(context, batch, &offered, batch_index).await);
        }

        verdicts
    }

    async fn run_batch(
        &self,
        context: &AnalysisContext,
        claims: &[Claim],
        offered: &[EvidenceItem],
        batch_index: usize,
    ) -> Vec<ClaimVerdict> {
        let request = VerdictRequest {
            context,
            claims,
            evidence: offered,
            batch_index,
        };

        match self.call_with_retry(&request).await {
            BatchResult::Verdicts {
                verdicts,
                partial_error,
            } => {
                let missing_reason = partial_error
                    .map(|e| format!("output truncated or malformed ({})", e))
                    .unwrap_or_else(|| "claim missing from generation output".to_string());
                merge_batch(context, claims, offered, verdicts, &missing_reason)
            }
            BatchResult::Failed(failure) => {
                tracing::warn!(
                    context = %context.id,
                    batch = batch_index,
                    claims = claims.len(),
                    error = %failure,
                    "Verdict batch failed, using fallback verdicts"
                );
                let reason = failure.to_string();
                claims
                    .iter()
                    .map(|c| ClaimVerdict::fallback(&c.id, &context.id, &reason))
                    .collect()
            }
        }
    }

    /// Call the generator, retrying unparseable output and call errors
    async fn call_with_retry(&self, request: &VerdictRequest<'_>) -> BatchResult {
        let mut attempt = 0;
        loop {
            let failure = match self.limiter.run(self.generator.generate(request)).await {
                Ok(Ok(GenerationOutcome::Parsed(verdicts))) => {
                    return BatchResult::Verdicts {
                        verdicts,
                        partial_error: None,
                    };
                }
                Ok(Ok(GenerationOutcome::Partial { salvaged, error })) => {
                    tracing::warn!(
                        context = %request.context.id,
                        batch = request.batch_index,
                        salvaged = salvaged.len(),
                        claims = request.claims.len(),
                        error = %error,
                        "Verdict output only partially recovered"
                    );
                    return BatchResult::Verdicts {
                        verdicts: salvaged,
                        partial_error: Some(error),
                    };
                }
                Ok(Ok(GenerationOutcome::Unparseable(reason))) => {
                    GenerationFailure::Unparseable(reason)
                }
                Ok(Err(e)) | Err(e) => GenerationFailure::Call(e),
            };

            if attempt >= self.config.generation_retries {
                return BatchResult::Failed(failure);
            }
            attempt += 1;
            tracing::debug!(
                context = %request.context.id,
                batch = request.batch_index,
                attempt = attempt,
                error = %failure,
                "Retrying verdict batch"
            );
        }
    }
}

/// Evidence offered to a batch: the context's items plus items linked to the
/// batch's claims, never probative-0 items
fn offered_evidence(
    context: &AnalysisContext,
    claims: &[Claim],
    evidence: &[EvidenceItem],
) -> Vec<EvidenceItem> {
    let claim_ids: HashSet<&str> = claims.iter().map(|c| c.id.as_str()).collect();
    evidence
        .iter()
        .filter(|item| item.is_probative())
        .filter(|item| {
            item.context_id == context.id
                || item
                    .claim_id
                    .as_deref()
                    .is_some_and(|id| claim_ids.contains(id))
        })
        .cloned()
        .collect()
}

/// One verdict per batch claim, in claim order
fn merge_batch(
    context: &AnalysisContext,
    claims: &[Claim],
    offered: &[EvidenceItem],
    generated: Vec<ExtractedVerdict>,
    missing_reason: &str,
) -> Vec<ClaimVerdict> {
    let offered_ids: HashSet<&str> = offered.iter().map(|e| e.id.as_str()).collect();

    let mut by_claim: HashMap<String, ExtractedVerdict> = HashMap::new();
    for verdict in generated {
        // First verdict per claim wins
        by_claim.entry(verdict.claim_id.clone()).or_insert(verdict);
    }

    claims
        .iter()
        .map(|claim| match by_claim.remove(&claim.id) {
            Some(verdict) => to_claim_verdict(verdict, &context.id, &offered_ids),
            None => ClaimVerdict::fallback(&claim.id, &context.id, missing_reason),
        })
        .collect()
}

fn to_claim_verdict(
    verdict: ExtractedVerdict,
    context_id: &str,
    offered_ids: &HashSet<&str>,
) -> ClaimVerdict {
    let keep_offered = |ids: Vec<String>| -> Vec<String> {
        let mut kept: Vec<String> = Vec::new();
        for id in ids {
            if offered_ids.contains(id.as_str()) && !kept.contains(&id) {
                kept.push(id);
            }
        }
        kept
    };

    ClaimVerdict {
        claim_id: verdict.claim_id,
        context_id: context_id.to_string(),
        truth_percentage: to_score(verdict.truth_percentage),
        confidence: to_score(verdict.confidence),
        reasoning: verdict.reasoning,
        supporting_evidence_ids: keep_offered(verdict.supporting_evidence_ids),
        contradicting_evidence_ids: keep_offered(verdict.contradicting_evidence_ids),
        contestation: verdict.contestation.into(),
        counter_evidence_ids: keep_offered(verdict.counter_evidence_ids),
        fallback: false,
        corrections: Vec::new(),
    }
}

fn to_score(value: f64) -> u8 {
    if value.is_finite() {
        value.clamp(0.0, 100.0).round() as u8
    } else {
        FALLBACK_SCORE
    }
}
