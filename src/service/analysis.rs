//! Analysis job orchestration
//!
//! One call to [`AnalysisService::run_analysis`] is one job: reconcile the
//! decomposition into contexts, research under a budget and deadline, generate
//! and correct verdicts, then aggregate. Everything job-scoped (evidence,
//! sources, budget, call limiter) is created here and dropped with the job.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::model::config::ConfigError;
use crate::model::{AnalysisContext, AnalysisInput, AnalysisResult, Claim, EngineConfig};
use crate::service::aggregation::{Aggregator, WeightedAggregator};
use crate::service::capabilities::{Capabilities, CapabilityError, ClaimDecomposer};
use crate::service::config_provider::ConfigProvider;
use crate::service::correction::VerdictCorrector;
use crate::service::evidence_store::{EvidenceStore, SourceLedger};
use crate::service::limits::CallLimiter;
use crate::service::reconciler::ContextSet;
use crate::service::research::{ResearchBudget, ResearchController, ResearchResources};
use crate::service::verdicts::VerdictBatchGenerator;

/// Job-fatal failures; everything else degrades into the result
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AnalysisError {
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    #[error("No claims to analyze")]
    NoClaims,

    #[error("Claim decomposition failed: {0}")]
    Decomposition(CapabilityError),
}

pub struct AnalysisService {
    config: Arc<dyn ConfigProvider>,
    capabilities: Capabilities,
    decomposer: Option<Arc<dyn ClaimDecomposer>>,
    aggregator: Arc<dyn Aggregator>,
}

impl AnalysisService {
    pub fn new(config: Arc<dyn ConfigProvider>, capabilities: Capabilities) -> Self {
        Self {
            config,
            capabilities,
            decomposer: None,
            aggregator: Arc::new(WeightedAggregator),
        }
    }

    /// Decompose `input_text` when a job arrives without claims
    pub fn with_decomposer(mut self, decomposer: Arc<dyn ClaimDecomposer>) -> Self {
        self.decomposer = Some(decomposer);
        self
    }

    pub fn with_aggregator(mut self, aggregator: Arc<dyn Aggregator>) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub async fn run_analysis(&self, input: AnalysisInput) -> Result<AnalysisResult, AnalysisError> {
        let config = self.config.current();
        config.validate()?;

        let job_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(config.job_deadline_secs);
        let limiter = CallLimiter::new(
            config.max_concurrent_calls,
            Duration::from_secs(config.call_timeout_secs),
        );

        tracing::info!(
            job_id = %job_id,
            depth = ?input.depth,
            language = ?input.language,
            claims = input.claims.len(),
            contexts = input.contexts.len(),
            "Starting analysis job"
        );

        let (claims, contexts) = self.claims_for(&input, &limiter).await?;

        let (mut context_set, report) = ContextSet::from_decomposition(
            claims,
            contexts,
            config.max_contexts,
            config.context_similarity_threshold,
            self.capabilities.similarity.as_ref(),
        )
        .await;
        tracing::debug!(
            job_id = %job_id,
            contexts = context_set.len(),
            reassigned = report.reassigned,
            forced = report.forced,
            "Reconciled initial contexts"
        );

        let budget = ResearchBudget::new(
            config.max_total_iterations,
            config.reserved_contradiction_slots,
            context_set.contexts().iter().map(|c| c.id.clone()),
        );
        let store = EvidenceStore::new();
        let ledger = SourceLedger::new();

        let research = ResearchController::new(
            ResearchResources {
                config: &config,
                capabilities: &self.capabilities,
                limiter: &limiter,
                budget: &budget,
                store: &store,
                ledger: &ledger,
            },
            input.language.clone(),
            input.depth,
        )
        .run(&mut context_set, deadline)
        .await;

        let orphans = context_set
            .assign_orphans(self.capabilities.similarity.as_ref())
            .await;
        if orphans.reassigned + orphans.forced + orphans.created.len() > 0 {
            tracing::warn!(
                job_id = %job_id,
                reassigned = orphans.reassigned,
                forced = orphans.forced,
                created = orphans.created.len(),
                "Reassigned claims left without a context after research"
            );
        }

        let evidence = store.into_items();
        let verdicts = self
            .verdicts_for(&config, &limiter, &context_set, &evidence)
            .await;

        let (claims, contexts) = context_set.into_parts();
        let context_ids: Vec<String> = contexts.iter().map(|c| c.id.clone()).collect();
        let article_verdict = self.aggregator.aggregate(&claims, &context_ids, &verdicts);

        let completed_at = Utc::now();
        tracing::info!(
            job_id = %job_id,
            claims = claims.len(),
            contexts = contexts.len(),
            evidence = evidence.len(),
            fallback_verdicts = article_verdict.fallback_count,
            truth = article_verdict.truth_percentage,
            confidence = article_verdict.confidence,
            deadline_reached = research.deadline_reached,
            elapsed_ms = (completed_at - started_at).num_milliseconds(),
            "Analysis job completed"
        );

        Ok(AnalysisResult {
            job_id,
            claims,
            contexts,
            sources: ledger.into_sources(),
            evidence,
            claim_verdicts: verdicts,
            article_verdict,
            research,
            started_at,
            completed_at,
        })
    }

    /// Claims supplied with the job, or decomposed from its text
    async fn claims_for(
        &self,
        input: &AnalysisInput,
        limiter: &CallLimiter,
    ) -> Result<(Vec<Claim>, Vec<AnalysisContext>), AnalysisError> {
        if !input.claims.is_empty() {
            return Ok((input.claims.clone(), input.contexts.clone()));
        }

        let Some(decomposer) = &self.decomposer else {
            return Err(AnalysisError::NoClaims);
        };
        if input.input_text.trim().is_empty() {
            return Err(AnalysisError::NoClaims);
        }

        let (claims, contexts) = limiter
            .run(decomposer.decompose(&input.input_text, input.language.as_deref()))
            .await
            .and_then(|result| result)
            .map_err(AnalysisError::Decomposition)?;

        if claims.is_empty() {
            return Err(AnalysisError::NoClaims);
        }
        Ok((claims, contexts))
    }

    /// Generate, correct and freeze verdicts for every claim
    async fn verdicts_for(
        &self,
        config: &EngineConfig,
        limiter: &CallLimiter,
        contexts: &ContextSet,
        evidence: &[crate::model::EvidenceItem],
    ) -> Vec<crate::model::ClaimVerdict> {
        let mut pending =
            VerdictBatchGenerator::new(config, self.capabilities.generator.as_ref(), limiter)
                .generate_all(contexts, evidence)
                .await;

        let corrector = VerdictCorrector::new(&config.directionality, evidence);
        for context_verdicts in &mut pending {
            corrector.correct(context_verdicts);
        }

        pending.into_iter().flat_map(|p| p.freeze()).collect()
    }
}
