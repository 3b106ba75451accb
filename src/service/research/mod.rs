//! Research loop controller
//!
//! Drives evidence gathering for every analysis context of a job. Contexts are
//! scheduled in rounds: each active context runs one iteration concurrently,
//! and the round barrier applies supplemental-context proposals through the
//! reconciler before the next round starts.
//!
//! Iteration phases: Searching -> Fetching -> Extracting -> Deciding.

mod budget;
mod decision;

use std::collections::HashSet;
use std::time::{Duration, Instant};

use futures::future::join_all;
use futures::stream::{self, StreamExt};

use crate::model::{
    AnalysisContext, Centrality, Claim, ContextResearchReport, DoneReason, EngineConfig,
    FetchStatus, RelevanceClass, ResearchDepth, ResearchSummary,
};
use crate::retriever::RetrieverError;
use crate::service::capabilities::{
    Capabilities, CapabilityError, ContextProposal, ExtractionHints, FetchedPage, ResearchTarget,
};
use crate::service::evidence_store::{EvidenceStore, SourceLedger, SourceRecord};
use crate::service::funnel::{Candidate, QueryHit, SourceFunnel, select_mode};
use crate::service::limits::CallLimiter;
use crate::service::reconciler::ContextSet;

pub use budget::ResearchBudget;
pub use decision::{Decision, DecisionInput, decide};

/// Terms appended to a contradiction query to surface opposing sources
const CONTRADICTION_TERMS: &str = "criticism disputed counter evidence";

/// Per-context sub-loop state, owned by the controller
#[derive(Debug, Clone)]
struct ContextState {
    context_id: String,
    iterations: usize,
    consecutive_empty: usize,
    contradiction_done: bool,
    /// The last iteration's funnel produced zero candidates
    previous_empty: bool,
    cursor: usize,
    done: Option<DoneReason>,
}

impl ContextState {
    fn new(context_id: String) -> Self {
        Self {
            context_id,
            iterations: 0,
            consecutive_empty: 0,
            contradiction_done: false,
            previous_empty: false,
            cursor: 0,
            done: None,
        }
    }
}

/// One planned iteration for a context
struct IterationPlan {
    state_index: usize,
    target: ResearchTarget,
    claims: Vec<Claim>,
}

#[derive(Debug, Default)]
struct IterationOutcome {
    candidates: usize,
    new_evidence: usize,
    proposals: Vec<ContextProposal>,
}

/// Shared, job-scoped resources the controller works against
pub struct ResearchResources<'a> {
    pub config: &'a EngineConfig,
    pub capabilities: &'a Capabilities,
    pub limiter: &'a CallLimiter,
    pub budget: &'a ResearchBudget,
    pub store: &'a EvidenceStore,
    pub ledger: &'a SourceLedger,
}

pub struct ResearchController<'a> {
    res: ResearchResources<'a>,
    language: Option<String>,
    depth: ResearchDepth,
}

impl<'a> ResearchController<'a> {
    pub fn new(res: ResearchResources<'a>, language: Option<String>, depth: ResearchDepth) -> Self {
        Self {
            res,
            language,
            depth,
        }
    }

    /// Run research rounds until every context is done or the deadline passes
    pub async fn run(
        &self,
        contexts: &mut ContextSet,
        deadline: tokio::time::Instant,
    ) -> ResearchSummary {
        let started = Instant::now();
        let mut states: Vec<ContextState> = contexts
            .contexts()
            .iter()
            .map(|c| ContextState::new(c.id.clone()))
            .collect();

        let deadline_reached =
            tokio::time::timeout_at(deadline, self.run_rounds(&mut states, contexts, deadline))
                .await
                .unwrap_or(true);

        if deadline_reached {
            tracing::warn!(
                elapsed_ms = started.elapsed().as_millis(),
                "Research deadline reached, continuing with gathered evidence"
            );
        }

        let reports = states
            .into_iter()
            .map(|state| {
                let claims = contexts.claims_for(&state.context_id);
                ContextResearchReport {
                    evidence_count: self.res.store.count_for(&state.context_id, &claims),
                    exhausted: self.res.budget.is_exhausted(&state.context_id),
                    done_reason: state.done.unwrap_or(DoneReason::Deadline),
                    iterations: state.iterations,
                    contradiction_search_done: state.contradiction_done,
                    context_id: state.context_id,
                }
            })
            .collect();

        tracing::info!(
            iterations = self.res.budget.used(),
            evidence = self.res.store.len(),
            deadline_reached,
            elapsed_ms = started.elapsed().as_millis(),
            "Research phase completed"
        );

        ResearchSummary {
            iterations_used: self.res.budget.used(),
            deadline_reached,
            contexts: reports,
        }
    }

    /// Returns true when the deadline passed at a round boundary
    async fn run_rounds(
        &self,
        states: &mut Vec<ContextState>,
        contexts: &mut ContextSet,
        deadline: tokio::time::Instant,
    ) -> bool {
        let mut round = 0;

        loop {
            if tokio::time::Instant::now() >= deadline {
                return true;
            }
            round += 1;
            let covered = self.res.store.claims_with_evidence();

            let mut plans = Vec::new();
            for (index, state) in states.iter_mut().enumerate() {
                if state.done.is_some() {
                    continue;
                }
                let Some(context) = contexts.get(&state.context_id).cloned() else {
                    state.done = Some(DoneReason::NoClaims);
                    self.res.budget.release_reserved(&state.context_id);
                    continue;
                };
                let claims = contexts.claims_for(&state.context_id);
                if let Some(target) = self.plan(state, context, &claims, &covered) {
                    plans.push(IterationPlan {
                        state_index: index,
                        target,
                        claims,
                    });
                }
            }

            if plans.is_empty() {
                return false;
            }

            tracing::debug!(round, active = plans.len(), "Starting research round");

            let known_claims: HashSet<String> =
                contexts.claims().iter().map(|c| c.id.clone()).collect();
            let outcomes = join_all(
                plans
                    .iter()
                    .map(|plan| self.run_iteration(plan, &states[plan.state_index], &known_claims)),
            )
            .await;

            let mut proposals = Vec::new();
            for (plan, outcome) in plans.iter().zip(outcomes) {
                let state = &mut states[plan.state_index];
                self.record_outcome(state, plan, &outcome);
                proposals.extend(outcome.proposals);
            }

            // Round barrier
            if !proposals.is_empty() {
                let report = contexts
                    .apply_proposals(proposals, self.res.capabilities.similarity.as_ref())
                    .await;
                for id in report.created {
                    let moved = self.res.budget.reserve_for_new_context(&id);
                    tracing::info!(context = %id, reserved_slots = moved, "Added supplemental context");
                    states.push(ContextState::new(id));
                }
            }
        }
    }

    /// Deciding phase: pick the next step and fund it from the budget
    fn plan(
        &self,
        state: &mut ContextState,
        context: AnalysisContext,
        claims: &[Claim],
        covered: &HashSet<String>,
    ) -> Option<ResearchTarget> {
        let budget = self.res.budget;
        let input = DecisionInput {
            has_claims: !claims.is_empty(),
            evidence_count: self.res.store.count_for(&state.context_id, claims),
            min_evidence: self.res.config.min_evidence(self.depth),
            central_claims_covered: claims
                .iter()
                .filter(|c| c.is_central())
                .all(|c| covered.contains(&c.id)),
            contradiction_done: state.contradiction_done,
            exhausted: budget.is_exhausted(&state.context_id),
            iterations: state.iterations,
            max_iterations: self.res.config.max_iterations_per_context,
            regular_available: budget.has_regular(),
            contradiction_available: budget.has_contradiction(&state.context_id),
        };

        let mut decision = decide(&input);
        if decision == Decision::Search && !budget.try_acquire_regular() {
            decision = decide(&DecisionInput {
                regular_available: false,
                ..input
            });
        }
        if decision == Decision::ContradictionSearch
            && !budget.try_acquire_contradiction(&state.context_id)
        {
            decision = decide(&DecisionInput {
                regular_available: false,
                contradiction_available: false,
                ..input
            });
        }

        let contradiction = match decision {
            Decision::Search => false,
            Decision::ContradictionSearch => true,
            Decision::Done(reason) => {
                tracing::info!(
                    context = %state.context_id,
                    reason = ?reason,
                    iterations = state.iterations,
                    evidence = input.evidence_count,
                    "Context research done"
                );
                state.done = Some(reason);
                budget.release_reserved(&state.context_id);
                return None;
            }
        };

        let claim = select_claim(claims, covered, state.cursor, contradiction)?.clone();
        if !contradiction {
            state.cursor += 1;
        }

        Some(ResearchTarget {
            context,
            claim,
            contradiction,
        })
    }

    fn record_outcome(
        &self,
        state: &mut ContextState,
        plan: &IterationPlan,
        outcome: &IterationOutcome,
    ) {
        state.iterations += 1;
        state.previous_empty = outcome.candidates == 0;
        if plan.target.contradiction {
            state.contradiction_done = true;
            // Only one contradiction search runs per context
            self.res.budget.release_reserved(&state.context_id);
        }

        if outcome.new_evidence == 0 {
            state.consecutive_empty += 1;
            if state.consecutive_empty >= self.res.config.circuit_breaker_empty_iterations
                && !self.res.budget.is_exhausted(&state.context_id)
            {
                tracing::warn!(
                    context = %state.context_id,
                    empty_iterations = state.consecutive_empty,
                    "Circuit breaker tripped, no new evidence"
                );
                self.res.budget.mark_exhausted(&state.context_id);
            }
        } else {
            state.consecutive_empty = 0;
        }
    }

    async fn run_iteration(
        &self,
        plan: &IterationPlan,
        state: &ContextState,
        known_claims: &HashSet<String>,
    ) -> IterationOutcome {
        let started = Instant::now();
        let target = &plan.target;
        let context_id = target.context.id.as_str();
        let query = build_query(target);

        tracing::info!(
            context = %context_id,
            claim = %target.claim.id,
            contradiction = target.contradiction,
            query = %query,
            "Research iteration started"
        );

        // Searching
        let hits = self.search(&query).await;

        let mode = select_mode(
            target,
            &self.res.config.relevance.institutional_markers,
            state.previous_empty,
        );
        let funnel = SourceFunnel::new(
            self.res.config,
            self.res.capabilities.classifier.as_ref(),
            self.res.limiter,
        );
        let seen = self.res.ledger.seen();
        let fetched = self.res.ledger.fetched();
        let selected = funnel.run(hits, target, mode, &seen, &fetched).await;
        self.res.ledger.mark_seen(selected.newly_seen);

        let candidates = selected.candidates.len();
        if candidates == 0 {
            tracing::info!(context = %context_id, mode = ?mode, "No candidates survived the funnel");
            return IterationOutcome::default();
        }

        // Fetching
        let pages = self.fetch_all(selected.candidates, context_id).await;

        // Extracting
        let hints = ExtractionHints {
            context: &target.context,
            claims: &plan.claims,
            contradiction: target.contradiction,
        };
        let extractions = join_all(pages.iter().map(|(source, page)| {
            let hints = &hints;
            async move {
                let result = self
                    .res
                    .limiter
                    .run(self.res.capabilities.extractor.extract(page, hints))
                    .await;
                (source, result)
            }
        }))
        .await;

        let mut outcome = IterationOutcome {
            candidates,
            ..IterationOutcome::default()
        };
        for (source, result) in extractions {
            match result {
                Ok(Ok(output)) => {
                    outcome.new_evidence += self.res.store.append(
                        source,
                        output.items,
                        known_claims,
                        self.res.config.fallback_probative_weight,
                    );
                    outcome.proposals.extend(output.supplemental_contexts);
                }
                Ok(Err(e)) | Err(e) => {
                    tracing::warn!(source = %source.url, error = %e, "Evidence extraction failed");
                }
            }
        }

        tracing::info!(
            context = %context_id,
            mode = ?mode,
            candidates,
            fetched = pages.len(),
            new_evidence = outcome.new_evidence,
            proposals = outcome.proposals.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Research iteration completed"
        );

        outcome
    }

    /// Original-language query plus the supplemental-language query, in parallel
    async fn search(&self, query: &str) -> Vec<QueryHit> {
        let primary = self.language.as_deref();
        let supplemental = self
            .res
            .config
            .supplemental_language
            .as_deref()
            .filter(|s| primary.is_none_or(|p| !p.eq_ignore_ascii_case(s)));

        match supplemental {
            Some(language) => {
                let (mut hits, extra) = futures::join!(
                    self.search_one(query, primary),
                    self.search_one(query, Some(language))
                );
                hits.extend(extra);
                hits
            }
            None => self.search_one(query, primary).await,
        }
    }

    async fn search_one(&self, query: &str, language: Option<&str>) -> Vec<QueryHit> {
        let result = self
            .res
            .limiter
            .run(self.res.capabilities.search.search(query, language))
            .await;

        match result {
            Ok(Ok(results)) => results
                .into_iter()
                .map(|result| QueryHit {
                    result,
                    language: language.map(String::from),
                })
                .collect(),
            Ok(Err(e)) | Err(e) => {
                tracing::warn!(query = %query, language = ?language, error = %e, "Search failed");
                Vec::new()
            }
        }
    }

    async fn fetch_all(
        &self,
        candidates: Vec<Candidate>,
        context_id: &str,
    ) -> Vec<(crate::model::Source, FetchedPage)> {
        stream::iter(candidates)
            .map(|candidate| self.fetch_candidate(candidate, context_id))
            .buffer_unordered(self.res.config.fetch_concurrency.max(1))
            .filter_map(|page| async move { page })
            .collect()
            .await
    }

    /// Fetch one candidate, retrying transient failures, and record the source
    async fn fetch_candidate(
        &self,
        candidate: Candidate,
        context_id: &str,
    ) -> Option<(crate::model::Source, FetchedPage)> {
        if !self.res.ledger.try_reserve_fetch(&candidate.normalized.key) {
            return None;
        }

        let url = &candidate.normalized.url;
        let timeout = Duration::from_secs(self.res.config.fetch_timeout_secs);
        let mut attempt = 0;

        let result = loop {
            let result = match self
                .res
                .limiter
                .run_with_timeout(timeout, self.res.capabilities.fetcher.fetch(url))
                .await
            {
                Ok(result) => result,
                Err(CapabilityError::Timeout(after)) => Err(RetrieverError::Timeout(after)),
                Err(e) => Err(RetrieverError::ParseError(e.to_string())),
            };

            match result {
                Err(e) if e.is_transient() && attempt < self.res.config.fetch_retries => {
                    attempt += 1;
                    tracing::debug!(url = %url, error = %e, attempt, "Retrying transient fetch error");
                }
                other => break other,
            }
        };

        let fetch_status = match &result {
            Ok(_) => FetchStatus::Fetched,
            Err(RetrieverError::Timeout(_)) => FetchStatus::TimedOut,
            Err(_) => FetchStatus::Failed,
        };

        let page = match result {
            Ok(page) => Some(page),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Fetch failed, dropping source");
                None
            }
        };

        let source = self.res.ledger.record(SourceRecord {
            url: url.clone(),
            title: page
                .as_ref()
                .and_then(|p| p.title.clone())
                .unwrap_or_else(|| candidate.result.title.clone()),
            domain: candidate.normalized.domain.clone(),
            language: page
                .as_ref()
                .and_then(|p| p.language.clone())
                .or(candidate.language.clone()),
            fetch_status,
            relevance: candidate.relevance.unwrap_or(RelevanceClass::Unrelated),
            fallback: candidate.fallback,
            context_id: context_id.to_string(),
        });

        let page = page?;
        if !self.res.ledger.try_record_content(&page.content_hash) {
            tracing::debug!(url = %url, "Skipping page with content already fetched");
            return None;
        }

        Some((source, page))
    }
}

fn centrality_rank(centrality: Centrality) -> u8 {
    match centrality {
        Centrality::High => 0,
        Centrality::Medium => 1,
        Centrality::Low => 2,
    }
}

/// Claim targeted by the next iteration
///
/// Regular searches prefer high-centrality claims still lacking evidence, then
/// rotate through all claims. Contradiction searches target the most central
/// claim.
fn select_claim<'c>(
    claims: &'c [Claim],
    covered: &HashSet<String>,
    cursor: usize,
    contradiction: bool,
) -> Option<&'c Claim> {
    if claims.is_empty() {
        return None;
    }

    if contradiction {
        return claims.iter().min_by_key(|c| centrality_rank(c.centrality));
    }

    claims
        .iter()
        .find(|c| c.is_central() && !covered.contains(&c.id))
        .or_else(|| claims.get(cursor % claims.len()))
}

/// Lowercase words joined by single spaces, padded for whole-word matching
fn padded_words(text: &str) -> String {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect();
    format!(" {} ", words.join(" "))
}

fn build_query(target: &ResearchTarget) -> String {
    let mut parts = vec![target.claim.text.trim().to_string()];
    let text = padded_words(&target.claim.text);

    // Boundary qualifiers the claim does not already mention
    let boundary = &target.context.boundary;
    for qualifier in [&boundary.jurisdiction, &boundary.time_window]
        .into_iter()
        .flatten()
    {
        if !text.contains(&padded_words(qualifier)) {
            parts.push(qualifier.clone());
        }
    }

    if target.contradiction {
        parts.push(CONTRADICTION_TERMS.to_string());
    }

    parts.join(" ")
}
