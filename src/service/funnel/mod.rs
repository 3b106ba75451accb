//! Source selection funnel
//!
//! Reduces the raw results of one research iteration to a small, diverse,
//! relevance-screened set of URLs worth fetching. Stages run in a fixed order:
//!
//! 1. URL dedup (within the batch and against URLs the job already saw)
//! 2. Domain pre-filter (low-value platforms, per-language overrides)
//! 3. Diversity cap (per domain and overall, in search-rank order)
//! 4. Relevance classification under the iteration's mode
//! 5. Adaptive fallback when too few candidates were accepted
//! 6. Final dedup against URLs already fetched by the job
//!
//! The funnel never mutates job state: the seen and fetched sets are passed in
//! and the caller records what it decides to keep.

mod normalize;

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use futures::future::join_all;

use crate::model::config::SourceFilterConfig;
use crate::model::{EngineConfig, RelevanceClass, RelevanceMode, SearchResult};
use crate::service::capabilities::{RelevanceClassifier, ResearchTarget};
use crate::service::limits::CallLimiter;

pub use normalize::{NormalizedUrl, normalize_url};

/// A search result tagged with the language of the query that produced it
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub result: SearchResult,
    pub language: Option<String>,
}

/// A search result moving through the funnel
#[derive(Debug, Clone)]
pub struct Candidate {
    pub result: SearchResult,
    pub normalized: NormalizedUrl,
    pub language: Option<String>,
    /// Position in the merged search results (0 = best)
    pub rank: usize,
    pub relevance: Option<RelevanceClass>,
    /// Promoted by adaptive fallback after being rejected
    pub fallback: bool,
}

/// Per-stage counts for one funnel run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunnelStats {
    pub received: usize,
    pub after_dedup: usize,
    pub after_domain_filter: usize,
    pub after_diversity_cap: usize,
    pub accepted: usize,
    pub promoted: usize,
    pub selected: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FunnelOutput {
    pub candidates: Vec<Candidate>,
    /// Normalized keys of every result that survived stage 1
    pub newly_seen: Vec<String>,
    pub stats: FunnelStats,
}

impl FunnelOutput {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Pick the relevance mode for an iteration
///
/// A previous empty iteration relaxes the mode even for institutional claims,
/// so a strict context cannot starve itself.
pub fn select_mode(
    target: &ResearchTarget,
    institutional_markers: &[String],
    previous_iteration_empty: bool,
) -> RelevanceMode {
    if previous_iteration_empty {
        return RelevanceMode::Relaxed;
    }

    if target.context.boundary.jurisdiction.is_some()
        || has_marker(&target.claim.text, institutional_markers)
        || has_marker(&target.context.assessed_statement, institutional_markers)
    {
        return RelevanceMode::Strict;
    }

    RelevanceMode::Moderate
}

fn has_marker(text: &str, markers: &[String]) -> bool {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect();
    let padded = format!(" {} ", words.join(" "));

    markers.iter().any(|marker| {
        let marker = marker.trim().to_lowercase();
        !marker.is_empty() && padded.contains(&format!(" {} ", marker))
    })
}

/// Stage 1: drop malformed URLs, in-batch duplicates and URLs the job already saw
pub fn dedup_stage(hits: Vec<QueryHit>, seen: &HashSet<String>) -> Vec<Candidate> {
    let mut batch = HashSet::new();

    hits.into_iter()
        .enumerate()
        .filter_map(|(rank, hit)| {
            let normalized = normalize_url(&hit.result.url)?;
            if seen.contains(&normalized.key) || !batch.insert(normalized.key.clone()) {
                return None;
            }
            Some(Candidate {
                result: hit.result,
                normalized,
                language: hit.language,
                rank,
                relevance: None,
                fallback: false,
            })
        })
        .collect()
}

/// Stage 2: drop low-value platforms
pub fn domain_stage(candidates: Vec<Candidate>, filter: &SourceFilterConfig) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|c| filter.is_domain_allowed(&c.normalized.domain, c.language.as_deref()))
        .collect()
}

/// Stage 3: keep at most `per_domain` per domain and `total` overall, by rank
pub fn diversity_stage(
    mut candidates: Vec<Candidate>,
    per_domain: usize,
    total: usize,
) -> Vec<Candidate> {
    candidates.sort_by_key(|c| c.rank);

    let mut per_domain_count: HashMap<String, usize> = HashMap::new();
    let mut kept = Vec::new();

    for candidate in candidates {
        if kept.len() >= total {
            break;
        }
        let count = per_domain_count
            .entry(candidate.normalized.domain.clone())
            .or_default();
        if *count >= per_domain {
            continue;
        }
        *count += 1;
        kept.push(candidate);
    }

    kept
}

/// Promotion order for rejected candidates (lower goes first)
fn promotion_priority(class: Option<RelevanceClass>) -> u8 {
    match class {
        Some(RelevanceClass::SecondaryCommentary) => 0,
        Some(RelevanceClass::PrimarySource) => 1,
        Some(RelevanceClass::Unrelated) | None => 2,
    }
}

/// Stage 5: accept per mode, then promote rejects up to `min_candidates`
///
/// Only classified candidates are eligible for promotion.
pub fn fallback_stage(
    classified: Vec<Candidate>,
    mode: RelevanceMode,
    min_candidates: usize,
) -> Vec<Candidate> {
    let (mut accepted, mut rejected): (Vec<Candidate>, Vec<Candidate>) = classified
        .into_iter()
        .partition(|c| c.relevance.is_some_and(|class| mode.accepts(class)));

    if accepted.len() < min_candidates {
        rejected.sort_by_key(|c| (promotion_priority(c.relevance), c.rank));
        let needed = min_candidates - accepted.len();
        accepted.extend(rejected.into_iter().take(needed).map(|mut c| {
            c.fallback = true;
            c
        }));
    }

    accepted.sort_by_key(|c| c.rank);
    accepted
}

/// Stage 6: drop URLs this job already fetched
pub fn final_dedup_stage(candidates: Vec<Candidate>, fetched: &HashSet<String>) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|c| !fetched.contains(&c.normalized.key))
        .collect()
}

/// Runs the funnel stages for one iteration
pub struct SourceFunnel<'a> {
    config: &'a EngineConfig,
    classifier: &'a dyn RelevanceClassifier,
    limiter: &'a CallLimiter,
}

impl<'a> SourceFunnel<'a> {
    pub fn new(
        config: &'a EngineConfig,
        classifier: &'a dyn RelevanceClassifier,
        limiter: &'a CallLimiter,
    ) -> Self {
        Self {
            config,
            classifier,
            limiter,
        }
    }

    pub async fn run(
        &self,
        hits: Vec<QueryHit>,
        target: &ResearchTarget,
        mode: RelevanceMode,
        seen: &HashSet<String>,
        fetched: &HashSet<String>,
    ) -> FunnelOutput {
        let mut stats = FunnelStats {
            received: hits.len(),
            ..FunnelStats::default()
        };

        let candidates = dedup_stage(hits, seen);
        stats.after_dedup = candidates.len();
        let newly_seen = candidates.iter().map(|c| c.normalized.key.clone()).collect();

        let candidates = domain_stage(candidates, &self.config.source_filter);
        stats.after_domain_filter = candidates.len();

        let candidates = diversity_stage(
            candidates,
            self.config.max_sources_per_domain,
            self.config.max_sources_per_iteration,
        );
        stats.after_diversity_cap = candidates.len();

        let classified = self.classify(candidates, target, mode).await;
        stats.accepted = classified
            .iter()
            .filter(|c| c.relevance.is_some_and(|class| mode.accepts(class)))
            .count();

        let selected = fallback_stage(classified, mode, self.config.adaptive_min_candidates);
        stats.promoted = selected.iter().filter(|c| c.fallback).count();

        let selected = final_dedup_stage(selected, fetched);
        stats.selected = selected.len();

        tracing::debug!(
            context = %target.context.id,
            claim = %target.claim.id,
            mode = ?mode,
            received = stats.received,
            after_dedup = stats.after_dedup,
            after_domain_filter = stats.after_domain_filter,
            after_diversity_cap = stats.after_diversity_cap,
            accepted = stats.accepted,
            promoted = stats.promoted,
            selected = stats.selected,
            "Source funnel completed"
        );

        FunnelOutput {
            candidates: selected,
            newly_seen,
            stats,
        }
    }

    /// Stage 4: classify every candidate; failures count as unrelated
    async fn classify(
        &self,
        candidates: Vec<Candidate>,
        target: &ResearchTarget,
        mode: RelevanceMode,
    ) -> Vec<Candidate> {
        let started = Instant::now();

        let calls = candidates.into_iter().map(|mut candidate| async move {
            let class = match self
                .limiter
                .run(self.classifier.classify(&candidate.result, target, mode))
                .await
            {
                Ok(Ok(class)) => class,
                Ok(Err(e)) => {
                    tracing::warn!(url = %candidate.result.url, error = %e, "Relevance classification failed, treating as unrelated");
                    RelevanceClass::Unrelated
                }
                Err(e) => {
                    tracing::warn!(url = %candidate.result.url, error = %e, "Relevance classification timed out, treating as unrelated");
                    RelevanceClass::Unrelated
                }
            };
            candidate.relevance = Some(class);
            candidate
        });

        let classified = join_all(calls).await;

        tracing::debug!(
            count = classified.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Classified search candidates"
        );

        classified
    }
}
