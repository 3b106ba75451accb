//! Context reconciliation
//!
//! `ContextSet` owns every analysis context and claim of a job. The only way to
//! add a context is through reconciliation, which keeps the set within
//! `max_contexts` and every claim pointing at a context that exists.

use std::collections::HashMap;

use crate::model::{AnalysisContext, Claim, ContextBoundary};
use crate::service::capabilities::{ContextProposal, SimilarityScorer};

/// Words kept from a claim when naming a context synthesized from it
const SYNTHESIZED_NAME_WORDS: usize = 6;

/// What one reconciliation pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: Vec<String>,
    /// Claims moved into an existing context above the similarity threshold
    pub reassigned: usize,
    /// Claims forced into the closest context because the cap was reached
    pub forced: usize,
}

/// A context waiting to be materialized, keyed by the id claims refer to
#[derive(Debug, Clone)]
struct PendingContext {
    key: String,
    context: AnalysisContext,
}

#[derive(Debug, Clone)]
pub struct ContextSet {
    contexts: Vec<AnalysisContext>,
    claims: Vec<Claim>,
    max_contexts: usize,
    threshold: f64,
    next_seq: usize,
    proposal_seq: usize,
}

impl ContextSet {
    /// Build the set from an upstream decomposition
    ///
    /// Input contexts are treated as proposals: they keep their ids when
    /// materialized but still go through the cap and similarity checks.
    pub async fn from_decomposition(
        claims: Vec<Claim>,
        contexts: Vec<AnalysisContext>,
        max_contexts: usize,
        threshold: f64,
        scorer: &dyn SimilarityScorer,
    ) -> (Self, ReconcileReport) {
        let mut set = Self {
            contexts: Vec::new(),
            claims,
            max_contexts,
            threshold,
            next_seq: 1,
            proposal_seq: 0,
        };

        let pending: Vec<PendingContext> = contexts
            .into_iter()
            .map(|context| PendingContext {
                key: context.id.clone(),
                context,
            })
            .collect();

        let report = set.reconcile(pending, true, scorer).await;
        (set, report)
    }

    /// Apply supplemental-context proposals queued during a research round
    ///
    /// Each proposal's referenced claims are pointed at the proposal before
    /// reconciling, so they either land in the new context or in the closest
    /// existing one. The work happens on a staged copy that replaces `self`
    /// only once reconciliation completes; a cancelled call leaves the set
    /// as it was.
    pub async fn apply_proposals(
        &mut self,
        proposals: Vec<ContextProposal>,
        scorer: &dyn SimilarityScorer,
    ) -> ReconcileReport {
        let mut staged = self.clone();
        let mut pending = Vec::new();

        for proposal in proposals {
            staged.proposal_seq += 1;
            let key = format!("proposal-{}", staged.proposal_seq);

            let mut referenced = 0;
            for claim in staged
                .claims
                .iter_mut()
                .filter(|c| proposal.claim_ids.contains(&c.id))
            {
                claim.context_id = key.clone();
                referenced += 1;
            }
            if referenced == 0 {
                tracing::debug!(
                    proposal = %proposal.short_name,
                    "Ignoring context proposal that references no known claim"
                );
                continue;
            }

            pending.push(PendingContext {
                key,
                context: AnalysisContext {
                    id: String::new(),
                    short_name: proposal.short_name,
                    assessed_statement: proposal.assessed_statement,
                    boundary: proposal.boundary,
                },
            });
        }

        if pending.is_empty() {
            return ReconcileReport::default();
        }

        let report = staged.reconcile(pending, false, scorer).await;
        *self = staged;
        report
    }

    /// Claims whose context id names no context in the set
    pub fn orphaned_claims(&self) -> Vec<&Claim> {
        self.claims
            .iter()
            .filter(|c| !self.contains(&c.context_id))
            .collect()
    }

    /// Move every orphaned claim into its closest context, or a new one while
    /// under the cap
    pub async fn assign_orphans(&mut self, scorer: &dyn SimilarityScorer) -> ReconcileReport {
        if self.orphaned_claims().is_empty() {
            return ReconcileReport::default();
        }
        self.reconcile(Vec::new(), false, scorer).await
    }

    async fn reconcile(
        &mut self,
        pending: Vec<PendingContext>,
        keep_ids: bool,
        scorer: &dyn SimilarityScorer,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let by_key: HashMap<&str, &PendingContext> =
            pending.iter().map(|p| (p.key.as_str(), p)).collect();
        let mut materialized: HashMap<String, String> = HashMap::new();

        for idx in 0..self.claims.len() {
            let current = self.claims[idx].context_id.clone();

            if let Some(target) = materialized.get(&current) {
                self.claims[idx].context_id = target.clone();
                continue;
            }
            let proposal = by_key.get(current.as_str()).copied();
            if proposal.is_none() && self.contains(&current) {
                continue;
            }

            let comparator = proposal
                .map(|p| p.context.assessed_statement.clone())
                .unwrap_or_else(|| self.claims[idx].text.clone());
            let best = self.best_match(&comparator, scorer).await;

            let target = match best {
                Some((id, score)) if score >= self.threshold => {
                    report.reassigned += 1;
                    id
                }
                best if self.contexts.len() < self.max_contexts || best.is_none() => {
                    let context = match proposal {
                        Some(p) => p.context.clone(),
                        None => synthesize_context(&self.claims[idx]),
                    };
                    let preferred = if keep_ids && proposal.is_some() {
                        Some(current.as_str())
                    } else {
                        None
                    };
                    let id = self.insert(context, preferred);
                    report.created.push(id.clone());
                    id
                }
                Some((id, score)) => {
                    tracing::warn!(
                        claim = %self.claims[idx].id,
                        context = %id,
                        similarity = score,
                        max_contexts = self.max_contexts,
                        "Context cap reached, merging claim into closest context"
                    );
                    report.forced += 1;
                    id
                }
                None => continue,
            };

            if proposal.is_some() {
                materialized.insert(current, target.clone());
            }
            self.claims[idx].context_id = target;
        }

        // Upstream contexts nobody referenced are kept while there is room
        if keep_ids {
            for p in &pending {
                if materialized.contains_key(&p.key) {
                    continue;
                }
                if self.contexts.len() < self.max_contexts {
                    let id = self.insert(p.context.clone(), Some(&p.key));
                    report.created.push(id);
                } else {
                    tracing::debug!(context = %p.key, "Dropping unreferenced context at cap");
                }
            }
        }

        if !report.created.is_empty() || report.reassigned > 0 || report.forced > 0 {
            tracing::info!(
                created = report.created.len(),
                reassigned = report.reassigned,
                forced = report.forced,
                contexts = self.contexts.len(),
                "Reconciled analysis contexts"
            );
        }

        report
    }

    /// Closest existing context by assessed statement
    async fn best_match(
        &self,
        text: &str,
        scorer: &dyn SimilarityScorer,
    ) -> Option<(String, f64)> {
        let mut best: Option<(String, f64)> = None;

        for context in &self.contexts {
            let score = match scorer.similarity(text, &context.assessed_statement).await {
                Ok(score) => score.clamp(0.0, 1.0),
                Err(e) => {
                    tracing::warn!(context = %context.id, error = %e, "Similarity scoring failed");
                    0.0
                }
            };
            if best.as_ref().is_none_or(|(_, s)| score > *s) {
                best = Some((context.id.clone(), score));
            }
        }

        best
    }

    fn insert(&mut self, mut context: AnalysisContext, preferred_id: Option<&str>) -> String {
        context.id = match preferred_id {
            Some(id) if !id.is_empty() && !self.contains(id) => id.to_string(),
            _ => self.next_id(),
        };
        let id = context.id.clone();
        self.contexts.push(context);
        id
    }

    fn next_id(&mut self) -> String {
        loop {
            let id = format!("CTX_{}", self.next_seq);
            self.next_seq += 1;
            if !self.contains(&id) {
                return id;
            }
        }
    }

    pub fn contains(&self, context_id: &str) -> bool {
        self.contexts.iter().any(|c| c.id == context_id)
    }

    pub fn get(&self, context_id: &str) -> Option<&AnalysisContext> {
        self.contexts.iter().find(|c| c.id == context_id)
    }

    pub fn contexts(&self) -> &[AnalysisContext] {
        &self.contexts
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// Claims currently assigned to a context, in claim order
    pub fn claims_for(&self, context_id: &str) -> Vec<Claim> {
        self.claims
            .iter()
            .filter(|c| c.context_id == context_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn into_parts(self) -> (Vec<Claim>, Vec<AnalysisContext>) {
        (self.claims, self.contexts)
    }
}

fn synthesize_context(claim: &Claim) -> AnalysisContext {
    let short_name = claim
        .text
        .split_whitespace()
        .take(SYNTHESIZED_NAME_WORDS)
        .collect::<Vec<_>>()
        .join(" ");

    AnalysisContext {
        id: String::new(),
        short_name,
        assessed_statement: claim.text.clone(),
        boundary: ContextBoundary::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Centrality;
    use crate::service::similarity::LexicalSimilarity;
    use crate::service::testing::DelayedSimilarity;

    fn claim(id: &str, text: &str, context_id: &str) -> Claim {
        Claim {
            id: id.to_string(),
            text: text.to_string(),
            context_id: context_id.to_string(),
            depends_on: Vec::new(),
            centrality: Centrality::Medium,
        }
    }

    fn context(id: &str, statement: &str) -> AnalysisContext {
        AnalysisContext {
            id: id.to_string(),
            short_name: id.to_lowercase(),
            assessed_statement: statement.to_string(),
            boundary: ContextBoundary::default(),
        }
    }

    fn assert_claims_valid(set: &ContextSet) {
        for claim in set.claims() {
            assert!(
                set.contains(&claim.context_id),
                "claim {} points at missing context {}",
                claim.id,
                claim.context_id
            );
        }
    }

    const TOPICS: &[&str] = &[
        "Unemployment fell in Spain",
        "Vaccine reduced hospital admissions",
        "Coffee prices rose in Brazil",
        "Glacier retreat accelerated in Alaska",
        "Rail ridership doubled in Japan",
        "Wheat harvest failed in Kenya",
        "Bee populations declined in Germany",
        "Housing costs tripled in Dublin",
    ];

    #[tokio::test]
    async fn test_initial_decomposition_respects_cap() {
        let contexts: Vec<AnalysisContext> = TOPICS
            .iter()
            .enumerate()
            .map(|(i, t)| context(&format!("CTX_{}", i + 1), t))
            .collect();
        let claims: Vec<Claim> = TOPICS
            .iter()
            .enumerate()
            .map(|(i, t)| claim(&format!("C{}", i + 1), t, &format!("CTX_{}", i + 1)))
            .collect();

        let (set, report) =
            ContextSet::from_decomposition(claims, contexts, 5, 0.5, &LexicalSimilarity).await;

        assert_eq!(set.len(), 5);
        assert_eq!(report.created.len(), 5);
        assert_eq!(report.forced, 3);
        assert_claims_valid(&set);
        // Materialized upstream contexts keep their ids
        assert!(set.contains("CTX_1"));
    }

    #[tokio::test]
    async fn test_near_duplicate_contexts_merge() {
        let contexts = vec![
            context("CTX_A", "Unemployment fell in Spain during 2023"),
            context("CTX_B", "Unemployment fell in Spain in 2023"),
        ];
        let claims = vec![
            claim("C1", "Spanish unemployment dropped", "CTX_A"),
            claim("C2", "Youth unemployment dropped", "CTX_B"),
        ];

        let (set, report) =
            ContextSet::from_decomposition(claims, contexts, 5, 0.5, &LexicalSimilarity).await;

        assert_eq!(set.len(), 1);
        assert_eq!(report.reassigned, 1);
        assert!(set.claims().iter().all(|c| c.context_id == "CTX_A"));
    }

    #[tokio::test]
    async fn test_unknown_context_is_synthesized_from_claim() {
        let claims = vec![claim("C1", "Coffee prices rose in Brazil last year", "missing")];

        let (set, _) =
            ContextSet::from_decomposition(claims, Vec::new(), 5, 0.5, &LexicalSimilarity).await;

        assert_eq!(set.len(), 1);
        let context = &set.contexts()[0];
        assert_eq!(context.assessed_statement, "Coffee prices rose in Brazil last year");
        assert_eq!(set.claims()[0].context_id, context.id);
    }

    #[tokio::test]
    async fn test_proposal_creates_context_and_moves_claims() {
        let (mut set, _) = ContextSet::from_decomposition(
            vec![
                claim("C1", "Unemployment fell in Spain", "CTX_1"),
                claim("C2", "Regional unemployment in Andalusia", "CTX_1"),
            ],
            vec![context("CTX_1", "Unemployment fell in Spain")],
            5,
            0.5,
            &LexicalSimilarity,
        )
        .await;

        let report = set
            .apply_proposals(
                vec![ContextProposal {
                    short_name: "Andalusia".to_string(),
                    assessed_statement: "Andalusian regional labour statistics".to_string(),
                    boundary: ContextBoundary {
                        jurisdiction: Some("Andalusia".to_string()),
                        ..ContextBoundary::default()
                    },
                    claim_ids: vec!["C2".to_string()],
                }],
                &LexicalSimilarity,
            )
            .await;

        assert_eq!(report.created.len(), 1);
        assert_eq!(set.len(), 2);
        let new_id = &report.created[0];
        assert_eq!(set.claims_for(new_id).len(), 1);
        assert_eq!(set.claims_for("CTX_1").len(), 1);
        assert_claims_valid(&set);
    }

    #[tokio::test]
    async fn test_proposal_at_cap_is_forced_into_closest_context() {
        let (mut set, _) = ContextSet::from_decomposition(
            vec![claim("C1", "Unemployment fell in Spain", "CTX_1")],
            vec![context("CTX_1", "Unemployment fell in Spain")],
            1,
            0.5,
            &LexicalSimilarity,
        )
        .await;

        let report = set
            .apply_proposals(
                vec![ContextProposal {
                    short_name: "Other".to_string(),
                    assessed_statement: "Completely different frame".to_string(),
                    boundary: ContextBoundary::default(),
                    claim_ids: vec!["C1".to_string()],
                }],
                &LexicalSimilarity,
            )
            .await;

        assert_eq!(set.len(), 1);
        assert_eq!(report.forced, 1);
        assert!(report.created.is_empty());
        assert_eq!(set.claims()[0].context_id, "CTX_1");
    }

    #[tokio::test]
    async fn test_proposal_without_known_claims_is_ignored() {
        let (mut set, _) = ContextSet::from_decomposition(
            vec![claim("C1", "Unemployment fell in Spain", "CTX_1")],
            vec![context("CTX_1", "Unemployment fell in Spain")],
            5,
            0.5,
            &LexicalSimilarity,
        )
        .await;

        let report = set
            .apply_proposals(
                vec![ContextProposal {
                    short_name: "Ghost".to_string(),
                    assessed_statement: "Unreferenced frame".to_string(),
                    boundary: ContextBoundary::default(),
                    claim_ids: vec!["C42".to_string()],
                }],
                &LexicalSimilarity,
            )
            .await;

        assert_eq!(report, ReconcileReport::default());
        assert_eq!(set.len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_proposal_leaves_claims_untouched() {
        let (mut set, _) = ContextSet::from_decomposition(
            vec![
                claim("C1", "Unemployment fell in Spain", "CTX_1"),
                claim("C2", "Regional unemployment in Andalusia", "CTX_1"),
            ],
            vec![context("CTX_1", "Unemployment fell in Spain")],
            5,
            0.5,
            &LexicalSimilarity,
        )
        .await;

        let slow = DelayedSimilarity::new(std::time::Duration::from_millis(500));
        let proposal = ContextProposal {
            short_name: "Andalusia".to_string(),
            assessed_statement: "Andalusian regional labour statistics".to_string(),
            boundary: ContextBoundary::default(),
            claim_ids: vec!["C2".to_string()],
        };
        let cancelled = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            set.apply_proposals(vec![proposal], &slow),
        )
        .await;

        assert!(cancelled.is_err());
        assert_eq!(set.len(), 1);
        assert_eq!(set.claims()[1].context_id, "CTX_1");
        assert!(set.orphaned_claims().is_empty());
        assert_claims_valid(&set);
    }

    #[tokio::test]
    async fn test_orphaned_claims_are_reassigned() {
        let (mut set, _) = ContextSet::from_decomposition(
            vec![claim("C1", "Unemployment fell in Spain", "CTX_1")],
            vec![context("CTX_1", "Unemployment fell in Spain")],
            1,
            0.5,
            &LexicalSimilarity,
        )
        .await;
        set.claims[0].context_id = "proposal-9".to_string();
        assert_eq!(set.orphaned_claims().len(), 1);

        let report = set.assign_orphans(&LexicalSimilarity).await;

        assert_eq!(report.reassigned, 1);
        assert_eq!(set.claims()[0].context_id, "CTX_1");
        assert_claims_valid(&set);

        // Nothing left to do: no scorer calls, empty report
        assert_eq!(set.assign_orphans(&LexicalSimilarity).await, ReconcileReport::default());
    }
}
