//! Job-scoped evidence store and source ledger
//!
//! Both are shared by reference across a job's concurrent context sub-loops.
//! Locks are never held across an await point.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use url::Url;

use crate::model::{Claim, EvidenceItem, FetchStatus, RelevanceClass, Source};
use crate::service::capabilities::EvidenceDraft;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Append-only collection of evidence items for one job
#[derive(Debug, Default)]
pub struct EvidenceStore {
    items: Mutex<Vec<EvidenceItem>>,
}

impl EvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append drafts extracted from one source, returning how many of the
    /// stored items are probative
    ///
    /// Every draft is stored for the audit trail. Evidence from
    /// fallback-promoted sources is down-weighted by `fallback_weight`. Draft
    /// claim ids outside `known_claims` are dropped.
    pub fn append(
        &self,
        source: &Source,
        drafts: Vec<EvidenceDraft>,
        known_claims: &HashSet<String>,
        fallback_weight: f64,
    ) -> usize {
        if drafts.is_empty() {
            return 0;
        }

        let mut items = lock(&self.items);
        let mut probative_added = 0;

        for draft in drafts {
            let mut probative = draft.probative_score.clamp(0.0, 1.0);
            if source.fallback {
                probative *= fallback_weight;
            }

            if probative > 0.0 {
                probative_added += 1;
            }
            let id = format!("E{}", items.len() + 1);
            items.push(EvidenceItem {
                id,
                statement: draft.statement,
                category: draft.category,
                specificity: draft.specificity,
                source_id: source.id.clone(),
                source_url: source.url.clone(),
                context_id: source.context_id.clone(),
                claim_id: draft.claim_id.filter(|c| known_claims.contains(c)),
                direction: draft.direction,
                probative_score: probative,
                from_fallback_source: source.fallback,
            });
        }

        probative_added
    }

    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Probative evidence bearing on a context: recorded under it or linked to
    /// one of its claims
    pub fn count_for(&self, context_id: &str, claims: &[Claim]) -> usize {
        lock(&self.items)
            .iter()
            .filter(|e| e.is_probative())
            .filter(|e| {
                e.context_id == context_id
                    || e.claim_id
                        .as_ref()
                        .is_some_and(|id| claims.iter().any(|c| &c.id == id))
            })
            .count()
    }

    /// Claim ids that have at least one linked probative evidence item
    pub fn claims_with_evidence(&self) -> HashSet<String> {
        lock(&self.items)
            .iter()
            .filter(|e| e.is_probative())
            .filter_map(|e| e.claim_id.clone())
            .collect()
    }

    /// Copy of every item in insertion order
    pub fn snapshot(&self) -> Vec<EvidenceItem> {
        lock(&self.items).clone()
    }

    pub fn into_items(self) -> Vec<EvidenceItem> {
        self.items.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    seen: HashSet<String>,
    fetched: HashSet<String>,
    content_hashes: HashSet<String>,
    sources: Vec<Source>,
}

/// Record of URLs the job has seen and fetched, plus every fetched source
#[derive(Debug, Default)]
pub struct SourceLedger {
    state: Mutex<LedgerState>,
}

/// Details of a fetch attempt recorded into the ledger
#[derive(Debug, Clone)]
pub struct SourceRecord {
    pub url: Url,
    pub title: String,
    pub domain: String,
    pub language: Option<String>,
    pub fetch_status: FetchStatus,
    pub relevance: RelevanceClass,
    pub fallback: bool,
    pub context_id: String,
}

impl SourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalized URLs already returned by any search of this job
    pub fn seen(&self) -> HashSet<String> {
        lock(&self.state).seen.clone()
    }

    /// Normalized URLs already fetched (or being fetched) by this job
    pub fn fetched(&self) -> HashSet<String> {
        lock(&self.state).fetched.clone()
    }

    pub fn mark_seen<I>(&self, urls: I)
    where
        I: IntoIterator<Item = String>,
    {
        lock(&self.state).seen.extend(urls);
    }

    /// Claim a URL for fetching; false if another sub-loop already claimed it
    pub fn try_reserve_fetch(&self, normalized: &str) -> bool {
        lock(&self.state).fetched.insert(normalized.to_string())
    }

    /// Record fetched content; false if identical content was already fetched
    pub fn try_record_content(&self, content_hash: &str) -> bool {
        lock(&self.state)
            .content_hashes
            .insert(content_hash.to_string())
    }

    /// Store a fetch attempt and return the assigned source
    pub fn record(&self, record: SourceRecord) -> Source {
        let mut state = lock(&self.state);
        let source = Source {
            id: format!("S{}", state.sources.len() + 1),
            url: record.url,
            title: record.title,
            domain: record.domain,
            language: record.language,
            fetch_status: record.fetch_status,
            relevance: record.relevance,
            fallback: record.fallback,
            context_id: record.context_id,
        };
        state.sources.push(source.clone());
        source
    }

    pub fn into_sources(self) -> Vec<Source> {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EvidenceCategory, EvidenceDirection, Specificity};

    fn source(fallback: bool) -> Source {
        Source {
            id: "S1".to_string(),
            url: Url::parse("https://example.org/report").unwrap(),
            title: "Report".to_string(),
            domain: "example.org".to_string(),
            language: Some("en".to_string()),
            fetch_status: FetchStatus::Fetched,
            relevance: RelevanceClass::PrimarySource,
            fallback,
            context_id: "CTX_1".to_string(),
        }
    }

    fn draft(claim_id: Option<&str>, probative: f64) -> EvidenceDraft {
        EvidenceDraft {
            statement: "Emissions fell by 12 percent in 2022".to_string(),
            category: EvidenceCategory::Statistic,
            specificity: Specificity::High,
            direction: EvidenceDirection::Supports,
            claim_id: claim_id.map(String::from),
            probative_score: probative,
        }
    }

    #[test]
    fn test_append_assigns_sequential_ids() {
        let store = EvidenceStore::new();
        let claims: HashSet<String> = ["C1".to_string()].into();

        let added = store.append(
            &source(false),
            vec![draft(Some("C1"), 0.8), draft(None, 0.6)],
            &claims,
            0.5,
        );
        assert_eq!(added, 2);

        let items = store.snapshot();
        assert_eq!(items[0].id, "E1");
        assert_eq!(items[1].id, "E2");
        assert_eq!(items[0].context_id, "CTX_1");
        assert_eq!(store.count_for("CTX_1", &[]), 2);
        assert_eq!(store.count_for("CTX_2", &[]), 0);
        assert!(store.claims_with_evidence().contains("C1"));
    }

    #[test]
    fn test_fallback_source_evidence_is_down_weighted() {
        let store = EvidenceStore::new();
        store.append(&source(true), vec![draft(None, 0.8)], &HashSet::new(), 0.5);

        let item = &store.snapshot()[0];
        assert!(item.from_fallback_source);
        assert!((item.probative_score - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_claim_links_are_dropped() {
        let store = EvidenceStore::new();
        store.append(
            &source(false),
            vec![draft(Some("C99"), 0.8)],
            &HashSet::new(),
            0.5,
        );
        assert!(store.snapshot()[0].claim_id.is_none());
    }

    #[test]
    fn test_fetch_reservation_is_exclusive() {
        let ledger = SourceLedger::new();
        assert!(ledger.try_reserve_fetch("example.org/a"));
        assert!(!ledger.try_reserve_fetch("example.org/a"));
        assert!(ledger.fetched().contains("example.org/a"));
    }

    #[test]
    fn test_mirrored_content_is_detected() {
        let ledger = SourceLedger::new();
        assert!(ledger.try_record_content("abc"));
        assert!(!ledger.try_record_content("abc"));
    }

    #[test]
    fn test_evidence_follows_moved_claims() {
        use crate::model::Centrality;

        let store = EvidenceStore::new();
        let claims: HashSet<String> = ["C1".to_string()].into();
        store.append(&source(false), vec![draft(Some("C1"), 0.8)], &claims, 0.5);

        let moved = Claim {
            id: "C1".to_string(),
            text: "Emissions fell".to_string(),
            context_id: "CTX_2".to_string(),
            depends_on: Vec::new(),
            centrality: Centrality::High,
        };
        assert_eq!(store.count_for("CTX_2", &[moved]), 1);
    }

    #[test]
    fn test_zero_probative_items_are_stored_but_not_counted() {
        let store = EvidenceStore::new();
        let claims: HashSet<String> = ["C1".to_string()].into();

        let added = store.append(
            &source(false),
            vec![draft(Some("C1"), 0.0), draft(Some("C1"), 0.0), draft(None, 0.7)],
            &claims,
            0.5,
        );

        assert_eq!(added, 1);
        assert_eq!(store.len(), 3);
        assert_eq!(store.count_for("CTX_1", &[]), 1);
        assert!(!store.claims_with_evidence().contains("C1"));
    }
}
