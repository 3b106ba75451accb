//! Deterministic in-memory capabilities for tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::model::{
    AnalysisContext, Centrality, Claim, ContextBoundary, EvidenceCategory, EvidenceDirection,
    EvidenceItem, RelevanceClass, RelevanceMode, SearchResult, Specificity,
};
use crate::retriever::RetrieverError;
use crate::service::capabilities::{
    Capabilities, CapabilityError, EvidenceDraft, EvidenceExtractor, ExtractionHints,
    ExtractionOutput, FetchedPage, GenerationOutcome, PageFetcher, RelevanceClassifier,
    ResearchTarget, SearchProvider, SimilarityScorer, VerdictGenerator, VerdictRequest,
};
use crate::service::funnel::normalize_url;
use crate::service::similarity::LexicalSimilarity;

pub fn claim(id: &str, text: &str, context_id: &str, centrality: Centrality) -> Claim {
    Claim {
        id: id.to_string(),
        text: text.to_string(),
        context_id: context_id.to_string(),
        depends_on: Vec::new(),
        centrality,
    }
}

pub fn context(id: &str, statement: &str) -> AnalysisContext {
    AnalysisContext {
        id: id.to_string(),
        short_name: id.to_lowercase(),
        assessed_statement: statement.to_string(),
        boundary: ContextBoundary::default(),
    }
}

pub fn research_target() -> ResearchTarget {
    ResearchTarget {
        context: context("CTX_1", "Coffee consumption trends in Europe"),
        claim: claim(
            "C1",
            "Coffee consumption in Europe rose in 2021",
            "CTX_1",
            Centrality::High,
        ),
        contradiction: false,
    }
}

/// Classifier keyed by result domain
pub struct FakeClassifier {
    by_domain: HashMap<String, RelevanceClass>,
    default: RelevanceClass,
    fail: bool,
    pub calls: AtomicUsize,
}

impl FakeClassifier {
    pub fn accepting_all() -> Self {
        Self {
            by_domain: HashMap::new(),
            default: RelevanceClass::PrimarySource,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Listed domains get their class, everything else is unrelated
    pub fn by_domain(classes: &[(&str, RelevanceClass)]) -> Self {
        Self {
            by_domain: classes
                .iter()
                .map(|(d, c)| (d.to_string(), *c))
                .collect(),
            default: RelevanceClass::Unrelated,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::accepting_all()
        }
    }
}

#[async_trait]
impl RelevanceClassifier for FakeClassifier {
    async fn classify(
        &self,
        candidate: &SearchResult,
        _target: &ResearchTarget,
        _mode: RelevanceMode,
    ) -> Result<RelevanceClass, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CapabilityError::Call("classifier offline".to_string()));
        }
        let domain = normalize_url(&candidate.url)
            .map(|n| n.domain)
            .unwrap_or_default();
        Ok(self.by_domain.get(&domain).copied().unwrap_or(self.default))
    }
}

/// Search returning `per_query` fresh results for every call
pub struct FakeSearch {
    per_query: usize,
    empty: bool,
    pub calls: AtomicUsize,
    pub queries: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeSearch {
    pub fn new(per_query: usize) -> Self {
        Self {
            per_query,
            empty: false,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self {
            empty: true,
            ..Self::new(0)
        }
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    async fn search(
        &self,
        query: &str,
        language: Option<&str>,
    ) -> Result<Vec<SearchResult>, CapabilityError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut queries) = self.queries.lock() {
            queries.push((query.to_string(), language.map(String::from)));
        }
        if self.empty {
            return Ok(Vec::new());
        }

        Ok((0..self.per_query)
            .map(|i| SearchResult {
                url: format!("https://source{}.example/doc/{}/{}", i, call, i),
                title: format!("Document {} of call {}", i, call),
                snippet: query.to_string(),
            })
            .collect())
    }
}

/// Fetcher serving a fixed body for every URL, with optional failures
pub struct FakeFetcher {
    failing_hosts: HashSet<String>,
    slow_hosts: HashSet<String>,
    transient_failures: AtomicUsize,
    pub calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self {
            failing_hosts: HashSet::new(),
            slow_hosts: HashSet::new(),
            transient_failures: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_for(hosts: &[&str]) -> Self {
        Self {
            failing_hosts: hosts.iter().map(|h| h.to_string()).collect(),
            ..Self::new()
        }
    }

    /// Requests to these hosts take longer than any test fetch timeout
    pub fn hanging_for(hosts: &[&str]) -> Self {
        Self {
            slow_hosts: hosts.iter().map(|h| h.to_string()).collect(),
            ..Self::new()
        }
    }

    /// The first `n` calls fail with a transient error
    pub fn flaky(n: usize) -> Self {
        Self {
            transient_failures: AtomicUsize::new(n),
            ..Self::new()
        }
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, RetrieverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let host = url.host_str().unwrap_or_default().to_string();
        if self.failing_hosts.contains(&host) {
            return Err(RetrieverError::NotFound(url.to_string()));
        }
        if self.slow_hosts.contains(&host) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(RetrieverError::RateLimited);
        }

        let content = format!("Body of {}: the figures rose by 4 percent.", url);
        Ok(FetchedPage {
            url: url.clone(),
            title: Some(format!("Page {}", url.path())),
            content_hash: crate::retriever::content_hash(&content),
            content,
            language: Some("en".to_string()),
        })
    }
}

/// Extractor producing `per_page` items linked to the first target claim
pub struct FakeExtractor {
    per_page: usize,
    probative: f64,
    proposals: Mutex<Vec<crate::service::capabilities::ContextProposal>>,
    pub calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn new(per_page: usize) -> Self {
        Self {
            per_page,
            probative: 0.8,
            proposals: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Items carry probative score 0, as ungrounded statements do
    pub fn ungrounded(per_page: usize) -> Self {
        Self {
            probative: 0.0,
            ..Self::new(per_page)
        }
    }

    /// Emit these proposals once, on the first extraction call
    pub fn with_proposals(
        per_page: usize,
        proposals: Vec<crate::service::capabilities::ContextProposal>,
    ) -> Self {
        Self {
            proposals: Mutex::new(proposals),
            ..Self::new(per_page)
        }
    }
}

#[async_trait]
impl EvidenceExtractor for FakeExtractor {
    async fn extract(
        &self,
        page: &FetchedPage,
        hints: &ExtractionHints<'_>,
    ) -> Result<ExtractionOutput, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let direction = if hints.contradiction {
            EvidenceDirection::Contradicts
        } else {
            EvidenceDirection::Supports
        };

        let items = (0..self.per_page)
            .map(|i| EvidenceDraft {
                statement: format!("Finding {} from {}", i, page.url),
                category: EvidenceCategory::Report,
                specificity: Specificity::Medium,
                direction,
                claim_id: hints.claims.first().map(|c| c.id.clone()),
                probative_score: self.probative,
            })
            .collect();

        let supplemental_contexts = self
            .proposals
            .lock()
            .map(|mut p| std::mem::take(&mut *p))
            .unwrap_or_default();

        Ok(ExtractionOutput {
            items,
            supplemental_contexts,
        })
    }
}

/// Lexical similarity answered after a fixed delay
pub struct DelayedSimilarity {
    delay: Duration,
}

impl DelayedSimilarity {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl SimilarityScorer for DelayedSimilarity {
    async fn similarity(&self, a: &str, b: &str) -> Result<f64, CapabilityError> {
        tokio::time::sleep(self.delay).await;
        Ok(LexicalSimilarity::score(a, b))
    }
}

type GenerateFn =
    dyn Fn(&VerdictRequest<'_>, usize) -> Result<GenerationOutcome, CapabilityError> + Send + Sync;

/// Generator driven by a closure of (request, call number)
pub struct ScriptedGenerator {
    script: Box<GenerateFn>,
    pub calls: AtomicUsize,
    pub batch_sizes: Mutex<Vec<usize>>,
}

impl ScriptedGenerator {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&VerdictRequest<'_>, usize) -> Result<GenerationOutcome, CapabilityError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
        }
    }

    /// Every claim gets the same verdict, citing every offered evidence item
    pub fn uniform(truth: f64) -> Self {
        Self::new(move |request, _| {
            Ok(GenerationOutcome::Parsed(
                request
                    .claims
                    .iter()
                    .map(|c| extracted_verdict(&c.id, truth, request))
                    .collect(),
            ))
        })
    }
}

pub fn extracted_verdict(
    claim_id: &str,
    truth: f64,
    request: &VerdictRequest<'_>,
) -> crate::model::extracted::ExtractedVerdict {
    crate::model::extracted::ExtractedVerdict {
        claim_id: claim_id.to_string(),
        truth_percentage: truth,
        confidence: 80.0,
        reasoning: "The evidence supports the claim.".to_string(),
        supporting_evidence_ids: request.evidence.iter().map(|e| e.id.clone()).collect(),
        contradicting_evidence_ids: Vec::new(),
        contestation: Default::default(),
        counter_evidence_ids: Vec::new(),
    }
}

#[async_trait]
impl VerdictGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        request: &VerdictRequest<'_>,
    ) -> Result<GenerationOutcome, CapabilityError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut sizes) = self.batch_sizes.lock() {
            sizes.push(request.claims.len());
        }
        (self.script)(request, call)
    }
}

/// Capabilities wired to well-behaved fakes
pub fn capabilities(search: FakeSearch, extractor: FakeExtractor) -> Capabilities {
    Capabilities {
        search: Arc::new(search),
        fetcher: Arc::new(FakeFetcher::new()),
        classifier: Arc::new(FakeClassifier::accepting_all()),
        extractor: Arc::new(extractor),
        generator: Arc::new(ScriptedGenerator::uniform(80.0)),
        similarity: Arc::new(LexicalSimilarity::new()),
    }
}

pub fn evidence_item(id: &str, context_id: &str, claim_id: Option<&str>, probative: f64) -> EvidenceItem {
    EvidenceItem {
        id: id.to_string(),
        statement: format!("Statement {}", id),
        category: EvidenceCategory::Study,
        specificity: Specificity::High,
        source_id: "S1".to_string(),
        source_url: Url::parse("https://stats.example/report").expect("valid url"),
        context_id: context_id.to_string(),
        claim_id: claim_id.map(String::from),
        direction: EvidenceDirection::Supports,
        probative_score: probative,
        from_fallback_source: false,
    }
}
