//! External capabilities consumed by the orchestration engine
//!
//! Every collaborator the engine calls out to (search, fetch, classification,
//! extraction, verdict generation, similarity) sits behind one of these traits.
//! The concrete adapters live in `retriever` and the LLM-backed services; tests
//! swap in deterministic fakes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::model::extracted::ExtractedVerdict;
use crate::model::{
    AnalysisContext, Claim, ContextBoundary, EvidenceCategory, EvidenceDirection, EvidenceItem,
    RelevanceClass, RelevanceMode, SearchResult, Specificity,
};
use crate::retriever::RetrieverError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CapabilityError {
    #[error("Capability call failed: {0}")]
    Call(String),

    #[error("Capability call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Capability unavailable: {0}")]
    Unavailable(String),
}

/// Content returned by a successful fetch
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: Url,
    pub title: Option<String>,
    pub content: String,
    pub language: Option<String>,
    /// SHA-256 of the normalized content, used to skip mirrored pages
    pub content_hash: String,
}

/// The claim (within its context) a research iteration is aimed at
#[derive(Debug, Clone)]
pub struct ResearchTarget {
    pub context: AnalysisContext,
    pub claim: Claim,
    /// Looking for evidence against the claim rather than for it
    pub contradiction: bool,
}

/// Context handed to the extractor alongside a fetched page
#[derive(Debug, Clone)]
pub struct ExtractionHints<'a> {
    pub context: &'a AnalysisContext,
    pub claims: &'a [Claim],
    pub contradiction: bool,
}

/// One extracted statement before the controller assigns ids and provenance
#[derive(Debug, Clone)]
pub struct EvidenceDraft {
    pub statement: String,
    pub category: EvidenceCategory,
    pub specificity: Specificity,
    pub direction: EvidenceDirection,
    pub claim_id: Option<String>,
    pub probative_score: f64,
}

/// Request for a new analysis context discovered while extracting
#[derive(Debug, Clone)]
pub struct ContextProposal {
    pub short_name: String,
    pub assessed_statement: String,
    pub boundary: ContextBoundary,
    pub claim_ids: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionOutput {
    pub items: Vec<EvidenceDraft>,
    pub supplemental_contexts: Vec<ContextProposal>,
}

/// One verdict batch as sent to the generation capability
#[derive(Debug, Clone)]
pub struct VerdictRequest<'a> {
    pub context: &'a AnalysisContext,
    pub claims: &'a [Claim],
    pub evidence: &'a [EvidenceItem],
    pub batch_index: usize,
}

/// Parse state of a structured generation call
#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    /// The full output parsed and validated
    Parsed(Vec<ExtractedVerdict>),
    /// Output was truncated or partly malformed; well-formed verdicts were salvaged
    Partial {
        salvaged: Vec<ExtractedVerdict>,
        error: String,
    },
    /// Nothing usable could be recovered
    Unparseable(String),
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        language: Option<&str>,
    ) -> Result<Vec<SearchResult>, CapabilityError>;
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, RetrieverError>;
}

#[async_trait]
pub trait RelevanceClassifier: Send + Sync {
    async fn classify(
        &self,
        candidate: &SearchResult,
        target: &ResearchTarget,
        mode: RelevanceMode,
    ) -> Result<RelevanceClass, CapabilityError>;
}

#[async_trait]
pub trait EvidenceExtractor: Send + Sync {
    async fn extract(
        &self,
        page: &FetchedPage,
        hints: &ExtractionHints<'_>,
    ) -> Result<ExtractionOutput, CapabilityError>;
}

#[async_trait]
pub trait VerdictGenerator: Send + Sync {
    async fn generate(
        &self,
        request: &VerdictRequest<'_>,
    ) -> Result<GenerationOutcome, CapabilityError>;
}

#[async_trait]
pub trait SimilarityScorer: Send + Sync {
    /// Semantic similarity in [0, 1]
    async fn similarity(&self, a: &str, b: &str) -> Result<f64, CapabilityError>;
}

#[async_trait]
pub trait ClaimDecomposer: Send + Sync {
    async fn decompose(
        &self,
        text: &str,
        language: Option<&str>,
    ) -> Result<(Vec<Claim>, Vec<AnalysisContext>), CapabilityError>;
}

/// The set of capabilities one analysis job runs against
#[derive(Clone)]
pub struct Capabilities {
    pub search: Arc<dyn SearchProvider>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub classifier: Arc<dyn RelevanceClassifier>,
    pub extractor: Arc<dyn EvidenceExtractor>,
    pub generator: Arc<dyn VerdictGenerator>,
    pub similarity: Arc<dyn SimilarityScorer>,
}
