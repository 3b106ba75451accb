use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use super::evidence::{EvidenceItem, Source};
use super::verdict::{ArticleVerdict, ClaimVerdict};

/// How central a claim is to the submitted input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Centrality {
    High,
    Medium,
    Low,
}

impl Centrality {
    /// Aggregation weight (higher = more influence on the article verdict)
    pub fn weight(&self) -> f64 {
        match self {
            Centrality::High => 3.0,
            Centrality::Medium => 2.0,
            Centrality::Low => 1.0,
        }
    }
}

// A verifiable proposition extracted from the input
// - context_id: owning analysis context, rewritten only by the reconciler
// - depends_on: claims that must hold for this one to be meaningful
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Claim {
    pub id: String,
    pub text: String,
    pub context_id: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub centrality: Centrality,
}

impl Claim {
    pub fn is_central(&self) -> bool {
        matches!(self.centrality, Centrality::High)
    }
}

/// Boundary metadata separating one analytical frame from another
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ContextBoundary {
    pub jurisdiction: Option<String>,
    pub time_window: Option<String>,
    pub methodology: Option<String>,
}

impl ContextBoundary {
    pub fn is_empty(&self) -> bool {
        self.jurisdiction.is_none() && self.time_window.is_none() && self.methodology.is_none()
    }
}

/// A bounded analytical frame requiring independent research and its own verdicts
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalysisContext {
    pub id: String,
    pub short_name: String,
    pub assessed_statement: String,
    #[serde(default)]
    pub boundary: ContextBoundary,
}

impl fmt::Display for AnalysisContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.short_name, self.id)
    }
}

/// Research depth selected for a job; controls the per-context evidence minimum
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResearchDepth {
    #[default]
    Quick,
    Deep,
}

/// Input to a single analysis job (claims and contexts come from upstream decomposition)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalysisInput {
    pub input_text: String,
    /// Language tag of the input (e.g. "en", "de")
    pub language: Option<String>,
    #[serde(default)]
    pub depth: ResearchDepth,
    pub claims: Vec<Claim>,
    pub contexts: Vec<AnalysisContext>,
}

/// Why a context's research sub-loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DoneReason {
    /// Evidence minimum met, central claims covered and opposing evidence sought
    Sufficient,
    /// Global iteration pool exhausted
    BudgetExhausted,
    /// Per-context iteration cap reached
    ContextBudgetExhausted,
    /// Consecutive iterations produced no new evidence
    CircuitBreaker,
    /// Job deadline expired
    Deadline,
    /// Every claim of the context was moved elsewhere (or it never had any)
    NoClaims,
}

/// Per-context research outcome, reported so degradation stays visible
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContextResearchReport {
    pub context_id: String,
    pub iterations: usize,
    pub evidence_count: usize,
    pub contradiction_search_done: bool,
    pub exhausted: bool,
    pub done_reason: DoneReason,
}

/// Research phase summary for a job
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResearchSummary {
    pub iterations_used: usize,
    pub deadline_reached: bool,
    pub contexts: Vec<ContextResearchReport>,
}

/// Complete output of an analysis job
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalysisResult {
    pub job_id: String,
    pub claims: Vec<Claim>,
    pub contexts: Vec<AnalysisContext>,
    pub sources: Vec<Source>,
    pub evidence: Vec<EvidenceItem>,
    pub claim_verdicts: Vec<ClaimVerdict>,
    pub article_verdict: ArticleVerdict,
    pub research: ResearchSummary,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}
