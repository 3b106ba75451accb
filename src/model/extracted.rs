//! LLM-extractable models for relevance, evidence, decomposition and verdicts

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Relevance classification of one search candidate
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedRelevance {
    pub classification: ExtractedRelevanceClass,
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExtractedRelevanceClass {
    PrimarySource,
    SecondaryCommentary,
    Unrelated,
}

/// Evidence extracted from one fetched source
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedEvidence {
    pub items: Vec<ExtractedEvidenceItem>,
    /// Frames the source shows to be analytically distinct from the current context
    #[serde(default)]
    pub distinct_frames: Vec<ExtractedFrame>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedEvidenceItem {
    /// Verbatim or near-verbatim statement from the source
    pub statement: String,
    pub category: ExtractedCategory,
    pub specificity: ExtractedSpecificity,
    pub direction: ExtractedDirection,
    /// Id of the claim this statement bears on, if any
    pub claim_id: Option<String>,
    /// Usability for reasoning, 0.0 to 1.0
    pub probative_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExtractedCategory {
    Study,
    Report,
    Statistic,
    OfficialRecord,
    ExpertOpinion,
    Statement,
    Criticism,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExtractedSpecificity {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExtractedDirection {
    Supports,
    Contradicts,
    Neutral,
}

/// A supplemental analysis frame requested during extraction
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedFrame {
    pub short_name: String,
    pub assessed_statement: String,
    pub jurisdiction: Option<String>,
    pub time_window: Option<String>,
    pub methodology: Option<String>,
    /// Claims that belong to the new frame instead of the current context
    pub claim_ids: Vec<String>,
}

/// Decomposition of free text into claims and contexts
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedDecomposition {
    pub contexts: Vec<ExtractedDecomposedContext>,
    pub claims: Vec<ExtractedDecomposedClaim>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedDecomposedContext {
    pub id: String,
    pub short_name: String,
    pub assessed_statement: String,
    pub jurisdiction: Option<String>,
    pub time_window: Option<String>,
    pub methodology: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedDecomposedClaim {
    pub id: String,
    pub text: String,
    pub context_id: String,
    pub depends_on: Vec<String>,
    pub centrality: ExtractedCentrality,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExtractedCentrality {
    High,
    Medium,
    Low,
}

/// Verdict generation output for one batch
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedVerdicts {
    pub verdicts: Vec<ExtractedVerdict>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedVerdict {
    pub claim_id: String,
    pub truth_percentage: f64,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub supporting_evidence_ids: Vec<String>,
    #[serde(default)]
    pub contradicting_evidence_ids: Vec<String>,
    #[serde(default)]
    pub contestation: ExtractedContestation,
    #[serde(default)]
    pub counter_evidence_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExtractedContestation {
    #[default]
    None,
    Doubted,
    Contested,
}
