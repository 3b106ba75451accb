use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Truth percentage and confidence assigned to every fallback verdict
pub const FALLBACK_SCORE: u8 = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContestationType {
    #[default]
    None,
    /// Disagreement exists but is rhetorical only
    Doubted,
    /// Disagreement backed by documented counter-evidence
    Contested,
}

/// Change applied to a verdict after generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerdictCorrection {
    DirectionInverted { from: u8, to: u8 },
    ContestationDowngraded { to: ContestationType },
    CounterEvidencePruned { removed: Vec<String> },
}

// Per-claim verdict
// - fallback: generation failed and the verdict is a neutral placeholder
// - corrections: audit trail of post-generation corrections
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClaimVerdict {
    pub claim_id: String,
    pub context_id: String,
    pub truth_percentage: u8,
    pub confidence: u8,
    pub reasoning: String,
    pub supporting_evidence_ids: Vec<String>,
    pub contradicting_evidence_ids: Vec<String>,
    pub contestation: ContestationType,
    pub counter_evidence_ids: Vec<String>,
    pub fallback: bool,
    #[serde(default)]
    pub corrections: Vec<VerdictCorrection>,
}

impl ClaimVerdict {
    /// Neutral placeholder for a claim that could not be evaluated
    pub fn fallback(claim_id: &str, context_id: &str, reason: &str) -> Self {
        Self {
            claim_id: claim_id.to_string(),
            context_id: context_id.to_string(),
            truth_percentage: FALLBACK_SCORE,
            confidence: FALLBACK_SCORE,
            reasoning: format!("Verdict could not be generated: {}", reason),
            supporting_evidence_ids: Vec::new(),
            contradicting_evidence_ids: Vec::new(),
            contestation: ContestationType::None,
            counter_evidence_ids: Vec::new(),
            fallback: true,
            corrections: Vec::new(),
        }
    }
}

/// Roll-up of one context's verdicts
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContextVerdict {
    pub context_id: String,
    pub truth_percentage: u8,
    pub confidence: u8,
    pub verdict_count: usize,
    pub fallback_count: usize,
}

/// Article-level aggregation of frozen claim verdicts
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ArticleVerdict {
    pub truth_percentage: u8,
    pub confidence: u8,
    pub claim_count: usize,
    pub fallback_count: usize,
    pub contexts: Vec<ContextVerdict>,
}
