//! Conversions between LLM-extracted types and domain types

use super::analysis::{AnalysisContext, Centrality, Claim, ContextBoundary};
use super::evidence::{EvidenceCategory, EvidenceDirection, RelevanceClass, Specificity};
use super::extracted::{
    ExtractedCategory, ExtractedCentrality, ExtractedContestation, ExtractedDecomposedClaim,
    ExtractedDecomposedContext, ExtractedDirection, ExtractedFrame, ExtractedRelevanceClass,
    ExtractedSpecificity,
};
use super::verdict::ContestationType;

impl From<ExtractedRelevanceClass> for RelevanceClass {
    fn from(class: ExtractedRelevanceClass) -> Self {
        match class {
            ExtractedRelevanceClass::PrimarySource => RelevanceClass::PrimarySource,
            ExtractedRelevanceClass::SecondaryCommentary => RelevanceClass::SecondaryCommentary,
            ExtractedRelevanceClass::Unrelated => RelevanceClass::Unrelated,
        }
    }
}

impl From<ExtractedCategory> for EvidenceCategory {
    fn from(category: ExtractedCategory) -> Self {
        match category {
            ExtractedCategory::Study => EvidenceCategory::Study,
            ExtractedCategory::Report => EvidenceCategory::Report,
            ExtractedCategory::Statistic => EvidenceCategory::Statistic,
            ExtractedCategory::OfficialRecord => EvidenceCategory::OfficialRecord,
            ExtractedCategory::ExpertOpinion => EvidenceCategory::ExpertOpinion,
            ExtractedCategory::Statement => EvidenceCategory::Statement,
            ExtractedCategory::Criticism => EvidenceCategory::Criticism,
            ExtractedCategory::Other => EvidenceCategory::Other,
        }
    }
}

impl From<ExtractedSpecificity> for Specificity {
    fn from(specificity: ExtractedSpecificity) -> Self {
        match specificity {
            ExtractedSpecificity::High => Specificity::High,
            ExtractedSpecificity::Medium => Specificity::Medium,
            ExtractedSpecificity::Low => Specificity::Low,
        }
    }
}

impl From<ExtractedDirection> for EvidenceDirection {
    fn from(direction: ExtractedDirection) -> Self {
        match direction {
            ExtractedDirection::Supports => EvidenceDirection::Supports,
            ExtractedDirection::Contradicts => EvidenceDirection::Contradicts,
            ExtractedDirection::Neutral => EvidenceDirection::Neutral,
        }
    }
}

impl From<ExtractedContestation> for ContestationType {
    fn from(contestation: ExtractedContestation) -> Self {
        match contestation {
            ExtractedContestation::None => ContestationType::None,
            ExtractedContestation::Doubted => ContestationType::Doubted,
            ExtractedContestation::Contested => ContestationType::Contested,
        }
    }
}

impl From<ExtractedCentrality> for Centrality {
    fn from(centrality: ExtractedCentrality) -> Self {
        match centrality {
            ExtractedCentrality::High => Centrality::High,
            ExtractedCentrality::Medium => Centrality::Medium,
            ExtractedCentrality::Low => Centrality::Low,
        }
    }
}

impl From<ExtractedDecomposedContext> for AnalysisContext {
    fn from(context: ExtractedDecomposedContext) -> Self {
        AnalysisContext {
            id: context.id,
            short_name: context.short_name,
            assessed_statement: context.assessed_statement,
            boundary: ContextBoundary {
                jurisdiction: non_empty(context.jurisdiction),
                time_window: non_empty(context.time_window),
                methodology: non_empty(context.methodology),
            },
        }
    }
}

impl From<ExtractedDecomposedClaim> for Claim {
    fn from(claim: ExtractedDecomposedClaim) -> Self {
        Claim {
            id: claim.id,
            text: claim.text,
            context_id: claim.context_id,
            depends_on: claim.depends_on,
            centrality: claim.centrality.into(),
        }
    }
}

impl ExtractedFrame {
    /// Build the proposed context for this frame under a caller-chosen id
    pub fn into_context(self, id: String) -> (AnalysisContext, Vec<String>) {
        let context = AnalysisContext {
            id,
            short_name: self.short_name,
            assessed_statement: self.assessed_statement,
            boundary: ContextBoundary {
                jurisdiction: non_empty(self.jurisdiction),
                time_window: non_empty(self.time_window),
                methodology: non_empty(self.methodology),
            },
        };
        (context, self.claim_ids)
    }
}

/// Treat blank strings from the model as absent
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
