use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;

/// One raw hit returned by a search provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

/// Relevance label assigned to a search candidate by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceClass {
    PrimarySource,
    SecondaryCommentary,
    Unrelated,
}

/// Acceptance mode for relevance classification
///
/// `Moderate` and `Relaxed` accept the same classes; they differ only in when
/// the controller selects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceMode {
    Strict,
    Moderate,
    Relaxed,
}

impl RelevanceMode {
    /// Classes accepted under this mode
    pub const fn accepted_classes(self) -> &'static [RelevanceClass] {
        match self {
            RelevanceMode::Strict => &[RelevanceClass::PrimarySource],
            RelevanceMode::Moderate | RelevanceMode::Relaxed => &[
                RelevanceClass::PrimarySource,
                RelevanceClass::SecondaryCommentary,
            ],
        }
    }

    pub fn accepts(self, class: RelevanceClass) -> bool {
        self.accepted_classes().contains(&class)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Fetched,
    Failed,
    TimedOut,
}

/// A document fetched during research (exists only within the job)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Source {
    pub id: String,
    pub url: Url,
    pub title: String,
    pub domain: String,
    pub language: Option<String>,
    pub fetch_status: FetchStatus,
    pub relevance: RelevanceClass,
    /// Selected by adaptive fallback after relevance rejection
    pub fallback: bool,
    pub context_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceCategory {
    Study,
    Report,
    Statistic,
    OfficialRecord,
    ExpertOpinion,
    Statement,
    Criticism,
    Other,
}

impl EvidenceCategory {
    /// Documented evidence (study, report, recorded data) as opposed to
    /// opinion or an actor's stated position
    pub fn is_documented(&self) -> bool {
        matches!(
            self,
            EvidenceCategory::Study
                | EvidenceCategory::Report
                | EvidenceCategory::Statistic
                | EvidenceCategory::OfficialRecord
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Specificity {
    High,
    Medium,
    Low,
}

/// Direction of an evidence item relative to the assessed thesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceDirection {
    Supports,
    Contradicts,
    Neutral,
}

// One extracted, source-attributed statement
// - probative_score: usability weight in [0, 1]; 0 means excluded from all weighting
// - from_fallback_source: the source was promoted by adaptive fallback
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EvidenceItem {
    pub id: String,
    pub statement: String,
    pub category: EvidenceCategory,
    pub specificity: Specificity,
    pub source_id: String,
    pub source_url: Url,
    pub context_id: String,
    pub claim_id: Option<String>,
    pub direction: EvidenceDirection,
    pub probative_score: f64,
    pub from_fallback_source: bool,
}

impl EvidenceItem {
    pub fn is_probative(&self) -> bool {
        self.probative_score > 0.0
    }

    /// Documented evidence contradicting the thesis
    pub fn is_documented_counter_evidence(&self) -> bool {
        self.is_probative()
            && self.category.is_documented()
            && self.direction == EvidenceDirection::Contradicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acceptance_table() {
        use RelevanceClass::*;
        use RelevanceMode::*;

        let table = [
            (Strict, PrimarySource, true),
            (Strict, SecondaryCommentary, false),
            (Strict, Unrelated, false),
            (Moderate, PrimarySource, true),
            (Moderate, SecondaryCommentary, true),
            (Moderate, Unrelated, false),
            (Relaxed, PrimarySource, true),
            (Relaxed, SecondaryCommentary, true),
            (Relaxed, Unrelated, false),
        ];

        for (mode, class, expected) in table {
            assert_eq!(mode.accepts(class), expected, "{:?} / {:?}", mode, class);
        }
    }

    #[test]
    fn test_moderate_and_relaxed_accept_identically() {
        assert_eq!(
            RelevanceMode::Moderate.accepted_classes(),
            RelevanceMode::Relaxed.accepted_classes()
        );
    }

    #[test]
    fn test_documented_categories() {
        assert!(EvidenceCategory::Study.is_documented());
        assert!(EvidenceCategory::Statistic.is_documented());
        assert!(!EvidenceCategory::Criticism.is_documented());
        assert!(!EvidenceCategory::Statement.is_documented());
    }
}
