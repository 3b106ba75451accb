pub mod aggregation;
pub mod analysis;
pub mod capabilities;
pub mod config_provider;
pub mod correction;
pub mod decomposition;
pub mod evidence_store;
pub mod extraction;
pub mod funnel;
pub mod limits;
pub mod llm;
pub mod reconciler;
pub mod relevance;
pub mod research;
pub mod similarity;
pub mod verdicts;

#[cfg(test)]
pub mod testing;

pub use analysis::{AnalysisError, AnalysisService};
pub use capabilities::Capabilities;
pub use config_provider::{ConfigProvider, FileConfigProvider, StaticConfigProvider};
pub use decomposition::LlmDecomposer;
pub use extraction::LlmEvidenceExtractor;
pub use llm::LlmClient;
pub use relevance::LlmRelevanceClassifier;
pub use similarity::LexicalSimilarity;
pub use verdicts::LlmVerdictGenerator;
