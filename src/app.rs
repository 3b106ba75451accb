//! Application state and service initialization
//!
//! Builds the capability adapters and the analysis service from configuration
//! so handlers only ever see the finished dependency graph.

use std::sync::Arc;

use crate::model::Config;
use crate::model::config::ConfigError;
use crate::retriever::{RetrieverDispatcher, SearxSearchProvider};
use crate::service::{
    AnalysisService, Capabilities, ConfigProvider, FileConfigProvider, LexicalSimilarity,
    LlmClient, LlmDecomposer, LlmEvidenceExtractor, LlmRelevanceClassifier, LlmVerdictGenerator,
};

pub struct AppState {
    /// Source of the engine configuration for each new job
    pub config_provider: Arc<dyn ConfigProvider>,
    pub analysis_service: Arc<AnalysisService>,
}

impl AppState {
    /// Initialize all services and build application state
    ///
    /// Fails when the engine configuration is invalid or OPENAI_API_KEY is
    /// missing, since no job could run.
    pub fn new(config: Config) -> Result<Self, AppError> {
        config.engine.validate()?;

        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AppError::MissingConfig("OPENAI_API_KEY"))?;
        let llm_client = LlmClient::new(&api_key)
            .map_err(|_| AppError::InvalidConfig("Invalid OPENAI_API_KEY"))?;

        let config_provider: Arc<dyn ConfigProvider> = Arc::new(FileConfigProvider::new(
            config.config_path.clone(),
            config.engine.clone(),
        ));

        let capabilities = Self::build_capabilities(&config, &llm_client);
        let analysis_service = AnalysisService::new(Arc::clone(&config_provider), capabilities)
            .with_decomposer(Arc::new(LlmDecomposer::new(llm_client)));

        Ok(Self {
            config_provider,
            analysis_service: Arc::new(analysis_service),
        })
    }

    /// Wire the production adapter for every capability
    fn build_capabilities(config: &Config, llm_client: &LlmClient) -> Capabilities {
        Capabilities {
            search: Arc::new(SearxSearchProvider::new(config.search.clone())),
            fetcher: Arc::new(RetrieverDispatcher::new(config.retrievers.clone())),
            classifier: Arc::new(LlmRelevanceClassifier::new(llm_client.clone())),
            extractor: Arc::new(LlmEvidenceExtractor::new(llm_client.clone())),
            generator: Arc::new(LlmVerdictGenerator::new(llm_client.clone())),
            similarity: Arc::new(LexicalSimilarity::new()),
        }
    }
}

/// Application-level errors
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AppError {
    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingConfig(&'static str),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error(transparent)]
    Engine(#[from] ConfigError),
}
