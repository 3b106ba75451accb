//! Shared LLM client and per-role model selection

use rig::providers::openai;

/// What a model call is used for; each role has its own model override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmRole {
    Relevance,
    Extraction,
    Decomposition,
    Verdict,
}

impl LlmRole {
    /// Environment variable overriding the model for this role
    pub fn env_var(self) -> &'static str {
        match self {
            LlmRole::Relevance => "RELEVANCE_MODEL",
            LlmRole::Extraction => "EVIDENCE_EXTRACTION_MODEL",
            LlmRole::Decomposition => "DECOMPOSITION_MODEL",
            LlmRole::Verdict => "VERDICT_MODEL",
        }
    }

    /// Relevance only sees titles and snippets, so a small model is enough
    pub fn default_model(self) -> &'static str {
        match self {
            LlmRole::Relevance => openai::GPT_4O_MINI,
            LlmRole::Extraction | LlmRole::Decomposition | LlmRole::Verdict => openai::GPT_4O,
        }
    }
}

/// Shared LLM client wrapper
#[derive(Clone)]
pub struct LlmClient {
    client: openai::Client,
}

impl LlmClient {
    /// Create a new LLM client with the provided API key
    pub fn new(api_key: &str) -> Result<Self, String> {
        let client = openai::Client::new(api_key)
            .map_err(|e| format!("Failed to create OpenAI client: {}", e))?;

        Ok(Self { client })
    }

    /// Underlying OpenAI client, for building role-specific extractors and agents
    pub fn openai_client(&self) -> &openai::Client {
        &self.client
    }

    /// Model configured for a role, falling back to the role default
    pub fn model_for(&self, role: LlmRole) -> String {
        resolve_model(role, std::env::var(role.env_var()).ok())
    }
}

fn resolve_model(role: LlmRole, configured: Option<String>) -> String {
    configured
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| role.default_model().to_string())
}
