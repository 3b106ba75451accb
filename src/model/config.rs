use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use url::Url;

const ENV_CONFIG_PATH: &str = "VERDICT_ENGINE_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

const ENV_SEARCH_ENDPOINT: &str = "SEARCH_ENDPOINT";
const ENV_SEARCH_API_KEY: &str = "SEARCH_API_KEY";
const DEFAULT_SEARCH_ENDPOINT: &str = "http://127.0.0.1:8888/search";

/// Low-value platforms excluded before relevance classification
const DEFAULT_DENIED_DOMAINS: &[&str] = &[
    "blogspot.com",
    "wordpress.com",
    "medium.com",
    "substack.com",
    "tumblr.com",
    "reddit.com",
    "quora.com",
    "pinterest.com",
    "facebook.com",
    "tiktok.com",
];

/// Terms marking a claim as carrying institutional or legal context
const DEFAULT_INSTITUTIONAL_MARKERS: &[&str] = &[
    "court",
    "ruling",
    "judge",
    "verdict",
    "statute",
    "law",
    "legal",
    "legislation",
    "regulation",
    "constitution",
    "parliament",
    "congress",
    "ministry",
    "agency",
    "government",
    "official",
    "election",
];

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid engine configuration: {0}")]
    Invalid(String),
}

/// Retriever filtering configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetrieverConfig {
    /// Allowed domains (whitelist). If empty, all domains are allowed.
    #[serde(default)]
    pub allow: Vec<String>,
    /// Denied domains (blacklist). Applied after allow list.
    #[serde(default)]
    pub deny: Vec<String>,
}

impl RetrieverConfig {
    /// Check if a URL is allowed based on the allow/deny lists
    pub fn is_url_allowed(&self, url: &Url) -> bool {
        let host = match url.host_str() {
            Some(h) => h.to_lowercase(),
            None => return false,
        };

        if self.deny.iter().any(|d| host_matches(&host, d)) {
            return false;
        }

        if self.allow.is_empty() {
            return true;
        }

        self.allow.iter().any(|a| host_matches(&host, a))
    }
}

/// Search provider endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_search_results")]
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            api_key: None,
            max_results: default_search_results(),
        }
    }
}

fn default_search_endpoint() -> String {
    DEFAULT_SEARCH_ENDPOINT.to_string()
}

fn default_search_results() -> usize {
    20
}

/// Per-language domain overrides for the funnel's pre-filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LanguageOverride {
    /// Domains re-allowed for this language even if denied globally
    #[serde(default)]
    pub allow: Vec<String>,
    /// Domains denied only for this language
    #[serde(default)]
    pub deny: Vec<String>,
}

/// Domain pre-filter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SourceFilterConfig {
    #[serde(default = "default_denied_domains")]
    pub deny: Vec<String>,
    #[serde(default)]
    pub language_overrides: HashMap<String, LanguageOverride>,
}

impl Default for SourceFilterConfig {
    fn default() -> Self {
        Self {
            deny: default_denied_domains(),
            language_overrides: HashMap::new(),
        }
    }
}

fn default_denied_domains() -> Vec<String> {
    DEFAULT_DENIED_DOMAINS.iter().map(|d| d.to_string()).collect()
}

impl SourceFilterConfig {
    /// Check whether a host passes the pre-filter for the given language
    pub fn is_domain_allowed(&self, host: &str, language: Option<&str>) -> bool {
        let host = host.to_lowercase();
        let language_override = language
            .map(|l| l.to_lowercase())
            .and_then(|l| self.language_overrides.get(&l));

        if let Some(lo) = language_override {
            if lo.deny.iter().any(|d| host_matches(&host, d)) {
                return false;
            }
            if lo.allow.iter().any(|a| host_matches(&host, a)) {
                return true;
            }
        }

        !self.deny.iter().any(|d| host_matches(&host, d))
    }
}

/// Relevance mode selection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelevanceConfig {
    #[serde(default = "default_institutional_markers")]
    pub institutional_markers: Vec<String>,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            institutional_markers: default_institutional_markers(),
        }
    }
}

fn default_institutional_markers() -> Vec<String> {
    DEFAULT_INSTITUTIONAL_MARKERS
        .iter()
        .map(|m| m.to_string())
        .collect()
}

/// Thresholds for the directionality correction pass
///
/// High scores are corrected on any net negating reasoning; low scores only
/// when extreme and backed by several distinct affirming signals.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectionalityConfig {
    #[serde(default = "default_high_score_threshold")]
    pub high_score_threshold: u8,
    #[serde(default = "default_low_score_threshold")]
    pub low_score_threshold: u8,
    #[serde(default = "default_min_affirming_signals")]
    pub min_affirming_signals: usize,
}

impl Default for DirectionalityConfig {
    fn default() -> Self {
        Self {
            high_score_threshold: default_high_score_threshold(),
            low_score_threshold: default_low_score_threshold(),
            min_affirming_signals: default_min_affirming_signals(),
        }
    }
}

fn default_high_score_threshold() -> u8 {
    70
}

fn default_low_score_threshold() -> u8 {
    15
}

fn default_min_affirming_signals() -> usize {
    2
}

/// Engine tuning read at the start of every job
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_contexts: usize,
    pub max_sources_per_iteration: usize,
    pub max_sources_per_domain: usize,
    pub adaptive_min_candidates: usize,
    pub max_batch_size: usize,
    /// Iteration slots reserved per context for the contradiction search
    pub reserved_contradiction_slots: usize,
    pub max_total_iterations: usize,
    pub max_iterations_per_context: usize,
    pub min_evidence_quick: usize,
    pub min_evidence_deep: usize,
    pub circuit_breaker_empty_iterations: usize,
    pub context_similarity_threshold: f64,
    pub fetch_concurrency: usize,
    pub max_concurrent_calls: usize,
    pub fetch_timeout_secs: u64,
    pub call_timeout_secs: u64,
    pub job_deadline_secs: u64,
    pub fetch_retries: usize,
    pub generation_retries: usize,
    /// Probative multiplier applied to evidence from fallback-promoted sources
    pub fallback_probative_weight: f64,
    /// Language of the supplemental query issued alongside the original one
    pub supplemental_language: Option<String>,
    pub source_filter: SourceFilterConfig,
    pub relevance: RelevanceConfig,
    pub directionality: DirectionalityConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_contexts: 5,
            max_sources_per_iteration: 8,
            max_sources_per_domain: 2,
            adaptive_min_candidates: 3,
            max_batch_size: 5,
            reserved_contradiction_slots: 1,
            max_total_iterations: 16,
            max_iterations_per_context: 5,
            min_evidence_quick: 4,
            min_evidence_deep: 8,
            circuit_breaker_empty_iterations: 2,
            context_similarity_threshold: 0.5,
            fetch_concurrency: 4,
            max_concurrent_calls: 8,
            fetch_timeout_secs: 20,
            call_timeout_secs: 90,
            job_deadline_secs: 600,
            fetch_retries: 1,
            generation_retries: 1,
            fallback_probative_weight: 0.5,
            supplemental_language: None,
            source_filter: SourceFilterConfig::default(),
            relevance: RelevanceConfig::default(),
            directionality: DirectionalityConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.max_contexts == 0 {
            problems.push("max_contexts must be at least 1".to_string());
        }
        if self.max_batch_size == 0 {
            problems.push("max_batch_size must be at least 1".to_string());
        }
        if self.max_sources_per_iteration == 0 || self.max_sources_per_domain == 0 {
            problems.push("source caps must be at least 1".to_string());
        }
        if self.fetch_concurrency == 0 || self.max_concurrent_calls == 0 {
            problems.push("concurrency limits must be at least 1".to_string());
        }
        if self.circuit_breaker_empty_iterations == 0 {
            problems.push("circuit_breaker_empty_iterations must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.context_similarity_threshold) {
            problems.push("context_similarity_threshold must be within [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.fallback_probative_weight) {
            problems.push("fallback_probative_weight must be within [0, 1]".to_string());
        }
        let d = &self.directionality;
        if d.high_score_threshold > 100 || d.low_score_threshold >= d.high_score_threshold {
            problems.push(format!(
                "directionality thresholds must satisfy low < high <= 100 (low {}, high {})",
                d.low_score_threshold, d.high_score_threshold
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems.join("; ")))
        }
    }

    /// Evidence minimum per context for the given research depth
    pub fn min_evidence(&self, depth: crate::model::ResearchDepth) -> usize {
        match depth {
            crate::model::ResearchDepth::Quick => self.min_evidence_quick,
            crate::model::ResearchDepth::Deep => self.min_evidence_deep,
        }
    }
}

/// YAML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub retrievers: RetrieverConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

impl ConfigFile {
    /// Read and parse a configuration file; an empty file yields defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let contents = contents.trim();
        if contents.is_empty() {
            return Ok(ConfigFile::default());
        }

        serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: String,
    pub engine: EngineConfig,
    pub retrievers: RetrieverConfig,
    pub search: SearchConfig,
    pub port: u16,
    pub host: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: DEFAULT_CONFIG_PATH.to_string(),
            engine: EngineConfig::default(),
            retrievers: RetrieverConfig::default(),
            search: SearchConfig::default(),
            port: 8080,
            host: "127.0.0.1".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment and config file
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let config_path = std::env::var(ENV_CONFIG_PATH)
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let file = Self::load_config_file(&config_path).unwrap_or_default();

        let mut search = file.search;
        if let Ok(endpoint) = std::env::var(ENV_SEARCH_ENDPOINT) {
            search.endpoint = endpoint;
        }
        if let Ok(api_key) = std::env::var(ENV_SEARCH_API_KEY) {
            search.api_key = Some(api_key);
        }

        Self {
            config_path,
            engine: file.engine,
            retrievers: file.retrievers,
            search,
            port,
            host,
        }
    }

    /// Load configuration from YAML file
    fn load_config_file(path: &str) -> Option<ConfigFile> {
        let path = Path::new(path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return None;
        }

        match ConfigFile::load(path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "Loaded configuration from file");
                Some(config)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load config file, using defaults");
                None
            }
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Match a host against a configured domain (exact or subdomain)
fn host_matches(host: &str, domain: &str) -> bool {
    let domain = domain.trim().trim_start_matches('.').to_lowercase();
    if domain.is_empty() {
        return false;
    }
    host == domain || host.ends_with(&format!(".{}", domain))
}
