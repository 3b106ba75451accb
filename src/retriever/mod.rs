//! Page retrieval for research iterations

mod generic;
mod search;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::time::Duration;
use url::Url;

use crate::model::RetrieverConfig;
use crate::service::capabilities::{FetchedPage, PageFetcher};

pub use generic::GenericWebRetriever;
pub use search::SearxSearchProvider;

/// User agent sent with every outbound request
const USER_AGENT: &str = "verdict-engine/1.0";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RetrieverError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Server error {status}: {url}")]
    ServerError { status: u16, url: String },

    #[error("URL blocked by configuration: {0}")]
    Blocked(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported content type {content_type}: {url}")]
    UnsupportedContent { content_type: String, url: String },

    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),
}

impl RetrieverError {
    /// Errors worth a single retry
    pub fn is_transient(&self) -> bool {
        match self {
            RetrieverError::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            RetrieverError::RateLimited
            | RetrieverError::ServerError { .. }
            | RetrieverError::Timeout(_) => true,
            _ => false,
        }
    }
}

/// A retriever for one family of pages
#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    fn can_handle(&self, url: &Url) -> bool;

    async fn retrieve(&self, url: &Url) -> Result<FetchedPage, RetrieverError>;
}

/// Hash page content after whitespace normalization
pub(crate) fn content_hash(content: &str) -> String {
    let normalized = content.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Convert HTML to Markdown
fn html_to_markdown(html: &str) -> String {
    htmd::convert(html).unwrap_or_else(|_| html.to_string())
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Applies allow/deny lists and hands the URL to the first matching retriever
pub struct RetrieverDispatcher {
    config: RetrieverConfig,
    retrievers: Vec<Box<dyn DocumentRetriever>>,
}

impl RetrieverDispatcher {
    pub fn new(config: RetrieverConfig) -> Self {
        if !config.allow.is_empty() {
            tracing::info!(allow = ?config.allow, "Retriever whitelist configured");
        }
        if !config.deny.is_empty() {
            tracing::info!(deny = ?config.deny, "Retriever blacklist configured");
        }

        Self {
            config,
            retrievers: vec![Box::new(GenericWebRetriever::new())],
        }
    }

    /// Put a more specific retriever ahead of the existing ones
    pub fn with_retriever(mut self, retriever: Box<dyn DocumentRetriever>) -> Self {
        self.retrievers.insert(0, retriever);
        self
    }

    pub async fn retrieve(&self, url: &Url) -> Result<FetchedPage, RetrieverError> {
        if !self.config.is_url_allowed(url) {
            tracing::debug!(url = %url, "URL blocked by configuration");
            return Err(RetrieverError::Blocked(url.to_string()));
        }

        let retriever = self
            .retrievers
            .iter()
            .find(|r| r.can_handle(url))
            .ok_or_else(|| RetrieverError::Blocked(url.to_string()))?;

        retriever.retrieve(url).await
    }
}

#[async_trait]
impl PageFetcher for RetrieverDispatcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, RetrieverError> {
        self.retrieve(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_ignores_whitespace() {
        assert_eq!(
            content_hash("Emissions fell\n\n by 12%"),
            content_hash("Emissions fell by 12%")
        );
        assert_ne!(content_hash("a"), content_hash("b"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(RetrieverError::RateLimited.is_transient());
        assert!(RetrieverError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(
            RetrieverError::ServerError {
                status: 503,
                url: "https://example.org".to_string()
            }
            .is_transient()
        );
        assert!(!RetrieverError::NotFound("x".to_string()).is_transient());
        assert!(!RetrieverError::Blocked("x".to_string()).is_transient());
    }

    #[tokio::test]
    async fn test_dispatcher_blocks_denied_urls() {
        let dispatcher = RetrieverDispatcher::new(RetrieverConfig {
            allow: vec![],
            deny: vec!["example.com".to_string()],
        });
        let url = Url::parse("https://news.example.com/story").unwrap();
        let result = dispatcher.retrieve(&url).await;
        assert!(matches!(result, Err(RetrieverError::Blocked(_))));
    }
}
