//! JSON web search client (SearXNG-compatible `format=json` API)

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Instant;

use super::http_client;
use crate::model::{SearchConfig, SearchResult};
use crate::service::capabilities::{CapabilityError, SearchProvider};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

impl From<SearchHit> for SearchResult {
    fn from(hit: SearchHit) -> Self {
        SearchResult {
            url: hit.url,
            title: hit.title,
            snippet: hit.content,
        }
    }
}

pub struct SearxSearchProvider {
    client: Client,
    config: SearchConfig,
}

impl SearxSearchProvider {
    pub fn new(config: SearchConfig) -> Self {
        tracing::info!(endpoint = %config.endpoint, "Search provider configured");
        Self {
            client: http_client(),
            config,
        }
    }
}

#[async_trait]
impl SearchProvider for SearxSearchProvider {
    async fn search(
        &self,
        query: &str,
        language: Option<&str>,
    ) -> Result<Vec<SearchResult>, CapabilityError> {
        let started = Instant::now();

        let mut params = vec![("q", query.to_string()), ("format", "json".to_string())];
        if let Some(language) = language {
            params.push(("language", language.to_string()));
        }

        let mut request = self.client.get(&self.config.endpoint).query(&params);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CapabilityError::Call(format!("Search request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Call(format!(
                "Unexpected search status {}: {}",
                status, body
            )));
        }

        let body: SearchResponse = response.json().await.map_err(|e| {
            CapabilityError::Call(format!("Failed to deserialize search response: {}", e))
        })?;

        let results: Vec<SearchResult> = body
            .results
            .into_iter()
            .take(self.config.max_results)
            .map(SearchResult::from)
            .collect();

        tracing::debug!(
            query = %query,
            language = ?language,
            count = results.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Search completed"
        );

        Ok(results)
    }
}
