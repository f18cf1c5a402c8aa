use crate::config::SearchConfig;
use crate::models::{SearchRequest, SearchResponse, SearchResult, SearchSource};
use std::time::Duration;
use tracing::{info, instrument, warn};

pub const MISSING_KEY_MESSAGE: &str = "Search API key not configured; skipping live search.";
pub const NO_RESULTS_MESSAGE: &str = "Search returned no results.";

/// Client for a Tavily-style search endpoint (`POST {base_url}/search`).
///
/// Never fails: every problem is reported through [`SearchResult::error`].
#[derive(Debug, Clone)]
pub struct SearchClient {
    api_key: Option<String>,
    max_results: u32,
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl SearchClient {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
            max_results: config.max_results,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.request_timeout),
            http: reqwest::Client::new(),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> SearchResult {
        let Some(api_key) = self.api_key.as_deref() else {
            return SearchResult::failed(query, MISSING_KEY_MESSAGE);
        };

        match self.request(query, api_key).await {
            Ok(result) => {
                info!("Search returned {} sources", result.sources.len());
                result
            }
            Err(err) => {
                warn!("Search unreachable: {}", err);
                SearchResult::failed(
                    query,
                    format!("Search unreachable; continuing without live search. ({})", err),
                )
            }
        }
    }

    async fn request(&self, query: &str, api_key: &str) -> Result<SearchResult, reqwest::Error> {
        let request = SearchRequest {
            query: query.to_string(),
            max_results: self.max_results,
        };

        let response = self
            .http
            .post(format!("{}/search", self.base_url))
            .header("X-API-Key", api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(SearchResult::failed(query, format!("Search failed: {}", body)));
        }

        let search_response: SearchResponse = response.json().await?;
        let sources: Vec<SearchSource> = search_response
            .results
            .into_iter()
            .map(|hit| SearchSource {
                title: hit.title.unwrap_or_else(|| "untitled".to_string()),
                url: hit.url.unwrap_or_default(),
                content: hit.content.unwrap_or_default(),
            })
            .collect();

        if sources.is_empty() {
            return Ok(SearchResult::failed(query, NO_RESULTS_MESSAGE));
        }

        Ok(SearchResult {
            query: query.to_string(),
            sources,
            error: None,
        })
    }
}

/// Render sources as evidence text, one block per source.
pub fn format_sources(sources: &[SearchSource]) -> String {
    sources
        .iter()
        .map(|s| format!("- {} ({})\n  {}", s.title, s.url, s.content))
        .collect::<Vec<_>>()
        .join("\n")
}
