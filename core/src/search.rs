use crate::config::SearchConfig;
use crate::errors::{ConsultError, ConsultResult};
use crate::types::SearchItem;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Common trait for web search providers
///
/// "No results" is `Ok(vec![])`; only transport and provider failures are errors.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, query: &str) -> ConsultResult<Vec<SearchItem>>;

    fn provider_name(&self) -> &'static str;
}

const TAVILY_API_BASE: &str = "https://api.tavily.com";

/// Tavily search API client
#[derive(Debug, Clone)]
pub struct TavilyClient {
    api_key: String,
    base_url: String,
    max_results: u32,
    search_depth: String,
    http_client: Client,
}

#[derive(Serialize)]
struct TavilySearchRequest<'a> {
    query: &'a str,
    max_results: u32,
    search_depth: &'a str,
    include_raw_content: bool,
}

impl TavilyClient {
    pub fn new(config: &SearchConfig) -> ConsultResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConsultError::ConfigError("API key is required for Tavily".to_string()))?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ConsultError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| TAVILY_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            max_results: config.max_results,
            search_depth: config.search_depth.clone(),
            http_client,
        })
    }

    fn api_url(&self) -> String {
        format!("{}/search", self.base_url)
    }
}

/// Convert a Tavily response body into canonical search items.
///
/// Items that cannot be normalized are dropped one by one; they never fail the
/// whole response.
fn normalize_tavily_results(body: &Value) -> Vec<SearchItem> {
    let Some(results) = body.get("results").and_then(Value::as_array) else {
        return Vec::new();
    };

    results
        .iter()
        .filter_map(|raw| {
            let item = SearchItem::from_value(raw);
            if item.is_none() {
                debug!(item = %raw, "Skipping malformed search result");
            }
            item
        })
        .collect()
}

#[async_trait]
impl SearchClient for TavilyClient {
    fn provider_name(&self) -> &'static str {
        "tavily"
    }

    async fn search(&self, query: &str) -> ConsultResult<Vec<SearchItem>> {
        debug!(query = %query, "Searching with Tavily");

        let request = TavilySearchRequest {
            query,
            max_results: self.max_results,
            search_depth: &self.search_depth,
            include_raw_content: false,
        };

        let response = self
            .http_client
            .post(self.api_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ConsultError::RequestError(format!("Failed to send request to Tavily: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ConsultError::HttpError {
                status_code: status.as_u16(),
                message: format!("Tavily search failed: {}", message),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ConsultError::ParsingError(format!("Failed to parse Tavily response: {}", e)))?;

        let items = normalize_tavily_results(&body);
        debug!(count = items.len(), "Tavily search completed");
        Ok(items)
    }
}

/// Build the configured search client, or `None` when search is not configured.
pub fn create_search_client(config: &SearchConfig) -> ConsultResult<Option<Arc<dyn SearchClient>>> {
    if config.api_key.as_deref().map_or(true, |key| key.trim().is_empty()) {
        info!("No search API key configured, analyses will run without web results");
        return Ok(None);
    }

    match config.provider.as_str() {
        "tavily" => {
            info!(max_results = config.max_results, "Creating Tavily search client");
            Ok(Some(Arc::new(TavilyClient::new(config)?)))
        }
        other => Err(ConsultError::ConfigError(format!(
            "Unsupported search provider '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_results() {
        let body = json!({
            "query": "SWOT analysis of Acme 2025",
            "results": [
                {"title": "Acme news", "url": "http://x", "content": "Acme grew", "score": 0.91},
                "garbage",
                {"score": 0.2},
                {"url": "http://y"}
            ]
        });

        let items = normalize_tavily_results(&body);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], SearchItem::new("http://x", "Acme news").with_content("Acme grew"));
        assert_eq!(items[1].url.as_deref(), Some("http://y"));
        assert_eq!(items[1].title, None);
    }

    #[test]
    fn test_normalize_without_results_field() {
        assert!(normalize_tavily_results(&json!({"answer": null})).is_empty());
        assert!(normalize_tavily_results(&json!({"results": "nope"})).is_empty());
    }

    #[test]
    fn test_factory_without_key_is_none() {
        let client = create_search_client(&SearchConfig::default()).unwrap();
        assert!(client.is_none());
    }

    #[test]
    fn test_factory_with_key() {
        let config = SearchConfig {
            api_key: Some("tvly-key".to_string()),
            base_url: Some("http://localhost:9999/".to_string()),
            ..SearchConfig::default()
        };
        let client = create_search_client(&config).unwrap().unwrap();
        assert_eq!(client.provider_name(), "tavily");

        let tavily = TavilyClient::new(&config).unwrap();
        assert_eq!(tavily.api_url(), "http://localhost:9999/search");
    }

    #[test]
    fn test_factory_rejects_unknown_provider() {
        let config = SearchConfig {
            provider: "altavista".to_string(),
            api_key: Some("k".to_string()),
            ..SearchConfig::default()
        };
        assert!(matches!(
            create_search_client(&config),
            Err(ConsultError::ConfigError(_))
        ));
    }
}
