//! DuckDuckGo instant-answer web search provider

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::error::{Error, Result};

use super::web_search::{WebPassage, WebSearchProvider, WebSearchResponse};

/// Web search backed by the DuckDuckGo instant-answer API (no API key)
pub struct DuckDuckGoSearch {
    client: Client,
    max_results: usize,
}

impl DuckDuckGoSearch {
    /// Create a new search provider returning at most `max_results` passages
    pub fn new(max_results: usize, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            max_results: max_results.max(1),
        }
    }
}

#[async_trait]
impl WebSearchProvider for DuckDuckGoSearch {
    async fn search(&self, query: &str) -> Result<WebSearchResponse> {
        let url = format!(
            "https://api.duckduckgo.com/?q={}&format=json&no_redirect=1&no_html=1",
            urlencoding::encode(query)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::WebSearch(format!("Search request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::WebSearch(format!(
                "Search failed: HTTP {}",
                response.status()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| Error::WebSearch(format!("Failed to parse search response: {}", e)))?;

        let mut passages = Vec::new();

        if let Some(abstract_text) = payload.get("AbstractText").and_then(|v| v.as_str()) {
            if let Some(url) = payload.get("AbstractURL").and_then(|v| v.as_str()) {
                if !abstract_text.is_empty() && !url.is_empty() {
                    passages.push(WebPassage {
                        title: abstract_text
                            .split(" - ")
                            .next()
                            .unwrap_or(abstract_text)
                            .to_string(),
                        url: url.to_string(),
                        text: abstract_text.to_string(),
                    });
                }
            }
        }

        if let Some(items) = payload.get("Results").and_then(|v| v.as_array()) {
            extract_topics(items, &mut passages);
        }
        if let Some(items) = payload.get("RelatedTopics").and_then(|v| v.as_array()) {
            extract_topics(items, &mut passages);
        }

        passages.truncate(self.max_results);

        Ok(WebSearchResponse { passages })
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}

fn extract_topics(items: &[Value], passages: &mut Vec<WebPassage>) {
    for item in items {
        // Topic groups nest their entries one level down
        if let Some(topics) = item.get("Topics").and_then(|v| v.as_array()) {
            extract_topics(topics, passages);
            continue;
        }
        let text = item.get("Text").and_then(|v| v.as_str()).unwrap_or("");
        let url = item.get("FirstURL").and_then(|v| v.as_str()).unwrap_or("");
        if !text.is_empty() && !url.is_empty() {
            passages.push(WebPassage {
                title: text.split(" - ").next().unwrap_or(text).to_string(),
                url: url.to_string(),
                text: text.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_topics_flattens_nested_groups() {
        let items: Vec<Value> = serde_json::from_str(
            r#"[
                {"Text": "Paris - capital of France", "FirstURL": "https://example.org/paris"},
                {"Topics": [
                    {"Text": "Lyon - city in France", "FirstURL": "https://example.org/lyon"}
                ]},
                {"Text": "", "FirstURL": "https://example.org/empty"}
            ]"#,
        )
        .unwrap();

        let mut passages = Vec::new();
        extract_topics(&items, &mut passages);

        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].title, "Paris");
        assert_eq!(passages[1].url, "https://example.org/lyon");
    }
}
