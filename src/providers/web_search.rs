//! Web search provider trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A web passage with its citation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebPassage {
    /// Page title
    pub title: String,
    /// Page URL
    pub url: String,
    /// Passage text
    pub text: String,
}

/// Response from a web search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebSearchResponse {
    /// Retrieved passages, best first
    pub passages: Vec<WebPassage>,
}

/// Trait for live web search.
///
/// Implementations:
/// - [`super::duckduckgo::DuckDuckGoSearch`]: DuckDuckGo instant answers
#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    /// Search the web for passages relevant to `query`
    async fn search(&self, query: &str) -> Result<WebSearchResponse>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
