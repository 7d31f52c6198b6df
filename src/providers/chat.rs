//! Chat/completion provider trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::error::Result;

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A chat message with an explicit role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    /// A system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// A user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Options for a chat completion call
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Model override; provider default when None
    pub model: Option<String>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Maximum completion tokens
    pub max_tokens: Option<usize>,
    /// Cancellation token; the call aborts when it fires
    pub cancel: Option<CancelToken>,
}

/// Token usage reported by the provider
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ChatUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// A chat completion with usage accounting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// Generated content
    pub content: String,
    /// Token usage
    pub usage: ChatUsage,
}

/// Trait for chat/completion generation.
///
/// Implementations:
/// - [`super::ollama::OllamaProvider`]: remote Ollama-compatible server
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Generate a completion for the given messages
    async fn complete(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<ChatCompletion>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Default model used when options carry no override
    fn model(&self) -> &str;
}
