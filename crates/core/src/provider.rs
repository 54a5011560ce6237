//! Provider trait: the abstraction over model backends.
//!
//! A Provider knows how to send a short exchange to a language model and get
//! the generated text back. The engine uses it for deployment, model-assisted
//! enhancement, judging, flaw analysis and diagnosis alike.
//!
//! Implementations: OpenAI-compatible, Google Gemini, offline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::Message;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gemini-1.5-flash-latest", "gpt-4o")
    pub model: String,

    /// The exchange messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 2.0 = most creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Ask the backend to answer with a JSON object only
    #[serde(default)]
    pub json_mode: bool,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderRequest {
    /// A single user turn at the given temperature.
    pub fn prompt(model: impl Into<String>, prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::user(prompt)],
            temperature,
            max_tokens: None,
            json_mode: false,
        }
    }

    /// Prepend a system instruction.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.messages.insert(0, Message::system(system));
        self
    }

    /// Request a JSON-only answer.
    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

impl ProviderResponse {
    /// The generated text.
    pub fn text(&self) -> &str {
        &self.message.content
    }
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// Every model backend implements this trait. Callers use `complete()`
/// without knowing which backend is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "gemini", "openai").
    fn name(&self) -> &str;

    /// The model used when a caller does not pick one.
    fn default_model(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
