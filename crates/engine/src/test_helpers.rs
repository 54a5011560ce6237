//! Shared test helpers for engine unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use promptsmith_core::error::ProviderError;
use promptsmith_core::message::Message;
use promptsmith_core::provider::{Provider, ProviderRequest, ProviderResponse};
use promptsmith_providers::ModelClient;

/// A mock provider that returns a sequence of scripted replies.
///
/// Each call to `complete` returns the next reply in the queue and records
/// the request. Panics if more calls are made than replies provided.
pub struct SequentialMockProvider {
    replies: Mutex<Vec<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The user turn of request `n` (0-based).
    pub fn prompt_of(&self, n: usize) -> String {
        self.requests.lock().unwrap()[n]
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    pub fn temperature_of(&self, n: usize) -> f32 {
        self.requests.lock().unwrap()[n].temperature
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    fn default_model(&self) -> &str {
        "mock-1"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let replies = self.replies.lock().unwrap();
        let n = requests.len();
        if n >= replies.len() {
            panic!(
                "SequentialMockProvider: no more replies (call #{n}, have {})",
                replies.len()
            );
        }
        let model = request.model.clone();
        requests.push(request);
        replies[n].clone().map(|text| ProviderResponse {
            message: Message::assistant(text),
            usage: None,
            model,
        })
    }
}

/// A client over a scripted provider, plus the provider for inspection.
pub fn scripted_client(
    replies: Vec<Result<String, ProviderError>>,
) -> (ModelClient, Arc<SequentialMockProvider>) {
    let provider = Arc::new(SequentialMockProvider::new(replies));
    let client = ModelClient::new(provider.clone(), Duration::from_secs(5));
    (client, provider)
}

pub fn text_client(texts: &[&str]) -> (ModelClient, Arc<SequentialMockProvider>) {
    scripted_client(texts.iter().map(|t| Ok(t.to_string())).collect())
}
