//! Timeout-bounded model client shared by every model-assisted role.
//!
//! Wraps a provider with a fixed model and a per-call deadline. A deadline
//! miss surfaces as `ProviderError::Timeout`.

use std::sync::Arc;
use std::time::Duration;

use promptsmith_core::error::ProviderError;
use promptsmith_core::provider::{Provider, ProviderRequest};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct ModelClient {
    provider: Arc<dyn Provider>,
    model: String,
    timeout: Duration,
}

impl ModelClient {
    pub fn new(provider: Arc<dyn Provider>, timeout: Duration) -> Self {
        let model = provider.default_model().to_string();
        Self {
            provider,
            model,
            timeout,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a request under the deadline and return the generated text.
    pub async fn send(&self, mut request: ProviderRequest) -> Result<String, ProviderError> {
        if request.model.is_empty() {
            request.model = self.model.clone();
        }
        debug!(
            provider = %self.provider.name(),
            model = %request.model,
            temperature = request.temperature,
            json = request.json_mode,
            "Model call"
        );

        match tokio::time::timeout(self.timeout, self.provider.complete(request)).await {
            Ok(Ok(response)) => Ok(response.message.content),
            Ok(Err(e)) => {
                warn!(provider = %self.provider.name(), error = %e, "Model call failed");
                Err(e)
            }
            Err(_) => Err(ProviderError::Timeout(format!(
                "{} did not answer within {}s",
                self.provider.name(),
                self.timeout.as_secs()
            ))),
        }
    }

    /// Single user turn.
    pub async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, ProviderError> {
        self.send(ProviderRequest::prompt(self.model.clone(), prompt, temperature))
            .await
    }

    /// Single user turn answered with a JSON object, parsed into `T`.
    pub async fn complete_json<T: DeserializeOwned>(
        &self,
        system: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<T, ProviderError> {
        let request = ProviderRequest::prompt(self.model.clone(), prompt, temperature)
            .with_system(system)
            .json();
        let text = self.send(request).await?;
        let json = extract_json(&text).ok_or_else(|| {
            ProviderError::MalformedResponse(format!("No JSON object in reply: {}", preview(&text)))
        })?;
        serde_json::from_str(json)
            .map_err(|e| ProviderError::MalformedResponse(format!("Unexpected JSON shape: {e}")))
    }
}

/// The outermost `{...}` span of a reply, tolerating code fences and chatter.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn preview(text: &str) -> String {
    text.chars().take(80).collect()
}
