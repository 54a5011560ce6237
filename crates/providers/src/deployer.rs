//! Deployment orchestrator backed by a model client.

use async_trait::async_trait;
use promptsmith_core::capability::Deployer;
use promptsmith_core::error::ProviderError;

use crate::client::ModelClient;

/// Sends the accepted prompt to the target model and returns its raw output.
pub struct ModelDeployer {
    client: ModelClient,
}

impl ModelDeployer {
    pub fn new(client: ModelClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Deployer for ModelDeployer {
    fn name(&self) -> &str {
        self.client.provider_name()
    }

    async fn deploy(&self, prompt: &str, temperature: f32) -> Result<String, ProviderError> {
        self.client.complete(prompt, temperature).await
    }
}
