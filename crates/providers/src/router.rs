//! Provider router: maps each `BackendKind` to a constructed backend.
//!
//! Backends are built once from configuration at startup. A backend without
//! credentials is simply absent; asking for it is a configuration error that
//! the caller reports before any session starts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use promptsmith_core::BackendKind;
use promptsmith_core::provider::Provider;

use crate::client::ModelClient;
use crate::gemini::GeminiProvider;
use crate::offline::OfflineProvider;
use crate::openai_compat::{OPENAI_BASE_URL, OpenAiCompatProvider};

/// Routes model calls to the correct backend.
pub struct ProviderRouter {
    providers: HashMap<BackendKind, Arc<dyn Provider>>,
    timeout: Duration,
}

impl ProviderRouter {
    /// Create an empty router whose clients use `timeout` per call.
    pub fn new(timeout: Duration) -> Self {
        Self {
            providers: HashMap::new(),
            timeout,
        }
    }

    /// Register a backend.
    pub fn register(&mut self, kind: BackendKind, provider: Arc<dyn Provider>) {
        self.providers.insert(kind, provider);
    }

    /// Get a backend.
    pub fn get(&self, kind: BackendKind) -> Option<Arc<dyn Provider>> {
        self.providers.get(&kind).cloned()
    }

    /// A timeout-bounded client for a backend.
    pub fn client(&self, kind: BackendKind) -> Option<ModelClient> {
        self.get(kind).map(|p| ModelClient::new(p, self.timeout))
    }

    /// Registered backends, in a stable order.
    pub fn available(&self) -> Vec<BackendKind> {
        BackendKind::ALL
            .into_iter()
            .filter(|k| self.providers.contains_key(k))
            .collect()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Build backends from configuration. The offline backend is always present.
pub fn build_from_config(config: &promptsmith_config::AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(Duration::from_secs(config.runtime.provider_timeout_secs));

    for kind in [BackendKind::Gemini, BackendKind::OpenAi] {
        let Some(settings) = config.provider(kind) else {
            continue;
        };
        let Some(api_key) = settings.api_key.clone() else {
            tracing::debug!(backend = %kind, "No API key configured, backend unavailable");
            continue;
        };

        let provider: Arc<dyn Provider> = match kind {
            BackendKind::Gemini => {
                let mut p = GeminiProvider::new(api_key);
                if let Some(url) = &settings.api_url {
                    p = p.with_base_url(url);
                }
                if let Some(model) = &settings.default_model {
                    p = p.with_default_model(model);
                }
                Arc::new(p)
            }
            _ => {
                let base_url = settings.api_url.as_deref().unwrap_or(OPENAI_BASE_URL);
                let mut p = OpenAiCompatProvider::new("openai", base_url, api_key);
                if let Some(model) = &settings.default_model {
                    p = p.with_default_model(model);
                }
                Arc::new(p)
            }
        };
        router.register(kind, provider);
    }

    router.register(BackendKind::Offline, Arc::new(OfflineProvider::new()));
    router
}
