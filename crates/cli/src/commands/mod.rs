//! Subcommand implementations.

pub mod doctor;
pub mod init;
pub mod refine;
pub mod report;
pub mod serve;
pub mod sessions;

use std::sync::Arc;

use promptsmith_config::AppConfig;
use promptsmith_core::event::EventBus;
use promptsmith_core::knowledge::KnowledgeBase;
use promptsmith_engine::{CapabilityRegistry, Engine};

/// Load configuration with a readable error.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Open the configured Knowledge Base.
pub async fn open_knowledge(config: &AppConfig) -> Result<Arc<dyn KnowledgeBase>, Box<dyn std::error::Error>> {
    Ok(promptsmith_knowledge::open_from_config(config)
        .await
        .map_err(|e| format!("Failed to open Knowledge Base: {e}"))?)
}

/// Build an engine over the configured backends and Knowledge Base.
pub async fn build_engine(config: AppConfig) -> Result<Engine, Box<dyn std::error::Error>> {
    let kb = open_knowledge(&config).await?;
    let config = Arc::new(config);
    let router = Arc::new(promptsmith_providers::build_from_config(&config));
    let bus = Arc::new(EventBus::new(config.runtime.bus_capacity));
    let registry = Arc::new(CapabilityRegistry::new(router, config));
    Ok(Engine::new(registry, kb, bus))
}
