//! Model backend implementations for Promptsmith.
//!
//! All backends implement the `promptsmith_core::Provider` trait.
//! The router selects the correct backend for a session's `BackendKind`,
//! and [`ModelClient`] bounds every call with the configured timeout.

pub mod client;
pub mod deployer;
pub mod gemini;
pub mod offline;
pub mod openai_compat;
pub mod router;

pub use client::{ModelClient, extract_json};
pub use deployer::ModelDeployer;
pub use gemini::GeminiProvider;
pub use offline::OfflineProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config};
