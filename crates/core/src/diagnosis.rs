//! System diagnosis: structured explanations of component failures.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What the system should do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    Retry,
    UseFallback,
    AbortIteration,
    HaltSystem,
}

impl RecoveryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retry => "retry",
            Self::UseFallback => "use_fallback",
            Self::AbortIteration => "abort_iteration",
            Self::HaltSystem => "halt_system",
        }
    }
}

/// The failure being diagnosed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    /// e.g. "deployment", "enhancer", "self_correction"
    pub component: String,
    /// Machine-readable error kind (see `ProviderError::kind`)
    pub error_kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
}

impl FailureContext {
    pub fn new(
        component: impl Into<String>,
        error_kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            component: component.into(),
            error_kind: error_kind.into(),
            message: message.into(),
            iteration: None,
        }
    }

    pub fn at_iteration(mut self, iteration: u32) -> Self {
        self.iteration = Some(iteration);
        self
    }
}

/// A structured root-cause analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemDiagnosis {
    pub component: String,
    pub root_cause_analysis: String,
    pub recovery_strategy: RecoveryStrategy,
    pub justification: String,
}

/// Produces a diagnosis for any failure. Must not fail itself.
#[async_trait]
pub trait Diagnoser: Send + Sync {
    async fn diagnose(&self, failure: &FailureContext) -> SystemDiagnosis;
}
