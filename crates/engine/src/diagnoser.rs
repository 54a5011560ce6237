//! System diagnoser: explains component failures and proposes a recovery.
//!
//! With a model client it asks a reliability-engineer meta-prompt for a
//! JSON diagnosis. Without one, or when that call fails, it falls back to a
//! deterministic classifier over the failure's error kind.

use async_trait::async_trait;
use promptsmith_core::diagnosis::{Diagnoser, FailureContext, RecoveryStrategy, SystemDiagnosis};
use promptsmith_providers::ModelClient;
use serde::Deserialize;
use tracing::{info, warn};

const DIAGNOSIS_SYSTEM: &str =
    "You are an expert AI system reliability engineer. Reply with a single JSON object only.";

#[derive(Debug, Deserialize)]
struct DiagnosisReply {
    root_cause_analysis: String,
    recovery_strategy: RecoveryStrategy,
    #[serde(default)]
    justification: String,
}

pub struct SystemDiagnoser {
    client: Option<ModelClient>,
    temperature: f32,
}

impl SystemDiagnoser {
    /// Heuristic classification only.
    pub fn heuristic() -> Self {
        Self {
            client: None,
            temperature: 0.0,
        }
    }

    pub fn with_model(client: ModelClient, temperature: f32) -> Self {
        Self {
            client: Some(client),
            temperature,
        }
    }

    fn diagnosis_prompt(failure: &FailureContext) -> String {
        let iteration = failure
            .iteration
            .map_or_else(|| "n/a".to_string(), |i| i.to_string());
        format!(
            "A component of a prompt-refinement engine failed. Determine the most likely root cause \
             and choose a recovery strategy.\n\n\
             Failing component: {}\n\
             Error kind: {}\n\
             Iteration: {iteration}\n\
             Error message:\n{}\n\n\
             Strategies:\n\
             - retry: the error looks transient; try the operation again\n\
             - use_fallback: the component keeps failing or is unavailable; switch to a simpler one\n\
             - abort_iteration: the error is unrecoverable within this iteration\n\
             - halt_system: the error affects the whole system, such as bad configuration or lost storage\n\n\
             Reply as JSON: {{\"root_cause_analysis\": \"...\", \
             \"recovery_strategy\": \"retry|use_fallback|abort_iteration|halt_system\", \
             \"justification\": \"...\"}}",
            failure.component, failure.error_kind, failure.message,
        )
    }
}

/// Deterministic diagnosis from the error kind alone.
pub fn classify(failure: &FailureContext) -> SystemDiagnosis {
    let (strategy, cause, why) = match failure.error_kind.as_str() {
        "timeout" | "network" | "rate_limited" => (
            RecoveryStrategy::Retry,
            "The model backend did not answer in time or the connection failed.",
            "Transport failures are usually transient.",
        ),
        "authentication_failed" | "not_configured" | "model_not_found" => (
            RecoveryStrategy::HaltSystem,
            "The backend rejected the credentials or is not configured for this model.",
            "No request can succeed until the configuration is fixed.",
        ),
        "malformed_response" => (
            RecoveryStrategy::UseFallback,
            "The backend answered, but not in the expected format.",
            "A simpler component with a looser output contract is more likely to succeed.",
        ),
        "api_error" => (
            RecoveryStrategy::UseFallback,
            "The backend returned an error status.",
            "The backend appears unhealthy; another backend may serve the request.",
        ),
        "exhausted" | "stalled" => (
            RecoveryStrategy::AbortIteration,
            "Self-correction could not produce a flaw-free candidate within its attempt cap.",
            "The unrevised candidate is used; further revision attempts are unlikely to help.",
        ),
        "storage" | "persistence" => (
            RecoveryStrategy::HaltSystem,
            "The Knowledge Base rejected or failed a write.",
            "Refinement history cannot be trusted without durable storage.",
        ),
        _ => (
            RecoveryStrategy::AbortIteration,
            "The component failed for an unclassified reason.",
            "Stopping the iteration is the safest default.",
        ),
    };
    SystemDiagnosis {
        component: failure.component.clone(),
        root_cause_analysis: format!("{cause} ({})", failure.message),
        recovery_strategy: strategy,
        justification: why.to_string(),
    }
}

#[async_trait]
impl Diagnoser for SystemDiagnoser {
    async fn diagnose(&self, failure: &FailureContext) -> SystemDiagnosis {
        info!(component = %failure.component, kind = %failure.error_kind, "Diagnosing failure");
        let Some(client) = &self.client else {
            return classify(failure);
        };

        // A broken backend cannot diagnose itself.
        if matches!(
            failure.error_kind.as_str(),
            "authentication_failed" | "not_configured" | "timeout" | "network"
        ) {
            return classify(failure);
        }

        match client
            .complete_json::<DiagnosisReply>(DIAGNOSIS_SYSTEM, &Self::diagnosis_prompt(failure), self.temperature)
            .await
        {
            Ok(reply) => SystemDiagnosis {
                component: failure.component.clone(),
                root_cause_analysis: reply.root_cause_analysis,
                recovery_strategy: reply.recovery_strategy,
                justification: reply.justification,
            },
            Err(e) => {
                warn!(error = %e, "Model diagnosis failed, using heuristic classification");
                classify(failure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{scripted_client, text_client};
    use promptsmith_core::error::ProviderError;

    fn failure(kind: &str) -> FailureContext {
        FailureContext::new("deployment", kind, "boom").at_iteration(2)
    }

    #[test]
    fn heuristic_strategy_table() {
        assert_eq!(classify(&failure("timeout")).recovery_strategy, RecoveryStrategy::Retry);
        assert_eq!(classify(&failure("network")).recovery_strategy, RecoveryStrategy::Retry);
        assert_eq!(
            classify(&failure("authentication_failed")).recovery_strategy,
            RecoveryStrategy::HaltSystem
        );
        assert_eq!(
            classify(&failure("not_configured")).recovery_strategy,
            RecoveryStrategy::HaltSystem
        );
        assert_eq!(
            classify(&failure("malformed_response")).recovery_strategy,
            RecoveryStrategy::UseFallback
        );
        assert_eq!(
            classify(&failure("exhausted")).recovery_strategy,
            RecoveryStrategy::AbortIteration
        );
        let diag = classify(&failure("timeout"));
        assert_eq!(diag.component, "deployment");
        assert!(diag.root_cause_analysis.contains("boom"));
    }

    #[tokio::test]
    async fn model_diagnosis_is_used_when_valid() {
        let (client, provider) = text_client(&[
            r#"{"root_cause_analysis": "Judge replied in prose", "recovery_strategy": "use_fallback", "justification": "Basic evaluator needs no model"}"#,
        ]);
        let diag = SystemDiagnoser::with_model(client, 0.0)
            .diagnose(&failure("malformed_response"))
            .await;
        assert_eq!(diag.root_cause_analysis, "Judge replied in prose");
        assert_eq!(diag.recovery_strategy, RecoveryStrategy::UseFallback);
        assert!(provider.prompt_of(0).contains("Error kind: malformed_response"));
    }

    #[tokio::test]
    async fn model_failure_falls_back() {
        let (client, _) = scripted_client(vec![Err(ProviderError::MalformedResponse("x".into()))]);
        let diag = SystemDiagnoser::with_model(client, 0.0)
            .diagnose(&failure("api_error"))
            .await;
        assert_eq!(diag.recovery_strategy, RecoveryStrategy::UseFallback);
    }

    #[tokio::test]
    async fn transport_failures_skip_the_model() {
        let (client, provider) = text_client(&[]);
        let diag = SystemDiagnoser::with_model(client, 0.0)
            .diagnose(&failure("timeout"))
            .await;
        assert_eq!(diag.recovery_strategy, RecoveryStrategy::Retry);
        assert_eq!(provider.call_count(), 0);
    }
}
