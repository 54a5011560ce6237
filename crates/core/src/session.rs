//! Session domain types: identity, per-run configuration snapshot and lifecycle.
//!
//! A session is one end-to-end refinement run. Its configuration is captured
//! once at creation and never changes; its status moves from `running` to
//! exactly one terminal status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Upper bound for `max_iterations`.
pub const MAX_ITERATIONS_LIMIT: u32 = 10;

/// Upper bound for `self_correction_iterations`.
pub const MAX_SELF_CORRECTION_LIMIT: u32 = 5;

/// Shortest initial prompt accepted.
pub const MIN_PROMPT_CHARS: usize = 10;

/// Unique identifier for a refinement session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Model backend used for deployment and model-assisted roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
    /// Deterministic, network-free backend
    #[serde(alias = "mock")]
    Offline,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [Self::Gemini, Self::OpenAi, Self::Offline];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            "offline" | "mock" => Ok(Self::Offline),
            other => Err(Error::config(format!("unknown backend '{other}'"))),
        }
    }
}

/// Prompt enhancer variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhancerKind {
    RuleBased,
    LlmAssisted,
    Architect,
}

impl EnhancerKind {
    /// Only the architect enhancer produces output with a structured
    /// contract that the self-correction sub-loop can validate.
    pub fn supports_self_correction(&self) -> bool {
        matches!(self, Self::Architect)
    }

    /// Whether this enhancer needs a model backend.
    pub fn uses_model(&self) -> bool {
        !matches!(self, Self::RuleBased)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RuleBased => "rule_based",
            Self::LlmAssisted => "llm_assisted",
            Self::Architect => "architect",
        }
    }
}

impl std::str::FromStr for EnhancerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rule_based" | "rule-based" => Ok(Self::RuleBased),
            "llm_assisted" | "llm-assisted" => Ok(Self::LlmAssisted),
            "architect" => Ok(Self::Architect),
            other => Err(Error::config(format!("unknown enhancer '{other}'"))),
        }
    }
}

/// Evaluation engine variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    Basic,
    LlmAssisted,
}

impl EvaluationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::LlmAssisted => "llm_assisted",
        }
    }
}

impl std::str::FromStr for EvaluationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "llm_assisted" | "llm-assisted" => Ok(Self::LlmAssisted),
            other => Err(Error::config(format!("unknown evaluation mode '{other}'"))),
        }
    }
}

/// Which provider fills each selectable role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSelection {
    #[serde(default = "default_backend")]
    pub orchestrator: BackendKind,
    #[serde(default = "default_enhancer")]
    pub enhancer: EnhancerKind,
}

impl Default for ProviderSelection {
    fn default() -> Self {
        Self {
            orchestrator: default_backend(),
            enhancer: default_enhancer(),
        }
    }
}

fn default_backend() -> BackendKind {
    BackendKind::Gemini
}

fn default_enhancer() -> EnhancerKind {
    EnhancerKind::RuleBased
}

/// Per-session configuration snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_model_temperature")]
    pub model_temperature: f32,

    #[serde(default = "default_architect_temperature")]
    pub architect_temperature: f32,

    #[serde(default)]
    pub providers: ProviderSelection,

    #[serde(default = "default_evaluation_mode")]
    pub evaluation_mode: EvaluationMode,

    #[serde(default)]
    pub enable_self_correction: bool,

    #[serde(default = "default_self_correction_iterations")]
    pub self_correction_iterations: u32,
}

fn default_max_iterations() -> u32 {
    3
}
fn default_model_temperature() -> f32 {
    0.7
}
fn default_architect_temperature() -> f32 {
    0.2
}
fn default_evaluation_mode() -> EvaluationMode {
    EvaluationMode::Basic
}
fn default_self_correction_iterations() -> u32 {
    3
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            model_temperature: default_model_temperature(),
            architect_temperature: default_architect_temperature(),
            providers: ProviderSelection::default(),
            evaluation_mode: default_evaluation_mode(),
            enable_self_correction: false,
            self_correction_iterations: default_self_correction_iterations(),
        }
    }
}

impl RefinementConfig {
    /// Check ranges. Violations are configuration errors raised before any
    /// session exists.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_iterations == 0 || self.max_iterations > MAX_ITERATIONS_LIMIT {
            return Err(Error::config(format!(
                "max_iterations must be between 1 and {MAX_ITERATIONS_LIMIT}, got {}",
                self.max_iterations
            )));
        }
        for (name, value) in [
            ("model_temperature", self.model_temperature),
            ("architect_temperature", self.architect_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(Error::config(format!(
                    "{name} must be between 0.0 and 2.0, got {value}"
                )));
            }
        }
        if self.self_correction_iterations == 0
            || self.self_correction_iterations > MAX_SELF_CORRECTION_LIMIT
        {
            return Err(Error::config(format!(
                "self_correction_iterations must be between 1 and {MAX_SELF_CORRECTION_LIMIT}, got {}",
                self.self_correction_iterations
            )));
        }
        Ok(())
    }

    /// Effective self-correction cap: the smaller of the requested value and
    /// the server ceiling.
    pub fn self_correction_cap(&self, server_ceiling: u32) -> u32 {
        self.self_correction_iterations.min(server_ceiling).max(1)
    }
}

/// A caller's request to start a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementRequest {
    pub initial_prompt: String,
    #[serde(flatten)]
    pub config: RefinementConfig,
}

impl RefinementRequest {
    pub fn new(initial_prompt: impl Into<String>, config: RefinementConfig) -> Self {
        Self {
            initial_prompt: initial_prompt.into(),
            config,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.initial_prompt.trim().chars().count() < MIN_PROMPT_CHARS {
            return Err(Error::config(format!(
                "initial_prompt must be at least {MIN_PROMPT_CHARS} characters"
            )));
        }
        self.config.validate()
    }
}

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::Internal(format!("unknown session status '{other}'"))),
        }
    }
}

/// Why a session stopped iterating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Satisfied,
    IterationCap,
    LearnerStop,
    Cancelled,
    ProviderFailure,
    PersistenceFailure,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Satisfied => "satisfied",
            Self::IterationCap => "iteration_cap",
            Self::LearnerStop => "learner_stop",
            Self::Cancelled => "cancelled",
            Self::ProviderFailure => "provider_failure",
            Self::PersistenceFailure => "persistence_failure",
        }
    }

    /// The terminal status a session takes when it stops for this reason.
    pub fn terminal_status(&self) -> SessionStatus {
        match self {
            Self::ProviderFailure | Self::PersistenceFailure => SessionStatus::Failed,
            _ => SessionStatus::Completed,
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StopReason {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "satisfied" => Ok(Self::Satisfied),
            "iteration_cap" => Ok(Self::IterationCap),
            "learner_stop" => Ok(Self::LearnerStop),
            "cancelled" => Ok(Self::Cancelled),
            "provider_failure" => Ok(Self::ProviderFailure),
            "persistence_failure" => Ok(Self::PersistenceFailure),
            other => Err(Error::Internal(format!("unknown stop reason '{other}'"))),
        }
    }
}

/// A refinement session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub initial_prompt: String,
    pub config: RefinementConfig,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Session {
    /// A fresh running session.
    pub fn start(initial_prompt: impl Into<String>, config: RefinementConfig) -> Self {
        Self {
            id: SessionId::new(),
            initial_prompt: initial_prompt.into(),
            config,
            status: SessionStatus::Running,
            stop_reason: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// Session listing row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub initial_prompt: String,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    pub iterations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Query filter for listing sessions (newest first).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionFilter {
    #[serde(default)]
    pub status: Option<SessionStatus>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl SessionFilter {
    pub fn matches(&self, status: SessionStatus) -> bool {
        self.status.is_none_or(|s| s == status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = RefinementConfig::default();
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.providers.orchestrator, BackendKind::Gemini);
        assert_eq!(config.providers.enhancer, EnhancerKind::RuleBased);
        assert_eq!(config.evaluation_mode, EvaluationMode::Basic);
        assert!(!config.enable_self_correction);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn request_deserializes_flat_body() {
        let req: RefinementRequest = serde_json::from_value(serde_json::json!({
            "initial_prompt": "Summarize the French revolution",
            "max_iterations": 5,
            "providers": { "orchestrator": "mock", "enhancer": "architect" },
            "enable_self_correction": true
        }))
        .unwrap();
        assert_eq!(req.config.max_iterations, 5);
        assert_eq!(req.config.providers.orchestrator, BackendKind::Offline);
        assert_eq!(req.config.providers.enhancer, EnhancerKind::Architect);
        assert!((req.config.model_temperature - 0.7).abs() < f32::EPSILON);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut config = RefinementConfig {
            max_iterations: 11,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        config.max_iterations = 0;
        assert!(config.validate().is_err());
        config.max_iterations = 3;
        config.model_temperature = 2.5;
        assert!(config.validate().is_err());
        config.model_temperature = 0.7;
        config.self_correction_iterations = 6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn short_prompt_is_rejected() {
        let req = RefinementRequest::new("too short", RefinementConfig::default());
        assert!(req.validate().is_err());
    }

    #[test]
    fn self_correction_cap_takes_minimum() {
        let config = RefinementConfig {
            self_correction_iterations: 4,
            ..Default::default()
        };
        assert_eq!(config.self_correction_cap(2), 2);
        assert_eq!(config.self_correction_cap(5), 4);
    }

    #[test]
    fn stop_reason_maps_to_terminal_status() {
        assert_eq!(StopReason::Satisfied.terminal_status(), SessionStatus::Completed);
        assert_eq!(StopReason::Cancelled.terminal_status(), SessionStatus::Completed);
        assert_eq!(StopReason::ProviderFailure.terminal_status(), SessionStatus::Failed);
        assert_eq!("iteration_cap".parse::<StopReason>().unwrap(), StopReason::IterationCap);
    }

    #[test]
    fn filter_matches_status() {
        let filter = SessionFilter {
            status: Some(SessionStatus::Failed),
            limit: None,
        };
        assert!(filter.matches(SessionStatus::Failed));
        assert!(!filter.matches(SessionStatus::Completed));
        assert!(SessionFilter::default().matches(SessionStatus::Running));
    }
}
