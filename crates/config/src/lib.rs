//! Configuration loading, validation, and management for Promptsmith.
//!
//! Loads configuration from `~/.promptsmith/config.toml` (or the file named by
//! `PROMPTSMITH_CONFIG`) with environment variable overrides. Validates all
//! settings at startup; the result is immutable for the life of the process.

use promptsmith_core::BackendKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.promptsmith/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend used when a caller does not choose one
    #[serde(default = "default_backend")]
    pub default_backend: BackendKind,

    /// Knowledge Base storage
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Timeouts and buffers
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Self-correction sub-loop
    #[serde(default)]
    pub self_correction: SelfCorrectionConfig,

    /// Evaluation criteria and stopping threshold
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Learning module thresholds
    #[serde(default)]
    pub learning: LearningConfig,

    /// System diagnoser
    #[serde(default)]
    pub diagnosis: DiagnosisConfig,

    /// Backend-specific settings, keyed by backend name ("gemini", "openai")
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_backend() -> BackendKind {
    BackendKind::Gemini
}
fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override the backend's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_knowledge_backend")]
    pub backend: String,

    /// SQLite database file; defaults to `~/.promptsmith/knowledge.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_knowledge_backend() -> String {
    "sqlite".into()
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            backend: default_knowledge_backend(),
            path: None,
        }
    }
}

impl KnowledgeConfig {
    /// Resolved database path.
    pub fn database_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("knowledge.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Front-end origin allowed by CORS
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_allowed_origin() -> String {
    "http://localhost:3000".into()
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origin: default_allowed_origin(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Per-call timeout for every model request
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    /// Capacity of each session's event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Capacity of the process-wide domain event bus
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
}

fn default_provider_timeout_secs() -> u64 {
    60
}
fn default_event_buffer() -> usize {
    32
}
fn default_bus_capacity() -> usize {
    256
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            provider_timeout_secs: default_provider_timeout_secs(),
            event_buffer: default_event_buffer(),
            bus_capacity: default_bus_capacity(),
        }
    }
}

/// Which flaw analyzer backs the self-correction sub-loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerKind {
    Heuristic,
    Model,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfCorrectionConfig {
    /// Server-side kill switch; requests cannot enable a disabled sub-loop
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Ceiling applied on top of each request's own cap
    #[serde(default = "default_self_correction_max")]
    pub max_iterations: u32,

    #[serde(default)]
    pub analysis_temperature: f32,

    #[serde(default = "default_revision_temperature")]
    pub revision_temperature: f32,

    #[serde(default = "default_analyzer")]
    pub analyzer: AnalyzerKind,

    /// Headings a candidate must contain to pass heuristic analysis
    #[serde(default)]
    pub required_sections: Vec<String>,
}

fn default_self_correction_max() -> u32 {
    promptsmith_core::session::MAX_SELF_CORRECTION_LIMIT
}
fn default_revision_temperature() -> f32 {
    0.2
}
fn default_analyzer() -> AnalyzerKind {
    AnalyzerKind::Model
}

impl Default for SelfCorrectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_iterations: default_self_correction_max(),
            analysis_temperature: 0.0,
            revision_temperature: default_revision_temperature(),
            analyzer: default_analyzer(),
            required_sections: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Overall satisfaction (0–5) at which a session is satisfied
    #[serde(default = "default_target_satisfaction")]
    pub target_satisfaction: f64,

    /// Dimensions the model-assisted judge scores
    #[serde(default = "default_quality_dimensions")]
    pub quality_dimensions: Vec<String>,

    #[serde(default = "default_judge_temperature")]
    pub judge_temperature: f32,

    /// Heuristic rules for the basic evaluator
    #[serde(default)]
    pub rules: EvaluationRules,
}

fn default_target_satisfaction() -> f64 {
    4.0
}
fn default_quality_dimensions() -> Vec<String> {
    ["clarity", "relevance", "completeness", "adherence_to_constraints"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_judge_temperature() -> f32 {
    0.1
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            target_satisfaction: default_target_satisfaction(),
            quality_dimensions: default_quality_dimensions(),
            judge_temperature: default_judge_temperature(),
            rules: EvaluationRules::default(),
        }
    }
}

/// Weighted heuristic rules. Absent rules are skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<LengthRule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<KeywordRule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must_contain_phrases: Option<PhraseRule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bullet_points: Option<BulletRule>,
}

impl Default for EvaluationRules {
    fn default() -> Self {
        Self {
            length: Some(LengthRule {
                min: Some(20),
                max: Some(2000),
                weight: 0.2,
                strict: false,
            }),
            keywords: Some(KeywordRule {
                present: Vec::new(),
                absent: vec!["sorry".into(), "unable".into(), "cannot".into()],
                case_sensitive: false,
                weight: 0.3,
            }),
            must_contain_phrases: None,
            bullet_points: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LengthRule {
    #[serde(default)]
    pub min: Option<usize>,
    #[serde(default)]
    pub max: Option<usize>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Score zero instead of a partial score when out of bounds
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRule {
    #[serde(default)]
    pub present: Vec<String>,
    #[serde(default)]
    pub absent: Vec<String>,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhraseRule {
    pub phrases: Vec<String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulletRule {
    pub min_bullets: usize,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// Which learning module decides between iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnerKind {
    RuleBased,
    LlmAssisted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    #[serde(default = "default_learner")]
    pub learner: LearnerKind,

    /// Metrics scoring below this are called out in feedback
    #[serde(default = "default_low_score_threshold")]
    pub low_score_threshold: f64,

    /// Stop after this many consecutive iterations without improvement; 0 disables
    #[serde(default)]
    pub plateau_patience: u32,

    /// Overall satisfaction at which the model-assisted learner stops
    #[serde(default = "default_learner_stop_threshold")]
    pub stop_threshold: f64,

    #[serde(default = "default_learner_temperature")]
    pub temperature: f32,
}

fn default_learner() -> LearnerKind {
    LearnerKind::RuleBased
}
fn default_low_score_threshold() -> f64 {
    2.5
}
fn default_learner_stop_threshold() -> f64 {
    4.5
}
fn default_learner_temperature() -> f32 {
    0.5
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learner: default_learner(),
            low_score_threshold: default_low_score_threshold(),
            plateau_patience: 0,
            stop_threshold: default_learner_stop_threshold(),
            temperature: default_learner_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisConfig {
    /// Ask a model for a diagnosis before falling back to heuristics
    #[serde(default = "default_true")]
    pub model_assisted: bool,

    #[serde(default)]
    pub temperature: f32,
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            model_assisted: true,
            temperature: 0.0,
        }
    }
}

impl AppConfig {
    /// Load configuration from `PROMPTSMITH_CONFIG` or the default path
    /// (~/.promptsmith/config.toml), then apply environment overrides:
    /// - `GOOGLE_API_KEY` → `providers.gemini.api_key`
    /// - `OPENAI_API_KEY` → `providers.openai.api_key`
    /// - `PROMPTSMITH_DATA_DIR` → knowledge database directory
    /// - `PROMPTSMITH_BACKEND` → `default_backend`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("PROMPTSMITH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_dir().join("config.toml"));
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup. Config-file keys win over
    /// environment keys; the backend and data dir overrides always win.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        for (backend, var) in [("gemini", "GOOGLE_API_KEY"), ("openai", "OPENAI_API_KEY")] {
            let entry = self.providers.entry(backend.to_string()).or_default();
            if entry.api_key.is_none() {
                entry.api_key = lookup(var).filter(|k| !k.is_empty());
            }
        }

        if let Some(dir) = lookup("PROMPTSMITH_DATA_DIR") {
            self.knowledge.path = Some(PathBuf::from(dir).join("knowledge.db"));
        }

        if let Some(backend) = lookup("PROMPTSMITH_BACKEND") {
            self.default_backend = backend
                .parse()
                .map_err(|e: promptsmith_core::Error| ConfigError::ValidationError(e.to_string()))?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".promptsmith")
    }

    /// Settings for one backend, if any were given.
    pub fn provider(&self, backend: BackendKind) -> Option<&ProviderConfig> {
        self.providers.get(backend.as_str())
    }

    /// Whether a backend has what it needs to be built.
    pub fn backend_available(&self, backend: BackendKind) -> bool {
        match backend {
            BackendKind::Offline => true,
            other => self
                .provider(other)
                .is_some_and(|p| p.api_key.is_some()),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("evaluation.target_satisfaction", self.evaluation.target_satisfaction),
            ("learning.stop_threshold", self.learning.stop_threshold),
        ] {
            if !(0.0..=5.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 0.0 and 5.0"
                )));
            }
        }

        for (name, value) in [
            ("self_correction.analysis_temperature", self.self_correction.analysis_temperature),
            ("self_correction.revision_temperature", self.self_correction.revision_temperature),
            ("evaluation.judge_temperature", self.evaluation.judge_temperature),
            ("diagnosis.temperature", self.diagnosis.temperature),
            ("learning.temperature", self.learning.temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 0.0 and 2.0"
                )));
            }
        }

        let cap = self.self_correction.max_iterations;
        if cap == 0 || cap > promptsmith_core::session::MAX_SELF_CORRECTION_LIMIT {
            return Err(ConfigError::ValidationError(format!(
                "self_correction.max_iterations must be between 1 and {}",
                promptsmith_core::session::MAX_SELF_CORRECTION_LIMIT
            )));
        }

        if self.runtime.provider_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "runtime.provider_timeout_secs must be > 0".into(),
            ));
        }

        if self.runtime.event_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "runtime.event_buffer must be > 0".into(),
            ));
        }

        if !matches!(self.knowledge.backend.as_str(), "sqlite" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "knowledge.backend must be 'sqlite' or 'memory', got '{}'",
                self.knowledge.backend
            )));
        }

        let rules = &self.evaluation.rules;
        let weights = [
            rules.length.as_ref().map(|r| r.weight),
            rules.keywords.as_ref().map(|r| r.weight),
            rules.must_contain_phrases.as_ref().map(|r| r.weight),
            rules.bullet_points.as_ref().map(|r| r.weight),
        ];
        if weights.iter().flatten().any(|w| *w < 0.0) {
            return Err(ConfigError::ValidationError(
                "evaluation rule weights must be >= 0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_backend: default_backend(),
            knowledge: KnowledgeConfig::default(),
            gateway: GatewayConfig::default(),
            runtime: RuntimeConfig::default(),
            self_correction: SelfCorrectionConfig::default(),
            evaluation: EvaluationConfig::default(),
            learning: LearningConfig::default(),
            diagnosis: DiagnosisConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_backend, BackendKind::Gemini);
        assert_eq!(config.gateway.port, 8000);
        assert!((config.evaluation.target_satisfaction - 4.0).abs() < f64::EPSILON);
        assert_eq!(config.self_correction.max_iterations, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_backend, config.default_backend);
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(
            parsed.evaluation.quality_dimensions,
            config.evaluation.quality_dimensions
        );
    }

    #[test]
    fn invalid_target_rejected() {
        let mut config = AppConfig::default();
        config.evaluation.target_satisfaction = 7.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn learner_bounds_are_validated() {
        let mut config = AppConfig::default();
        assert_eq!(config.learning.learner, LearnerKind::RuleBased);
        config.learning.stop_threshold = 5.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.learning.temperature = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_knowledge_backend_rejected() {
        let mut config = AppConfig::default();
        config.knowledge.backend = "postgres".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_backend, BackendKind::Gemini);
    }

    #[test]
    fn load_from_file_parses_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r###"
default_backend = "mock"

[knowledge]
backend = "memory"

[self_correction]
max_iterations = 2
analyzer = "heuristic"
required_sections = ["## Output format"]

[evaluation]
target_satisfaction = 3.5

[learning]
learner = "llm_assisted"
stop_threshold = 4.2

[evaluation.rules.bullet_points]
min_bullets = 3
weight = 0.5

[providers.openai]
api_key = "sk-test"
default_model = "gpt-4o"
"###,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_backend, BackendKind::Offline);
        assert_eq!(config.knowledge.backend, "memory");
        assert_eq!(config.self_correction.analyzer, AnalyzerKind::Heuristic);
        assert_eq!(config.self_correction.max_iterations, 2);
        assert_eq!(
            config.self_correction.required_sections,
            vec!["## Output format".to_string()]
        );
        assert_eq!(config.learning.learner, LearnerKind::LlmAssisted);
        assert!((config.learning.stop_threshold - 4.2).abs() < f64::EPSILON);
        assert!((config.learning.low_score_threshold - 2.5).abs() < f64::EPSILON);
        assert_eq!(config.evaluation.rules.bullet_points.as_ref().unwrap().min_bullets, 3);
        // Unlisted rules keep their defaults only when the table is absent
        assert!(config.evaluation.rules.length.is_none());
        assert!(config.backend_available(BackendKind::OpenAi));
        assert!(!config.backend_available(BackendKind::Gemini));
    }

    #[test]
    fn parse_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_backend = [").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn env_overrides_fill_missing_keys() {
        let mut config = AppConfig::default();
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: Some("from-file".into()),
                ..Default::default()
            },
        );
        config
            .apply_env_overrides(|key| match key {
                "GOOGLE_API_KEY" => Some("g-key".into()),
                "OPENAI_API_KEY" => Some("env-key".into()),
                "PROMPTSMITH_DATA_DIR" => Some("/data".into()),
                "PROMPTSMITH_BACKEND" => Some("openai".into()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.provider(BackendKind::Gemini).unwrap().api_key.as_deref(), Some("g-key"));
        assert_eq!(
            config.provider(BackendKind::OpenAi).unwrap().api_key.as_deref(),
            Some("from-file")
        );
        assert_eq!(config.knowledge.database_path(), PathBuf::from("/data/knowledge.db"));
        assert_eq!(config.default_backend, BackendKind::OpenAi);
    }

    #[test]
    fn bad_backend_override_is_a_validation_error() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env_overrides(|key| (key == "PROMPTSMITH_BACKEND").then(|| "claude".into()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn provider_debug_redacts_key() {
        let provider = ProviderConfig {
            api_key: Some("super-secret".into()),
            ..Default::default()
        };
        let debug = format!("{provider:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("default_backend"));
        assert!(toml_str.contains("8000"));
    }
}
