//! Capability registry: resolves a session's provider selection once.
//!
//! Every capability is a closed set of variants chosen by enum; the
//! registry turns a `RefinementConfig` into concrete trait objects wired
//! to the selected backend. Resolution happens before a session exists, so
//! a missing backend is a configuration error, never a failed session.

use std::sync::Arc;

use promptsmith_config::{AnalyzerKind, AppConfig, LearnerKind};
use promptsmith_core::capability::{
    Deployer, EvaluationEngine, FlawAnalyzer, LearningModule, PromptEnhancer,
};
use promptsmith_core::diagnosis::Diagnoser;
use promptsmith_core::error::{Error, Result};
use promptsmith_core::session::{BackendKind, EnhancerKind, EvaluationMode, RefinementConfig};
use promptsmith_providers::{ModelDeployer, ProviderRouter};
use tracing::{info, warn};

use crate::correction::{HeuristicAnalyzer, ModelAnalyzer, ModelReviser, SelfCorrector};
use crate::diagnoser::SystemDiagnoser;
use crate::enhancer::{ArchitectEnhancer, LlmAssistedEnhancer, RuleBasedEnhancer};
use crate::evaluation::{BasicEvaluator, LlmJudge};
use crate::learning::{LlmAssistedLearner, RuleBasedLearner};

/// The resolved capability set for one session.
#[derive(Clone)]
pub struct Capabilities {
    pub enhancer: Arc<dyn PromptEnhancer>,
    pub deployer: Arc<dyn Deployer>,
    pub evaluator: Arc<dyn EvaluationEngine>,
    pub learner: Arc<dyn LearningModule>,
    pub diagnoser: Arc<dyn Diagnoser>,
    /// Present only when self-correction applies to this session
    pub corrector: Option<Arc<SelfCorrector>>,
}

pub struct CapabilityRegistry {
    router: Arc<ProviderRouter>,
    config: Arc<AppConfig>,
}

/// The environment variable that configures a backend's credentials.
pub fn credential_env(kind: BackendKind) -> Option<&'static str> {
    match kind {
        BackendKind::Gemini => Some("GOOGLE_API_KEY"),
        BackendKind::OpenAi => Some("OPENAI_API_KEY"),
        BackendKind::Offline => None,
    }
}

impl CapabilityRegistry {
    pub fn new(router: Arc<ProviderRouter>, config: Arc<AppConfig>) -> Self {
        Self { router, config }
    }

    pub fn router(&self) -> &ProviderRouter {
        &self.router
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn resolve(&self, request: &RefinementConfig) -> Result<Capabilities> {
        let backend = request.providers.orchestrator;
        let client = self.router.client(backend).ok_or_else(|| {
            let hint = credential_env(backend)
                .map(|var| format!("; set {var} or add an api_key under [providers.{backend}]"))
                .unwrap_or_default();
            Error::config(format!("Backend '{backend}' is not configured{hint}"))
        })?;

        let app = &self.config;
        let target = app.evaluation.target_satisfaction;

        let enhancer: Arc<dyn PromptEnhancer> = match request.providers.enhancer {
            EnhancerKind::RuleBased => Arc::new(RuleBasedEnhancer::new()),
            EnhancerKind::LlmAssisted => Arc::new(LlmAssistedEnhancer::new(client.clone())),
            EnhancerKind::Architect => Arc::new(ArchitectEnhancer::new(
                client.clone(),
                request.architect_temperature,
            )),
        };

        let evaluator: Arc<dyn EvaluationEngine> = match request.evaluation_mode {
            EvaluationMode::Basic => Arc::new(BasicEvaluator::new(app.evaluation.rules.clone(), target)),
            EvaluationMode::LlmAssisted => Arc::new(LlmJudge::new(
                client.clone(),
                app.evaluation.quality_dimensions.clone(),
                app.evaluation.judge_temperature,
                target,
            )),
        };

        let learner: Arc<dyn LearningModule> = match app.learning.learner {
            LearnerKind::RuleBased => Arc::new(RuleBasedLearner::new(&app.learning)),
            LearnerKind::LlmAssisted => Arc::new(LlmAssistedLearner::new(client.clone(), &app.learning)),
        };

        let diagnoser: Arc<dyn Diagnoser> = if app.diagnosis.model_assisted {
            Arc::new(SystemDiagnoser::with_model(client.clone(), app.diagnosis.temperature))
        } else {
            Arc::new(SystemDiagnoser::heuristic())
        };

        let corrector = self.corrector(request, &client, diagnoser.clone());

        Ok(Capabilities {
            enhancer,
            deployer: Arc::new(ModelDeployer::new(client)),
            evaluator,
            learner,
            diagnoser,
            corrector,
        })
    }

    fn corrector(
        &self,
        request: &RefinementConfig,
        client: &promptsmith_providers::ModelClient,
        diagnoser: Arc<dyn Diagnoser>,
    ) -> Option<Arc<SelfCorrector>> {
        if !request.enable_self_correction {
            return None;
        }
        let enhancer = request.providers.enhancer;
        if !enhancer.supports_self_correction() {
            info!(enhancer = %enhancer.as_str(), "Self-correction requested but ignored for this enhancer");
            return None;
        }
        let settings = &self.config.self_correction;
        if !settings.enabled {
            warn!("Self-correction requested but disabled by server configuration");
            return None;
        }

        let heuristic = HeuristicAnalyzer::new(settings.required_sections.clone());
        let analyzer: Arc<dyn FlawAnalyzer> = match settings.analyzer {
            AnalyzerKind::Heuristic => Arc::new(heuristic),
            AnalyzerKind::Model => Arc::new(ModelAnalyzer::new(
                client.clone(),
                heuristic,
                request.model_temperature,
                settings.analysis_temperature,
            )),
        };
        let reviser = Arc::new(ModelReviser::new(client.clone(), settings.revision_temperature));
        let cap = request.self_correction_cap(settings.max_iterations);

        Some(Arc::new(SelfCorrector::new(analyzer, reviser, diagnoser, cap)))
    }
}
