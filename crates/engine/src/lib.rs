//! Refinement orchestration engine for Promptsmith.
//!
//! Drives a prompt through repeated enhance → deploy → evaluate → decide
//! iterations, with an optional bounded self-correction pass between
//! enhancement and deployment, and streams the session as ordered events.

pub mod cancel;
pub mod correction;
pub mod diagnoser;
pub mod engine;
pub mod enhancer;
pub mod evaluation;
pub mod learning;
pub mod orchestrator;
pub mod registry;
pub mod report;
pub mod sink;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use cancel::{CancelHandle, CancelToken, cancel_pair};
pub use correction::{CorrectionOutcome, HeuristicAnalyzer, ModelAnalyzer, ModelReviser, SelfCorrector};
pub use diagnoser::SystemDiagnoser;
pub use engine::{Engine, RefinementRun};
pub use enhancer::{ArchitectEnhancer, LlmAssistedEnhancer, RuleBasedEnhancer};
pub use evaluation::{BasicEvaluator, LlmJudge};
pub use learning::{LlmAssistedLearner, RuleBasedLearner};
pub use orchestrator::{Orchestrator, SessionOutcome};
pub use registry::{Capabilities, CapabilityRegistry, credential_env};
pub use report::{FinalReport, TrajectoryPoint};
pub use sink::EventSink;
pub use stream_event::{CorrectionStatus, RefinementEvent};
