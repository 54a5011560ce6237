//! Session-level streaming events.
//!
//! `RefinementEvent` is what a running session tells its consumer. The
//! gateway forwards each one as a named SSE event whose data is the JSON
//! payload returned by [`RefinementEvent::data`]:
//! - `iteration_result`: a persisted iteration
//! - `self_correction_status`: the sub-loop changed state
//! - `self_correction_analysis`: a flaw report
//! - `self_correction_revision`: a revised candidate
//! - `self_correction_error`: the sub-loop failed and degraded
//! - `system_error`: a component failed
//! - `system_diagnosis`: root cause and recovery strategy
//! - `final_report`: the session report
//! - `complete`: the stream is done
//! - `error`: fatal, terminal; nothing follows

use promptsmith_core::diagnosis::SystemDiagnosis;
use promptsmith_core::iteration::Evaluation;
use serde::{Deserialize, Serialize};

/// States reported by the self-correction sub-loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionStatus {
    Analyzing,
    Revising,
    Validating,
    /// The revision passed validation
    Validated,
    /// The revision still has flaws
    Failed,
    /// The candidate is accepted as-is or after revision
    Accepted,
    /// The attempt cap was reached
    Exhausted,
    /// The reviser returned the candidate unchanged
    Stalled,
}

impl CorrectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyzing => "analyzing",
            Self::Revising => "revising",
            Self::Validating => "validating",
            Self::Validated => "validated",
            Self::Failed => "failed",
            Self::Accepted => "accepted",
            Self::Exhausted => "exhausted",
            Self::Stalled => "stalled",
        }
    }
}

/// Events emitted by a refinement session, in strict order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum RefinementEvent {
    /// An iteration was appended to the Knowledge Base.
    IterationResult {
        iteration: u32,
        prompt: String,
        rationale: String,
        raw_ai_output: String,
        evaluation: Evaluation,
    },

    SelfCorrectionStatus {
        status: CorrectionStatus,
        iteration: u32,
        max_iterations: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    SelfCorrectionAnalysis {
        feedback_summary: String,
        analysis_summary: String,
        #[serde(default)]
        flaws: Vec<String>,
    },

    SelfCorrectionRevision { revised_prompt: String },

    SelfCorrectionError { message: String },

    SystemError { component: String, error: String },

    SystemDiagnosis(SystemDiagnosis),

    FinalReport { content: String },

    Complete {},

    /// Fatal. `complete` never follows.
    Error { message: String },
}

impl RefinementEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::IterationResult { .. } => "iteration_result",
            Self::SelfCorrectionStatus { .. } => "self_correction_status",
            Self::SelfCorrectionAnalysis { .. } => "self_correction_analysis",
            Self::SelfCorrectionRevision { .. } => "self_correction_revision",
            Self::SelfCorrectionError { .. } => "self_correction_error",
            Self::SystemError { .. } => "system_error",
            Self::SystemDiagnosis(_) => "system_diagnosis",
            Self::FinalReport { .. } => "final_report",
            Self::Complete {} => "complete",
            Self::Error { .. } => "error",
        }
    }

    /// The JSON payload, without the event name.
    pub fn data(&self) -> serde_json::Value {
        serde_json::to_value(self)
            .ok()
            .and_then(|mut v| v.get_mut("data").map(serde_json::Value::take))
            .unwrap_or_else(|| serde_json::json!({}))
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete {} | Self::Error { .. })
    }

    pub(crate) fn status(
        status: CorrectionStatus,
        iteration: u32,
        max_iterations: u32,
        message: Option<String>,
    ) -> Self {
        Self::SelfCorrectionStatus {
            status,
            iteration,
            max_iterations,
            message,
        }
    }
}
