//! Capability traits: the swappable roles the orchestrator drives.
//!
//! Each role is chosen per session from a closed set of variants; the
//! orchestrator only ever sees these traits:
//! - [`PromptEnhancer`] rewrites the current prompt
//! - [`Deployer`] sends a prompt to the target model
//! - [`EvaluationEngine`] scores the model output
//! - [`LearningModule`] decides whether another iteration is worthwhile
//! - [`FlawAnalyzer`] and [`PromptReviser`] back the self-correction sub-loop

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::iteration::Evaluation;

/// Input to one enhancement call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancementContext {
    /// The prompt to improve (the previous iteration's accepted prompt)
    pub prompt: String,

    /// What the user is ultimately trying to achieve (the initial prompt)
    pub objective: String,

    /// Learner feedback from the previous iteration; absent on iteration 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,

    /// 1-based iteration number
    pub iteration: u32,
}

/// An enhanced prompt and why it changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enhancement {
    pub prompt: String,
    pub rationale: String,
}

impl Enhancement {
    pub fn new(prompt: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            rationale: rationale.into(),
        }
    }
}

#[async_trait]
pub trait PromptEnhancer: Send + Sync {
    fn name(&self) -> &str;

    async fn enhance(&self, ctx: &EnhancementContext) -> std::result::Result<Enhancement, ProviderError>;
}

/// Sends a prompt to the target model.
#[async_trait]
pub trait Deployer: Send + Sync {
    fn name(&self) -> &str;

    async fn deploy(&self, prompt: &str, temperature: f32) -> std::result::Result<String, ProviderError>;
}

/// Scores a model output against the user's objective.
#[async_trait]
pub trait EvaluationEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn evaluate(
        &self,
        objective: &str,
        prompt: &str,
        output: &str,
    ) -> std::result::Result<Evaluation, ProviderError>;
}

/// The learner's verdict after an iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Iterate again, steering the enhancer with `feedback`.
    Continue { feedback: String },
    /// No further iteration is worthwhile.
    Stop { reason: String },
}

#[async_trait]
pub trait LearningModule: Send + Sync {
    fn name(&self) -> &str;

    /// Decide from the session's evaluations so far (oldest first).
    /// `prompt` is the prompt the latest evaluation scored.
    async fn decide(
        &self,
        prompt: &str,
        history: &[Evaluation],
    ) -> std::result::Result<Decision, ProviderError>;
}

/// Typed output of one flaw analysis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlawReport {
    #[serde(default)]
    pub flaws: Vec<String>,
    #[serde(default)]
    pub feedback_summary: String,
    #[serde(default)]
    pub analysis_summary: String,
}

impl FlawReport {
    /// A report with no findings.
    pub fn clean(summary: impl Into<String>) -> Self {
        Self {
            flaws: Vec::new(),
            feedback_summary: "No flaws found.".into(),
            analysis_summary: summary.into(),
        }
    }

    pub fn has_flaws(&self) -> bool {
        !self.flaws.is_empty()
    }
}

/// Inspects a candidate prompt for flaws.
#[async_trait]
pub trait FlawAnalyzer: Send + Sync {
    fn name(&self) -> &str;

    /// `source` is the prompt the candidate was derived from.
    async fn analyze(&self, source: &str, candidate: &str) -> std::result::Result<FlawReport, ProviderError>;
}

/// Produces a revised candidate that addresses a flaw report.
#[async_trait]
pub trait PromptReviser: Send + Sync {
    fn name(&self) -> &str;

    async fn revise(
        &self,
        candidate: &str,
        report: &FlawReport,
    ) -> std::result::Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_serializes_with_tag() {
        let json = serde_json::to_value(Decision::Continue {
            feedback: "be specific".into(),
        })
        .unwrap();
        assert_eq!(json["decision"], "continue");
        assert_eq!(json["feedback"], "be specific");
    }

    #[test]
    fn flaw_report_parses_partial_json() {
        let report: FlawReport =
            serde_json::from_str(r#"{"flaws":["missing constraints"]}"#).unwrap();
        assert!(report.has_flaws());
        assert!(report.feedback_summary.is_empty());
        assert!(!FlawReport::clean("ok").has_flaws());
    }
}
