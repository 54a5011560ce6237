//! Iteration records: the append-only unit of persisted refinement history.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::session::SessionId;

/// Hex SHA-256 of a prompt's text. Ties an evaluation to the exact prompt it scored.
pub fn prompt_fingerprint(prompt: &str) -> String {
    hex::encode(Sha256::digest(prompt.as_bytes()))
}

/// The structured outcome of scoring one deployed prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Per-metric scores on the 0–5 scale
    pub metric_scores: BTreeMap<String, f64>,

    /// Aggregate score on the 0–5 scale
    pub overall_satisfaction: f64,

    /// Whether `overall_satisfaction` met the stopping threshold
    pub satisfied: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualitative_feedback: Option<String>,

    /// Fingerprint of the prompt that produced the scored output
    pub prompt_fingerprint: String,
}

impl Evaluation {
    pub fn new(
        prompt: &str,
        metric_scores: BTreeMap<String, f64>,
        overall_satisfaction: f64,
        threshold: f64,
    ) -> Self {
        Self {
            metric_scores,
            overall_satisfaction,
            satisfied: overall_satisfaction >= threshold,
            qualitative_feedback: None,
            prompt_fingerprint: prompt_fingerprint(prompt),
        }
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.qualitative_feedback = Some(feedback.into());
        self
    }

    /// Whether this evaluation was computed for `prompt`.
    pub fn scored(&self, prompt: &str) -> bool {
        self.prompt_fingerprint == prompt_fingerprint(prompt)
    }
}

/// One completed enhance → deploy → evaluate pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub session_id: SessionId,

    /// 1-based, strictly increasing, gapless within a session
    pub sequence: u32,

    /// The accepted prompt that was deployed
    pub prompt: String,

    pub rationale: String,

    pub raw_output: String,

    pub evaluation: Evaluation,

    pub created_at: DateTime<Utc>,
}
