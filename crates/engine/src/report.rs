//! Final report, computed from Knowledge Base records only.

use chrono::{DateTime, Utc};
use promptsmith_core::iteration::IterationRecord;
use promptsmith_core::session::{Session, SessionId, SessionStatus, StopReason};
use serde::{Deserialize, Serialize};

/// One row of the score trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub iteration: u32,
    pub overall_satisfaction: f64,
    pub satisfied: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub session_id: SessionId,
    pub initial_prompt: String,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    pub iterations: u32,

    /// Highest-scoring iteration; the earliest one wins ties
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_iteration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_rationale: Option<String>,

    pub trajectory: Vec<TrajectoryPoint>,
    pub generated_at: DateTime<Utc>,
}

impl FinalReport {
    /// Build from a session and its ordered records.
    ///
    /// `status`/`stop_reason` override the stored values for reports built
    /// just before the session is finished.
    pub fn build(
        session: &Session,
        records: &[IterationRecord],
        status: SessionStatus,
        stop_reason: Option<StopReason>,
    ) -> Self {
        let best = records.iter().fold(None::<&IterationRecord>, |best, r| match best {
            Some(b) if b.evaluation.overall_satisfaction >= r.evaluation.overall_satisfaction => Some(b),
            _ => Some(r),
        });

        Self {
            session_id: session.id.clone(),
            initial_prompt: session.initial_prompt.clone(),
            status,
            stop_reason,
            iterations: records.len() as u32,
            best_iteration: best.map(|r| r.sequence),
            best_prompt: best.map(|r| r.prompt.clone()),
            best_score: best.map(|r| r.evaluation.overall_satisfaction),
            best_rationale: best.map(|r| r.rationale.clone()),
            trajectory: records
                .iter()
                .map(|r| TrajectoryPoint {
                    iteration: r.sequence,
                    overall_satisfaction: r.evaluation.overall_satisfaction,
                    satisfied: r.evaluation.satisfied,
                })
                .collect(),
            generated_at: Utc::now(),
        }
    }

    /// Build from stored session state.
    pub fn from_stored(session: &Session, records: &[IterationRecord]) -> Self {
        Self::build(session, records, session.status, session.stop_reason)
    }

    /// Markdown rendering, used as the `final_report` event content.
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("# Refinement Report\n\n");
        out.push_str(&format!("- Session: `{}`\n", self.session_id));
        out.push_str(&format!("- Status: {}", self.status.as_str()));
        if let Some(reason) = self.stop_reason {
            out.push_str(&format!(" ({})", reason.as_str()));
        }
        out.push('\n');
        out.push_str(&format!("- Iterations: {}\n\n", self.iterations));

        out.push_str("## Original Prompt\n\n");
        out.push_str(&self.initial_prompt);
        out.push_str("\n\n");

        match (&self.best_prompt, self.best_iteration, self.best_score) {
            (Some(prompt), Some(iteration), Some(score)) => {
                out.push_str(&format!(
                    "## Best Prompt (iteration {iteration}, score {score:.2}/5.00)\n\n{prompt}\n\n"
                ));
                if let Some(rationale) = &self.best_rationale {
                    out.push_str(&format!("## Rationale\n\n{rationale}\n\n"));
                }
            }
            _ => out.push_str("No iteration completed, so there is no refined prompt.\n\n"),
        }

        if !self.trajectory.is_empty() {
            out.push_str("## Trajectory\n\n| Iteration | Score | Satisfied |\n|---|---|---|\n");
            for point in &self.trajectory {
                out.push_str(&format!(
                    "| {} | {:.2} | {} |\n",
                    point.iteration,
                    point.overall_satisfaction,
                    if point.satisfied { "yes" } else { "no" }
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptsmith_core::iteration::Evaluation;
    use promptsmith_core::session::RefinementConfig;
    use std::collections::BTreeMap;

    fn record(session: &Session, sequence: u32, score: f64) -> IterationRecord {
        let prompt = format!("Prompt v{sequence}");
        IterationRecord {
            session_id: session.id.clone(),
            sequence,
            evaluation: Evaluation::new(&prompt, BTreeMap::new(), score, 4.0),
            prompt,
            rationale: format!("Rationale v{sequence}"),
            raw_output: "out".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn best_is_highest_and_earliest_on_ties() {
        let session = Session::start("Explain gravity", RefinementConfig::default());
        let records = vec![
            record(&session, 1, 2.0),
            record(&session, 2, 3.5),
            record(&session, 3, 3.5),
        ];
        let report = FinalReport::build(
            &session,
            &records,
            SessionStatus::Completed,
            Some(StopReason::IterationCap),
        );
        assert_eq!(report.best_iteration, Some(2));
        assert_eq!(report.best_prompt.as_deref(), Some("Prompt v2"));
        assert_eq!(report.trajectory.len(), 3);

        let md = report.to_markdown();
        assert!(md.contains("completed (iteration_cap)"));
        assert!(md.contains("## Best Prompt (iteration 2, score 3.50/5.00)"));
        assert!(md.contains("| 3 | 3.50 | no |"));
    }

    #[test]
    fn empty_session_report() {
        let session = Session::start("Explain gravity", RefinementConfig::default());
        let report = FinalReport::from_stored(&session, &[]);
        assert_eq!(report.iterations, 0);
        assert!(report.best_prompt.is_none());
        assert!(report.to_markdown().contains("no refined prompt"));
    }
}
