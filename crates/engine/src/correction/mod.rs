//! Self-correction sub-loop.
//!
//! A bounded state machine that validates a model-produced candidate prompt
//! before it is deployed:
//!
//! ```text
//! ANALYZING → (clean) → ACCEPTED
//!           → REVISING → VALIDATING → (clean) → ACCEPTED
//!                                   → (flawed, attempt < cap) → ANALYZING
//!                                   → (flawed, attempt = cap) → EXHAUSTED
//! ```
//!
//! Only the first attempt calls the analyzer; every later attempt starts
//! from the previous validation report. Exhaustion, a stalled reviser, or
//! a provider failure all degrade to the original candidate plus a
//! diagnosis. None of them fails the session.

pub mod analyzer;
pub mod reviser;

pub use analyzer::{HeuristicAnalyzer, ModelAnalyzer};
pub use reviser::ModelReviser;

use std::sync::Arc;

use promptsmith_core::capability::{FlawAnalyzer, FlawReport, PromptReviser};
use promptsmith_core::diagnosis::{Diagnoser, FailureContext, SystemDiagnosis};
use promptsmith_core::error::{ProviderError, ValidationError};
use tracing::{debug, info, warn};

use crate::sink::EventSink;
use crate::stream_event::{CorrectionStatus, RefinementEvent};

const COMPONENT: &str = "self_correction";

/// Result of one pass through the sub-loop.
#[derive(Debug, Clone)]
pub struct CorrectionOutcome {
    /// The prompt to deploy
    pub prompt: String,
    /// Whether `prompt` is a validated revision rather than the original
    pub revised: bool,
    /// Attempts used, never above the cap
    pub attempts: u32,
    pub diagnosis: Option<SystemDiagnosis>,
}

pub struct SelfCorrector {
    analyzer: Arc<dyn FlawAnalyzer>,
    reviser: Arc<dyn PromptReviser>,
    diagnoser: Arc<dyn Diagnoser>,
    cap: u32,
}

impl SelfCorrector {
    pub fn new(
        analyzer: Arc<dyn FlawAnalyzer>,
        reviser: Arc<dyn PromptReviser>,
        diagnoser: Arc<dyn Diagnoser>,
        cap: u32,
    ) -> Self {
        Self {
            analyzer,
            reviser,
            diagnoser,
            cap: cap.max(1),
        }
    }

    pub fn cap(&self) -> u32 {
        self.cap
    }

    /// Validate `candidate` (derived from `source`) for refinement iteration `iteration`.
    pub async fn correct(
        &self,
        source: &str,
        candidate: &str,
        iteration: u32,
        sink: &EventSink,
    ) -> CorrectionOutcome {
        info!(iteration, cap = self.cap, analyzer = %self.analyzer.name(), "Self-correction started");

        let mut current = candidate.to_string();
        let mut pending: Option<FlawReport> = None;

        for attempt in 1..=self.cap {
            self.status(sink, CorrectionStatus::Analyzing, attempt, None).await;

            let report = match pending.take() {
                Some(report) => report,
                None => match self.analyzer.analyze(source, &current).await {
                    Ok(report) => {
                        analysis_event(sink, &report).await;
                        report
                    }
                    Err(e) => {
                        return self
                            .degrade(candidate, attempt, iteration, ValidationError::AnalysisFailed(e.to_string()), &e, sink)
                            .await;
                    }
                },
            };

            if !report.has_flaws() {
                self.status(sink, CorrectionStatus::Accepted, attempt, None).await;
                return CorrectionOutcome {
                    revised: current != candidate,
                    prompt: current,
                    attempts: attempt,
                    diagnosis: None,
                };
            }

            self.status(sink, CorrectionStatus::Revising, attempt, Some(report.feedback_summary.clone()))
                .await;
            let revision = match self.reviser.revise(&current, &report).await {
                Ok(revision) => revision,
                Err(e) => {
                    return self
                        .degrade(candidate, attempt, iteration, ValidationError::RevisionFailed(e.to_string()), &e, sink)
                        .await;
                }
            };
            sink.emit(RefinementEvent::SelfCorrectionRevision {
                revised_prompt: revision.clone(),
            })
            .await;

            if revision.trim() == current.trim() {
                warn!(iteration, attempt, "Reviser returned the candidate unchanged");
                self.status(
                    sink,
                    CorrectionStatus::Stalled,
                    attempt,
                    Some("The reviser made no changes.".into()),
                )
                .await;
                let failure = FailureContext::new(
                    COMPONENT,
                    "stalled",
                    format!("Revision attempt {attempt} returned the candidate unchanged: {}", report.feedback_summary),
                )
                .at_iteration(iteration);
                return self.give_up(candidate, attempt, failure, sink).await;
            }

            self.status(sink, CorrectionStatus::Validating, attempt, None).await;
            let validation = match self.analyzer.analyze(source, &revision).await {
                Ok(validation) => validation,
                Err(e) => {
                    return self
                        .degrade(candidate, attempt, iteration, ValidationError::AnalysisFailed(e.to_string()), &e, sink)
                        .await;
                }
            };
            analysis_event(sink, &validation).await;
            current = revision;

            if !validation.has_flaws() {
                self.status(sink, CorrectionStatus::Validated, attempt, None).await;
                self.status(sink, CorrectionStatus::Accepted, attempt, None).await;
                return CorrectionOutcome {
                    prompt: current,
                    revised: true,
                    attempts: attempt,
                    diagnosis: None,
                };
            }

            debug!(iteration, attempt, flaws = validation.flaws.len(), "Revision still flawed");
            self.status(
                sink,
                CorrectionStatus::Failed,
                attempt,
                Some(validation.feedback_summary.clone()),
            )
            .await;
            pending = Some(validation);
        }

        let last_feedback = pending
            .map(|r| r.feedback_summary)
            .unwrap_or_default();
        self.status(sink, CorrectionStatus::Exhausted, self.cap, None).await;
        let err = ValidationError::Exhausted {
            attempts: self.cap,
            last_feedback,
        };
        warn!(iteration, error = %err, "Self-correction exhausted");
        let failure = FailureContext::new(COMPONENT, "exhausted", err.to_string()).at_iteration(iteration);
        self.give_up(candidate, self.cap, failure, sink).await
    }

    async fn status(&self, sink: &EventSink, status: CorrectionStatus, attempt: u32, message: Option<String>) {
        sink.emit(RefinementEvent::status(status, attempt, self.cap, message))
            .await;
    }

    /// A provider call inside the sub-loop failed.
    async fn degrade(
        &self,
        candidate: &str,
        attempt: u32,
        iteration: u32,
        err: ValidationError,
        cause: &ProviderError,
        sink: &EventSink,
    ) -> CorrectionOutcome {
        warn!(iteration, attempt, error = %err, "Self-correction failed");
        sink.emit(RefinementEvent::SelfCorrectionError {
            message: err.to_string(),
        })
        .await;
        let failure = FailureContext::new(COMPONENT, cause.kind(), err.to_string()).at_iteration(iteration);
        self.give_up(candidate, attempt, failure, sink).await
    }

    /// Fall back to the original candidate with a diagnosis.
    async fn give_up(
        &self,
        candidate: &str,
        attempts: u32,
        failure: FailureContext,
        sink: &EventSink,
    ) -> CorrectionOutcome {
        let diagnosis = self.diagnoser.diagnose(&failure).await;
        sink.emit(RefinementEvent::SystemDiagnosis(diagnosis.clone()))
            .await;
        CorrectionOutcome {
            prompt: candidate.to_string(),
            revised: false,
            attempts,
            diagnosis: Some(diagnosis),
        }
    }
}

async fn analysis_event(sink: &EventSink, report: &FlawReport) {
    sink.emit(RefinementEvent::SelfCorrectionAnalysis {
        feedback_summary: report.feedback_summary.clone(),
        analysis_summary: report.analysis_summary.clone(),
        flaws: report.flaws.clone(),
    })
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnoser::SystemDiagnoser;
    use crate::sink;
    use async_trait::async_trait;
    use promptsmith_core::diagnosis::RecoveryStrategy;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// Returns scripted reports in order, repeating the last one.
    struct ScriptedAnalyzer {
        reports: Vec<Result<FlawReport, ProviderError>>,
        calls: Mutex<usize>,
    }

    impl ScriptedAnalyzer {
        fn new(reports: Vec<Result<FlawReport, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                reports,
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl FlawAnalyzer for ScriptedAnalyzer {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn analyze(&self, _source: &str, _candidate: &str) -> Result<FlawReport, ProviderError> {
            let mut calls = self.calls.lock().unwrap();
            let idx = (*calls).min(self.reports.len() - 1);
            *calls += 1;
            self.reports[idx].clone()
        }
    }

    /// Appends a revision marker to the candidate each call.
    struct CountingReviser {
        calls: Mutex<usize>,
        unchanged: bool,
    }

    impl CountingReviser {
        fn new(unchanged: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(0),
                unchanged,
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl PromptReviser for CountingReviser {
        fn name(&self) -> &str {
            "counting"
        }

        async fn revise(&self, candidate: &str, _report: &FlawReport) -> Result<String, ProviderError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if self.unchanged {
                Ok(candidate.to_string())
            } else {
                Ok(format!("{candidate} [rev {}]", *calls))
            }
        }
    }

    fn flawed() -> Result<FlawReport, ProviderError> {
        Ok(FlawReport {
            flaws: vec!["ambiguous".into()],
            feedback_summary: "Still ambiguous.".into(),
            analysis_summary: "Needs scope.".into(),
        })
    }

    fn clean() -> Result<FlawReport, ProviderError> {
        Ok(FlawReport::clean("fine"))
    }

    fn corrector(analyzer: Arc<ScriptedAnalyzer>, reviser: Arc<CountingReviser>, cap: u32) -> SelfCorrector {
        SelfCorrector::new(analyzer, reviser, Arc::new(SystemDiagnoser::heuristic()), cap)
    }

    fn drain(rx: &mut mpsc::Receiver<RefinementEvent>) -> Vec<RefinementEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn statuses(events: &[RefinementEvent]) -> Vec<CorrectionStatus> {
        events
            .iter()
            .filter_map(|e| match e {
                RefinementEvent::SelfCorrectionStatus { status, .. } => Some(*status),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn clean_first_analysis_is_accepted_without_revision() {
        let analyzer = ScriptedAnalyzer::new(vec![clean()]);
        let reviser = CountingReviser::new(false);
        let (sink, mut rx) = sink::channel(64);

        let outcome = corrector(analyzer.clone(), reviser.clone(), 3)
            .correct("src", "candidate", 1, &sink)
            .await;

        assert_eq!(outcome.prompt, "candidate");
        assert!(!outcome.revised);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.diagnosis.is_none());
        assert_eq!(reviser.calls(), 0);
        assert_eq!(analyzer.calls(), 1);
        assert_eq!(
            statuses(&drain(&mut rx)),
            vec![CorrectionStatus::Analyzing, CorrectionStatus::Accepted]
        );
    }

    #[tokio::test]
    async fn validated_revision_is_accepted() {
        let analyzer = ScriptedAnalyzer::new(vec![flawed(), clean()]);
        let reviser = CountingReviser::new(false);
        let (sink, mut rx) = sink::channel(64);

        let outcome = corrector(analyzer, reviser.clone(), 3)
            .correct("src", "candidate", 1, &sink)
            .await;

        assert_eq!(outcome.prompt, "candidate [rev 1]");
        assert!(outcome.revised);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(reviser.calls(), 1);
        let events = drain(&mut rx);
        assert_eq!(
            statuses(&events),
            vec![
                CorrectionStatus::Analyzing,
                CorrectionStatus::Revising,
                CorrectionStatus::Validating,
                CorrectionStatus::Validated,
                CorrectionStatus::Accepted,
            ]
        );
        assert!(events.iter().any(|e| e.event_type() == "self_correction_revision"));
    }

    #[tokio::test]
    async fn always_flawed_exhausts_at_cap() {
        let analyzer = ScriptedAnalyzer::new(vec![flawed()]);
        let reviser = CountingReviser::new(false);
        let (sink, mut rx) = sink::channel(128);

        let outcome = corrector(analyzer.clone(), reviser.clone(), 3)
            .correct("src", "candidate", 2, &sink)
            .await;

        assert_eq!(outcome.prompt, "candidate");
        assert!(!outcome.revised);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(reviser.calls(), 3);
        // one initial analysis plus one validation per attempt
        assert_eq!(analyzer.calls(), 4);
        let diagnosis = outcome.diagnosis.unwrap();
        assert_eq!(diagnosis.recovery_strategy, RecoveryStrategy::AbortIteration);
        assert_eq!(diagnosis.component, "self_correction");

        let events = drain(&mut rx);
        let states = statuses(&events);
        assert_eq!(states.iter().filter(|s| **s == CorrectionStatus::Analyzing).count(), 3);
        assert_eq!(states.last(), Some(&CorrectionStatus::Exhausted));
        assert_eq!(events.last().map(|e| e.event_type()), Some("system_diagnosis"));
        let max_attempt = events
            .iter()
            .filter_map(|e| match e {
                RefinementEvent::SelfCorrectionStatus { iteration, max_iterations, .. } => {
                    assert_eq!(*max_iterations, 3);
                    Some(*iteration)
                }
                _ => None,
            })
            .max();
        assert_eq!(max_attempt, Some(3));
    }

    #[tokio::test]
    async fn unchanged_revision_stalls() {
        let analyzer = ScriptedAnalyzer::new(vec![flawed()]);
        let reviser = CountingReviser::new(true);
        let (sink, mut rx) = sink::channel(64);

        let outcome = corrector(analyzer, reviser.clone(), 3)
            .correct("src", "candidate", 1, &sink)
            .await;

        assert_eq!(outcome.prompt, "candidate");
        assert_eq!(reviser.calls(), 1);
        assert!(outcome.diagnosis.is_some());
        assert!(statuses(&drain(&mut rx)).contains(&CorrectionStatus::Stalled));
    }

    #[tokio::test]
    async fn provider_failure_degrades_to_original() {
        let analyzer = ScriptedAnalyzer::new(vec![Err(ProviderError::Timeout("slow".into()))]);
        let reviser = CountingReviser::new(false);
        let (sink, mut rx) = sink::channel(64);

        let outcome = corrector(analyzer, reviser.clone(), 3)
            .correct("src", "candidate", 1, &sink)
            .await;

        assert_eq!(outcome.prompt, "candidate");
        assert_eq!(reviser.calls(), 0);
        assert_eq!(
            outcome.diagnosis.map(|d| d.recovery_strategy),
            Some(RecoveryStrategy::Retry)
        );
        let names: Vec<&str> = drain(&mut rx).iter().map(|e| e.event_type()).collect();
        assert_eq!(
            names,
            vec!["self_correction_status", "self_correction_error", "system_diagnosis"]
        );
    }
}
