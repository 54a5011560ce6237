//! The refinement loop: ENHANCE → SELF_CORRECT? → DEPLOY → EVALUATE → DECIDE.
//!
//! One `Orchestrator` drives exactly one session. Every completed iteration
//! is appended to the Knowledge Base before its `iteration_result` event is
//! emitted, so a consumer never sees an iteration that is not durable.
//! The stream always ends with either `final_report` + `complete`, or a
//! single fatal `error`.

use std::sync::Arc;

use chrono::Utc;
use promptsmith_core::capability::{Decision, EnhancementContext};
use promptsmith_core::diagnosis::FailureContext;
use promptsmith_core::error::{KnowledgeError, ProviderError};
use promptsmith_core::event::{DomainEvent, EventBus};
use promptsmith_core::iteration::{Evaluation, IterationRecord};
use promptsmith_core::knowledge::KnowledgeBase;
use promptsmith_core::session::{Session, SessionId, SessionStatus, StopReason};
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::registry::Capabilities;
use crate::report::FinalReport;
use crate::sink::EventSink;
use crate::stream_event::RefinementEvent;

/// How a session ended.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub stop_reason: StopReason,
    /// Records persisted for this session
    pub iterations: u32,
    /// Absent only when the Knowledge Base failed
    pub report: Option<FinalReport>,
}

/// Why an iteration could not complete.
enum Halt {
    Provider {
        component: &'static str,
        error: ProviderError,
    },
    Persistence(KnowledgeError),
}

impl Halt {
    fn provider(component: &'static str) -> impl FnOnce(ProviderError) -> Halt {
        move |error| Halt::Provider { component, error }
    }
}

/// Per-iteration loop state carried into the next pass.
struct LoopState {
    prompt: String,
    feedback: Option<String>,
    history: Vec<Evaluation>,
    persisted: u32,
}

pub struct Orchestrator {
    caps: Capabilities,
    kb: Arc<dyn KnowledgeBase>,
    bus: Arc<EventBus>,
}

impl Orchestrator {
    pub fn new(caps: Capabilities, kb: Arc<dyn KnowledgeBase>, bus: Arc<EventBus>) -> Self {
        Self { caps, kb, bus }
    }

    /// Drive `session` (already registered in the Knowledge Base) to a
    /// terminal status, emitting its events into `sink`.
    pub async fn run(&self, session: &Session, sink: &EventSink, cancel: CancelToken) -> SessionOutcome {
        let max = session.config.max_iterations;
        info!(
            session_id = %session.id,
            max_iterations = max,
            enhancer = %self.caps.enhancer.name(),
            evaluator = %self.caps.evaluator.name(),
            self_correction = self.caps.corrector.is_some(),
            "Refinement session started"
        );

        let mut state = LoopState {
            prompt: session.initial_prompt.clone(),
            feedback: None,
            history: Vec::new(),
            persisted: 0,
        };

        let mut stop = StopReason::IterationCap;
        for iteration in 1..=max {
            if cancel.is_cancelled() || sink.is_closed() {
                info!(session_id = %session.id, iteration, "Session cancelled");
                stop = StopReason::Cancelled;
                break;
            }

            let record = match self.iterate(session, &state, iteration, sink).await {
                Ok(record) => record,
                Err(Halt::Provider { component, error }) => {
                    return self
                        .provider_failure(session, state.persisted, iteration, component, error, sink)
                        .await;
                }
                Err(Halt::Persistence(e)) => {
                    return self.persistence_failure(session, state.persisted, e, sink).await;
                }
            };
            state.persisted = record.sequence;
            state.history.push(record.evaluation.clone());

            if record.evaluation.satisfied {
                info!(session_id = %session.id, iteration, score = record.evaluation.overall_satisfaction, "Target satisfaction reached");
                stop = StopReason::Satisfied;
                break;
            }
            if iteration == max {
                stop = StopReason::IterationCap;
                break;
            }
            let decision = match self.caps.learner.decide(&record.prompt, &state.history).await {
                Ok(decision) => decision,
                Err(e) => {
                    return self
                        .provider_failure(session, state.persisted, iteration, "learner", e, sink)
                        .await;
                }
            };
            match decision {
                Decision::Stop { reason } => {
                    info!(session_id = %session.id, iteration, reason = %reason, "Learner stopped the session");
                    stop = StopReason::LearnerStop;
                    break;
                }
                Decision::Continue { feedback } => {
                    debug!(session_id = %session.id, iteration, feedback = %feedback, "Continuing");
                    state.feedback = Some(feedback);
                }
            }
            state.prompt = record.prompt;
        }

        self.finish(session, state.persisted, stop, sink).await
    }

    /// One full pass. The record is durable when this returns `Ok`.
    async fn iterate(
        &self,
        session: &Session,
        state: &LoopState,
        iteration: u32,
        sink: &EventSink,
    ) -> Result<IterationRecord, Halt> {
        let ctx = EnhancementContext {
            prompt: state.prompt.clone(),
            objective: session.initial_prompt.clone(),
            feedback: state.feedback.clone(),
            iteration,
        };
        let enhancement = self
            .caps
            .enhancer
            .enhance(&ctx)
            .await
            .map_err(Halt::provider("enhancer"))?;
        debug!(session_id = %session.id, iteration, component = "enhancer", "Prompt enhanced");

        let (prompt, rationale) = match &self.caps.corrector {
            Some(corrector) => {
                let outcome = corrector
                    .correct(&state.prompt, &enhancement.prompt, iteration, sink)
                    .await;
                let rationale = if outcome.revised {
                    format!(
                        "{}\n\nSelf-correction revised the prompt in {} attempt(s).",
                        enhancement.rationale, outcome.attempts
                    )
                } else {
                    enhancement.rationale
                };
                (outcome.prompt, rationale)
            }
            None => (enhancement.prompt, enhancement.rationale),
        };

        let raw_output = self
            .caps
            .deployer
            .deploy(&prompt, session.config.model_temperature)
            .await
            .map_err(Halt::provider("deployment"))?;
        debug!(session_id = %session.id, iteration, component = "deployment", chars = raw_output.len(), "Prompt deployed");

        let evaluation = self
            .caps
            .evaluator
            .evaluate(&session.initial_prompt, &prompt, &raw_output)
            .await
            .map_err(Halt::provider("evaluation"))?;

        let record = IterationRecord {
            session_id: session.id.clone(),
            sequence: state.persisted + 1,
            prompt,
            rationale,
            raw_output,
            evaluation,
            created_at: Utc::now(),
        };
        self.kb.append(&record).await.map_err(Halt::Persistence)?;
        info!(
            session_id = %session.id,
            iteration = record.sequence,
            score = record.evaluation.overall_satisfaction,
            satisfied = record.evaluation.satisfied,
            "Iteration persisted"
        );

        self.bus.publish(DomainEvent::IterationPersisted {
            session_id: session.id.to_string(),
            sequence: record.sequence,
            overall_satisfaction: record.evaluation.overall_satisfaction,
            timestamp: Utc::now(),
        });
        sink.emit(RefinementEvent::IterationResult {
            iteration: record.sequence,
            prompt: record.prompt.clone(),
            rationale: record.rationale.clone(),
            raw_ai_output: record.raw_output.clone(),
            evaluation: record.evaluation.clone(),
        })
        .await;

        Ok(record)
    }

    async fn provider_failure(
        &self,
        session: &Session,
        persisted: u32,
        iteration: u32,
        component: &'static str,
        err: ProviderError,
        sink: &EventSink,
    ) -> SessionOutcome {
        error!(session_id = %session.id, iteration, component, error = %err, "Provider failure");
        self.bus.publish(DomainEvent::ErrorOccurred {
            context: format!("session {} {component}", session.id),
            error_message: err.to_string(),
            timestamp: Utc::now(),
        });
        sink.emit(RefinementEvent::SystemError {
            component: component.to_string(),
            error: err.to_string(),
        })
        .await;

        let failure = FailureContext::new(component, err.kind(), err.to_string()).at_iteration(iteration);
        let diagnosis = self.caps.diagnoser.diagnose(&failure).await;
        info!(
            session_id = %session.id,
            strategy = diagnosis.recovery_strategy.as_str(),
            "Failure diagnosed"
        );
        sink.emit(RefinementEvent::SystemDiagnosis(diagnosis)).await;

        self.finish(session, persisted, StopReason::ProviderFailure, sink).await
    }

    /// Best effort: the store that just failed is asked once more to close
    /// the session, then the stream ends with `error`.
    async fn persistence_failure(
        &self,
        session: &Session,
        persisted: u32,
        err: KnowledgeError,
        sink: &EventSink,
    ) -> SessionOutcome {
        error!(session_id = %session.id, error = %err, "Knowledge Base failure, aborting session");
        self.bus.publish(DomainEvent::ErrorOccurred {
            context: format!("session {} knowledge_base", session.id),
            error_message: err.to_string(),
            timestamp: Utc::now(),
        });

        let reason = StopReason::PersistenceFailure;
        if let Err(e) = self
            .kb
            .finish_session(&session.id, reason.terminal_status(), reason)
            .await
        {
            warn!(session_id = %session.id, error = %e, "Could not mark session as failed");
        }
        sink.emit(RefinementEvent::Error {
            message: format!("Knowledge Base error: {err}"),
        })
        .await;

        SessionOutcome {
            session_id: session.id.clone(),
            status: reason.terminal_status(),
            stop_reason: reason,
            iterations: persisted,
            report: None,
        }
    }

    /// Read the stored records, close the session, then report.
    ///
    /// The records are read while the session is still running, so a failed
    /// read can still close it as `failed`.
    async fn finish(
        &self,
        session: &Session,
        persisted: u32,
        reason: StopReason,
        sink: &EventSink,
    ) -> SessionOutcome {
        let records = match self.kb.get_session(&session.id).await {
            Ok(records) => records,
            Err(e) => return self.persistence_failure(session, persisted, e, sink).await,
        };
        let status = reason.terminal_status();
        if let Err(e) = self.kb.finish_session(&session.id, status, reason).await {
            return self.persistence_failure(session, persisted, e, sink).await;
        }

        let report = FinalReport::build(session, &records, status, Some(reason));
        sink.emit(RefinementEvent::FinalReport {
            content: report.to_markdown(),
        })
        .await;
        sink.emit(RefinementEvent::Complete {}).await;

        self.bus.publish(DomainEvent::SessionFinished {
            session_id: session.id.to_string(),
            status,
            stop_reason: reason,
            iterations: report.iterations,
            timestamp: Utc::now(),
        });
        info!(
            session_id = %session.id,
            status = status.as_str(),
            stop_reason = reason.as_str(),
            iterations = report.iterations,
            "Refinement session finished"
        );

        SessionOutcome {
            session_id: session.id.clone(),
            status,
            stop_reason: reason,
            iterations: report.iterations,
            report: Some(report),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use crate::diagnoser::SystemDiagnoser;
    use crate::enhancer::RuleBasedEnhancer;
    use crate::evaluation::BasicEvaluator;
    use crate::learning::RuleBasedLearner;
    use crate::sink;
    use crate::test_helpers::text_client;
    use async_trait::async_trait;
    use promptsmith_config::{EvaluationRules, LearningConfig};
    use promptsmith_core::capability::LearningModule;
    use promptsmith_core::session::RefinementConfig;
    use promptsmith_knowledge::InMemoryKnowledgeBase;
    use promptsmith_providers::ModelDeployer;

    fn caps(outputs: &[&str]) -> Capabilities {
        let (client, _) = text_client(outputs);
        Capabilities {
            enhancer: Arc::new(RuleBasedEnhancer::new()),
            deployer: Arc::new(ModelDeployer::new(client)),
            evaluator: Arc::new(BasicEvaluator::new(EvaluationRules::default(), 4.0)),
            learner: Arc::new(RuleBasedLearner::new(&LearningConfig::default())),
            diagnoser: Arc::new(SystemDiagnoser::heuristic()),
            corrector: None,
        }
    }

    async fn session(kb: &InMemoryKnowledgeBase, max_iterations: u32) -> Session {
        let session = Session::start(
            "Explain how vaccines train the immune system",
            RefinementConfig {
                max_iterations,
                ..RefinementConfig::default()
            },
        );
        kb.create_session(&session).await.unwrap();
        session
    }

    async fn drain(mut rx: tokio::sync::mpsc::Receiver<RefinementEvent>) -> Vec<RefinementEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn cancelled_before_start_still_reports() {
        let kb = Arc::new(InMemoryKnowledgeBase::new());
        let session = session(&kb, 3).await;
        let (handle, token) = cancel_pair();
        handle.cancel();

        let (sink, rx) = sink::channel(16);
        let outcome = Orchestrator::new(caps(&[]), kb.clone(), Arc::new(EventBus::default()))
            .run(&session, &sink, token)
            .await;
        drop(sink);

        assert_eq!(outcome.stop_reason, StopReason::Cancelled);
        assert_eq!(outcome.status, SessionStatus::Completed);
        assert_eq!(outcome.iterations, 0);
        let names: Vec<_> = drain(rx).await.iter().map(|e| e.event_type()).collect();
        assert_eq!(names, vec!["final_report", "complete"]);
    }

    #[tokio::test]
    async fn feedback_carries_into_the_next_enhancement() {
        let kb = Arc::new(InMemoryKnowledgeBase::new());
        let session = session(&kb, 2).await;
        let (sink, rx) = sink::channel(16);

        let outcome = Orchestrator::new(
            caps(&["Too short.", "Still short."]),
            kb.clone(),
            Arc::new(EventBus::default()),
        )
        .run(&session, &sink, CancelToken::never())
        .await;
        drop(sink);

        assert_eq!(outcome.stop_reason, StopReason::IterationCap);
        let records = kb.get_session(&session.id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(!records[0].prompt.contains("Refinement #"));
        assert!(records[1].prompt.contains("(Refinement #1: Address weak areas: length"));

        let events = drain(rx).await;
        assert_eq!(events.last().map(|e| e.event_type()), Some("complete"));
    }

    struct UnreachableLearner;

    #[async_trait]
    impl LearningModule for UnreachableLearner {
        fn name(&self) -> &str {
            "unreachable"
        }

        async fn decide(&self, _prompt: &str, _history: &[Evaluation]) -> Result<Decision, ProviderError> {
            Err(ProviderError::Network("connection reset".into()))
        }
    }

    #[tokio::test]
    async fn learner_failure_fails_the_session_after_persisting() {
        let kb = Arc::new(InMemoryKnowledgeBase::new());
        let session = session(&kb, 3).await;
        let mut caps = caps(&["Too short."]);
        caps.learner = Arc::new(UnreachableLearner);

        let (sink, rx) = sink::channel(16);
        let outcome = Orchestrator::new(caps, kb.clone(), Arc::new(EventBus::default()))
            .run(&session, &sink, CancelToken::never())
            .await;
        drop(sink);

        assert_eq!(outcome.status, SessionStatus::Failed);
        assert_eq!(outcome.stop_reason, StopReason::ProviderFailure);
        assert_eq!(kb.get_session(&session.id).await.unwrap().len(), 1);

        let events = drain(rx).await;
        let names: Vec<_> = events.iter().map(|e| e.event_type()).collect();
        assert_eq!(
            names,
            vec!["iteration_result", "system_error", "system_diagnosis", "final_report", "complete"]
        );
        assert!(matches!(
            &events[1],
            RefinementEvent::SystemError { component, .. } if component == "learner"
        ));
    }
}
