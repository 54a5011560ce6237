//! Engine facade: validates requests, registers sessions and spawns one
//! orchestrator task per session.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use promptsmith_core::error::{Error, Result};
use promptsmith_core::event::{DomainEvent, EventBus};
use promptsmith_core::knowledge::KnowledgeBase;
use promptsmith_core::session::{RefinementRequest, Session, SessionId};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::info;

use crate::cancel::{CancelHandle, cancel_pair};
use crate::orchestrator::{Orchestrator, SessionOutcome};
use crate::registry::{Capabilities, CapabilityRegistry};
use crate::sink;
use crate::stream_event::RefinementEvent;

const PREVIEW_CHARS: usize = 80;

/// A running session: its id, its event stream and a way to stop it.
pub struct RefinementRun {
    pub session_id: SessionId,
    pub events: mpsc::Receiver<RefinementEvent>,
    pub cancel: CancelHandle,
    join: JoinHandle<SessionOutcome>,
}

impl RefinementRun {
    /// Drain every event, then wait for the session task.
    pub async fn collect(mut self) -> Result<(Vec<RefinementEvent>, SessionOutcome)> {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        let outcome = self
            .join
            .await
            .map_err(|e| Error::Internal(format!("session task failed: {e}")))?;
        Ok((events, outcome))
    }

    /// Split into the event stream and a handle on the session task.
    pub fn into_parts(self) -> (mpsc::Receiver<RefinementEvent>, JoinHandle<SessionOutcome>) {
        (self.events, self.join)
    }
}

pub struct Engine {
    registry: Arc<CapabilityRegistry>,
    kb: Arc<dyn KnowledgeBase>,
    bus: Arc<EventBus>,
    event_buffer: usize,
    active: Arc<RwLock<HashMap<SessionId, CancelHandle>>>,
}

impl Engine {
    pub fn new(registry: Arc<CapabilityRegistry>, kb: Arc<dyn KnowledgeBase>, bus: Arc<EventBus>) -> Self {
        let event_buffer = registry.config().runtime.event_buffer;
        Self {
            registry,
            kb,
            bus,
            event_buffer,
            active: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn knowledge(&self) -> &Arc<dyn KnowledgeBase> {
        &self.kb
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Start a session with capabilities resolved from its configuration.
    ///
    /// Invalid requests and unavailable backends fail here, before any
    /// session exists.
    pub async fn start(&self, request: RefinementRequest) -> Result<RefinementRun> {
        request.validate()?;
        let caps = self.registry.resolve(&request.config)?;
        self.start_with(request, caps).await
    }

    /// Start a session with explicitly supplied capabilities.
    pub async fn start_with(&self, request: RefinementRequest, caps: Capabilities) -> Result<RefinementRun> {
        request.validate()?;
        let session = Session::start(request.initial_prompt, request.config);
        self.kb.create_session(&session).await?;

        let session_id = session.id.clone();
        self.bus.publish(DomainEvent::SessionStarted {
            session_id: session_id.to_string(),
            prompt_preview: session.initial_prompt.chars().take(PREVIEW_CHARS).collect(),
            timestamp: Utc::now(),
        });

        let (sink, events) = sink::channel(self.event_buffer);
        let (cancel, token) = cancel_pair();
        self.active
            .write()
            .await
            .insert(session_id.clone(), cancel.clone());

        let orchestrator = Orchestrator::new(caps, self.kb.clone(), self.bus.clone());
        let active = self.active.clone();
        let join = tokio::spawn(async move {
            let outcome = orchestrator.run(&session, &sink, token).await;
            active.write().await.remove(&session.id);
            outcome
        });

        Ok(RefinementRun {
            session_id,
            events,
            cancel,
            join,
        })
    }

    /// Request cancellation. Returns `false` when the session is not running here.
    pub async fn cancel(&self, id: &SessionId) -> bool {
        match self.active.read().await.get(id) {
            Some(handle) => {
                info!(session_id = %id, "Cancellation requested");
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of sessions currently running in this process.
    pub async fn active_sessions(&self) -> usize {
        self.active.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptsmith_config::AppConfig;
    use promptsmith_core::session::{BackendKind, RefinementConfig, SessionStatus, StopReason};
    use promptsmith_knowledge::InMemoryKnowledgeBase;
    use promptsmith_providers::{OfflineProvider, ProviderRouter};
    use std::time::Duration;

    fn engine() -> Engine {
        let mut router = ProviderRouter::new(Duration::from_secs(5));
        router.register(BackendKind::Offline, Arc::new(OfflineProvider::new()));
        let registry = CapabilityRegistry::new(Arc::new(router), Arc::new(AppConfig::default()));
        Engine::new(
            Arc::new(registry),
            Arc::new(InMemoryKnowledgeBase::new()),
            Arc::new(EventBus::default()),
        )
    }

    fn offline(max_iterations: u32) -> RefinementConfig {
        let mut config = RefinementConfig {
            max_iterations,
            ..RefinementConfig::default()
        };
        config.providers.orchestrator = BackendKind::Offline;
        config
    }

    #[tokio::test]
    async fn invalid_request_creates_no_session() {
        let engine = engine();
        let result = engine
            .start(RefinementRequest::new("short", offline(3)))
            .await;
        assert!(matches!(result, Err(Error::Config { .. })));

        let unconfigured = engine
            .start(RefinementRequest::new(
                "Describe the water cycle for children",
                RefinementConfig::default(),
            ))
            .await;
        assert!(matches!(unconfigured, Err(Error::Config { .. })));

        let sessions = engine.knowledge().list_sessions(&Default::default()).await.unwrap();
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn offline_session_runs_to_completion() {
        let engine = engine();
        let mut activity = engine.bus().subscribe();
        let run = engine
            .start(RefinementRequest::new("Describe the water cycle for children", offline(2)))
            .await
            .unwrap();
        let id = run.session_id.clone();
        let (events, outcome) = run.collect().await.unwrap();

        assert_eq!(outcome.status, SessionStatus::Completed);
        assert_eq!(events.last().map(|e| e.event_type()), Some("complete"));
        assert_eq!(engine.active_sessions().await, 0);
        assert!(!engine.cancel(&id).await);

        let stored = engine.knowledge().session(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Completed);
        assert!(matches!(
            stored.stop_reason,
            Some(StopReason::Satisfied | StopReason::IterationCap)
        ));

        let first = activity.recv().await.unwrap();
        assert!(matches!(first.as_ref(), DomainEvent::SessionStarted { .. }));
    }
}
