//! Domain event system: process-wide notifications about session lifecycle.
//!
//! These are distinct from a session's own refinement event stream: the bus
//! carries coarse lifecycle facts that any number of observers (activity
//! feeds, logs) may subscribe to without coupling to the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::session::{SessionStatus, StopReason};

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A session was created and its loop started
    SessionStarted {
        session_id: String,
        prompt_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// An iteration record was durably appended
    IterationPersisted {
        session_id: String,
        sequence: u32,
        overall_satisfaction: f64,
        timestamp: DateTime<Utc>,
    },

    /// A session reached a terminal status
    SessionFinished {
        session_id: String,
        status: SessionStatus,
        stop_reason: StopReason,
        iterations: u32,
        timestamp: DateTime<Utc>,
    },

    /// A component failed
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
