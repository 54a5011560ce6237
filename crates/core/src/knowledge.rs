//! Knowledge Base trait: durable, append-only refinement history.
//!
//! The Knowledge Base is the single source of truth for iteration records and
//! final reports. Implementations must guarantee:
//! - atomic appends
//! - gapless sequence numbers starting at 1 per session
//! - rejection of appends to terminal sessions
//! - records returned in sequence order

use async_trait::async_trait;

use crate::error::KnowledgeError;
use crate::iteration::IterationRecord;
use crate::session::{Session, SessionFilter, SessionId, SessionStatus, SessionSummary, StopReason};

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Backend name (e.g., "sqlite", "memory").
    fn name(&self) -> &str;

    /// Register a new running session.
    async fn create_session(&self, session: &Session) -> std::result::Result<(), KnowledgeError>;

    /// Append one iteration record. Rejects out-of-order sequence numbers,
    /// terminal sessions and evaluations that scored a different prompt.
    async fn append(&self, record: &IterationRecord) -> std::result::Result<(), KnowledgeError>;

    /// Move a running session to a terminal status.
    async fn finish_session(
        &self,
        id: &SessionId,
        status: SessionStatus,
        reason: StopReason,
    ) -> std::result::Result<(), KnowledgeError>;

    /// Fetch a session's metadata.
    async fn session(&self, id: &SessionId) -> std::result::Result<Option<Session>, KnowledgeError>;

    /// All records of a session, in sequence order.
    async fn get_session(&self, id: &SessionId) -> std::result::Result<Vec<IterationRecord>, KnowledgeError>;

    /// Session summaries, newest first.
    async fn list_sessions(&self, filter: &SessionFilter) -> std::result::Result<Vec<SessionSummary>, KnowledgeError>;

    /// Can the backing store be reached?
    async fn health_check(&self) -> std::result::Result<bool, KnowledgeError> {
        Ok(true)
    }
}
