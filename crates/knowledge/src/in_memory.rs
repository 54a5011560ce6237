//! In-memory backend: useful for testing and ephemeral runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use promptsmith_core::error::KnowledgeError;
use promptsmith_core::iteration::IterationRecord;
use promptsmith_core::knowledge::KnowledgeBase;
use promptsmith_core::session::{
    Session, SessionFilter, SessionId, SessionStatus, SessionSummary, StopReason,
};
use tokio::sync::RwLock;

use crate::check_append;

struct Entry {
    session: Session,
    records: Vec<IterationRecord>,
}

/// A Knowledge Base held entirely in process memory.
///
/// Appends take the write lock for the whole check-and-push, so they are
/// atomic and serialized per store.
pub struct InMemoryKnowledgeBase {
    sessions: Arc<RwLock<HashMap<String, Entry>>>,
}

impl InMemoryKnowledgeBase {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryKnowledgeBase {
    fn default() -> Self {
        Self::new()
    }
}

fn summarize(session: &Session, records: &[IterationRecord]) -> SessionSummary {
    SessionSummary {
        id: session.id.clone(),
        initial_prompt: session.initial_prompt.clone(),
        status: session.status,
        stop_reason: session.stop_reason,
        iterations: records.len() as u32,
        best_score: records
            .iter()
            .map(|r| r.evaluation.overall_satisfaction)
            .fold(None, |best: Option<f64>, s| Some(best.map_or(s, |b| b.max(s)))),
        created_at: session.created_at,
        finished_at: session.finished_at,
    }
}

#[async_trait]
impl KnowledgeBase for InMemoryKnowledgeBase {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_session(&self, session: &Session) -> Result<(), KnowledgeError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(session.id.as_str()) {
            return Err(KnowledgeError::Storage(format!(
                "Session {} already exists",
                session.id
            )));
        }
        sessions.insert(
            session.id.to_string(),
            Entry {
                session: session.clone(),
                records: Vec::new(),
            },
        );
        Ok(())
    }

    async fn append(&self, record: &IterationRecord) -> Result<(), KnowledgeError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(record.session_id.as_str());
        let status = entry.as_ref().map(|e| e.session.status);
        let last = entry
            .as_ref()
            .and_then(|e| e.records.last())
            .map_or(0, |r| r.sequence);

        check_append(status, last, record)?;

        if let Some(entry) = entry {
            entry.records.push(record.clone());
        }
        Ok(())
    }

    async fn finish_session(
        &self,
        id: &SessionId,
        status: SessionStatus,
        reason: StopReason,
    ) -> Result<(), KnowledgeError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(id.as_str())
            .ok_or_else(|| KnowledgeError::SessionNotFound(id.to_string()))?;

        if entry.session.status.is_terminal() {
            return Err(KnowledgeError::SessionClosed(id.to_string()));
        }

        entry.session.status = status;
        entry.session.stop_reason = Some(reason);
        entry.session.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn session(&self, id: &SessionId) -> Result<Option<Session>, KnowledgeError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(id.as_str()).map(|e| e.session.clone()))
    }

    async fn get_session(&self, id: &SessionId) -> Result<Vec<IterationRecord>, KnowledgeError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id.as_str())
            .map(|e| e.records.clone())
            .ok_or_else(|| KnowledgeError::SessionNotFound(id.to_string()))
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<SessionSummary>, KnowledgeError> {
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<SessionSummary> = sessions
            .values()
            .filter(|e| filter.matches(e.session.status))
            .map(|e| summarize(&e.session, &e.records))
            .collect();

        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            summaries.truncate(limit);
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::record;
    use promptsmith_core::session::RefinementConfig;

    async fn kb_with_session() -> (InMemoryKnowledgeBase, Session) {
        let kb = InMemoryKnowledgeBase::new();
        let session = Session::start("Write a haiku about autumn", RefinementConfig::default());
        kb.create_session(&session).await.unwrap();
        (kb, session)
    }

    #[tokio::test]
    async fn append_and_read_back_in_order() {
        let (kb, session) = kb_with_session().await;
        for seq in 1..=3 {
            kb.append(&record(&session.id, seq, seq as f64)).await.unwrap();
        }
        let records = kb.get_session(&session.id).await.unwrap();
        let sequences: Vec<u32> = records.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn gaps_and_duplicates_are_rejected() {
        let (kb, session) = kb_with_session().await;
        kb.append(&record(&session.id, 1, 2.0)).await.unwrap();

        let dup = kb.append(&record(&session.id, 1, 2.0)).await;
        assert!(matches!(dup, Err(KnowledgeError::SequenceViolation { expected: 2, got: 1, .. })));

        let gap = kb.append(&record(&session.id, 3, 2.0)).await;
        assert!(matches!(gap, Err(KnowledgeError::SequenceViolation { expected: 2, got: 3, .. })));

        assert_eq!(kb.get_session(&session.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn terminal_session_rejects_appends_and_second_finish() {
        let (kb, session) = kb_with_session().await;
        kb.append(&record(&session.id, 1, 4.5)).await.unwrap();
        kb.finish_session(&session.id, SessionStatus::Completed, StopReason::Satisfied)
            .await
            .unwrap();

        let late = kb.append(&record(&session.id, 2, 4.5)).await;
        assert!(matches!(late, Err(KnowledgeError::SessionClosed(_))));

        let again = kb
            .finish_session(&session.id, SessionStatus::Failed, StopReason::ProviderFailure)
            .await;
        assert!(matches!(again, Err(KnowledgeError::SessionClosed(_))));

        let stored = kb.session(&session.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Completed);
        assert_eq!(stored.stop_reason, Some(StopReason::Satisfied));
        assert!(stored.finished_at.is_some());
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let kb = InMemoryKnowledgeBase::new();
        let id = SessionId::new();
        assert!(matches!(
            kb.append(&record(&id, 1, 1.0)).await,
            Err(KnowledgeError::SessionNotFound(_))
        ));
        assert!(kb.session(&id).await.unwrap().is_none());
        assert!(kb.get_session(&id).await.is_err());
    }

    #[tokio::test]
    async fn list_filters_and_summarizes() {
        let (kb, first) = kb_with_session().await;
        kb.append(&record(&first.id, 1, 2.0)).await.unwrap();
        kb.append(&record(&first.id, 2, 3.5)).await.unwrap();
        kb.finish_session(&first.id, SessionStatus::Completed, StopReason::IterationCap)
            .await
            .unwrap();

        let second = Session::start("Describe a lighthouse keeper", RefinementConfig::default());
        kb.create_session(&second).await.unwrap();

        let all = kb.list_sessions(&SessionFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let completed = kb
            .list_sessions(&SessionFilter {
                status: Some(SessionStatus::Completed),
                limit: None,
            })
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].iterations, 2);
        assert_eq!(completed[0].best_score, Some(3.5));

        let limited = kb
            .list_sessions(&SessionFilter {
                status: None,
                limit: Some(1),
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }
}
