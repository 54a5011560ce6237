//! Knowledge Base implementations for Promptsmith.
//!
//! Both backends share [`check_append`], so the append rules (known running
//! session, gapless sequence, evaluation bound to its own prompt) are enforced
//! identically everywhere.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryKnowledgeBase;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteKnowledgeBase;

use std::sync::Arc;

use promptsmith_core::error::KnowledgeError;
use promptsmith_core::iteration::IterationRecord;
use promptsmith_core::knowledge::KnowledgeBase;
use promptsmith_core::session::SessionStatus;

/// Validate an append against the session's current state.
///
/// `status` is `None` when the session does not exist; `last_sequence` is 0
/// when it has no records yet.
pub fn check_append(
    status: Option<SessionStatus>,
    last_sequence: u32,
    record: &IterationRecord,
) -> Result<(), KnowledgeError> {
    let id = record.session_id.to_string();
    match status {
        None => return Err(KnowledgeError::SessionNotFound(id)),
        Some(s) if s.is_terminal() => return Err(KnowledgeError::SessionClosed(id)),
        Some(_) => {}
    }

    let expected = last_sequence + 1;
    if record.sequence != expected {
        return Err(KnowledgeError::SequenceViolation {
            session_id: id,
            expected,
            got: record.sequence,
        });
    }

    if !record.evaluation.scored(&record.prompt) {
        return Err(KnowledgeError::Integrity(format!(
            "evaluation of iteration {} does not belong to its prompt",
            record.sequence
        )));
    }

    Ok(())
}

/// Open the backend named in configuration.
pub async fn open_from_config(
    config: &promptsmith_config::AppConfig,
) -> Result<Arc<dyn KnowledgeBase>, KnowledgeError> {
    match config.knowledge.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryKnowledgeBase::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let path = config.knowledge.database_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    KnowledgeError::Storage(format!("Cannot create {}: {e}", parent.display()))
                })?;
            }
            let url = format!("sqlite://{}", path.display());
            Ok(Arc::new(SqliteKnowledgeBase::new(&url).await?))
        }
        other => Err(KnowledgeError::Storage(format!(
            "Knowledge backend '{other}' is not available in this build"
        ))),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use promptsmith_core::session::SessionId;

    #[test]
    fn check_append_rules() {
        let id = SessionId::new();
        let first = test_support::record(&id, 1, 3.0);
        assert!(check_append(Some(SessionStatus::Running), 0, &first).is_ok());

        assert!(matches!(
            check_append(None, 0, &first),
            Err(KnowledgeError::SessionNotFound(_))
        ));
        assert!(matches!(
            check_append(Some(SessionStatus::Completed), 0, &first),
            Err(KnowledgeError::SessionClosed(_))
        ));
        assert!(matches!(
            check_append(Some(SessionStatus::Running), 1, &first),
            Err(KnowledgeError::SequenceViolation { expected: 2, got: 1, .. })
        ));

        let mut mixed = test_support::record(&id, 1, 3.0);
        mixed.prompt = "A different prompt".into();
        assert!(matches!(
            check_append(Some(SessionStatus::Running), 0, &mixed),
            Err(KnowledgeError::Integrity(_))
        ));
    }

    #[tokio::test]
    async fn open_memory_backend_from_config() {
        let mut config = promptsmith_config::AppConfig::default();
        config.knowledge.backend = "memory".into();
        let kb = open_from_config(&config).await.unwrap();
        assert_eq!(kb.name(), "memory");
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn open_sqlite_backend_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = promptsmith_config::AppConfig::default();
        config.knowledge.path = Some(dir.path().join("nested").join("kb.db"));
        let kb = open_from_config(&config).await.unwrap();
        assert_eq!(kb.name(), "sqlite");
        assert!(dir.path().join("nested").join("kb.db").exists());
    }
}
