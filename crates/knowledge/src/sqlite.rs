//! SQLite Knowledge Base.
//!
//! Uses a single SQLite database file with two tables:
//! - `sessions`: one row per session with its configuration snapshot
//! - `iterations`: append-only records keyed by `(session_id, sequence)`
//!
//! Appends run inside a transaction that re-checks the session status and the
//! last sequence number; the composite primary key rejects any duplicate that
//! slips past a concurrent writer.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use promptsmith_core::error::KnowledgeError;
use promptsmith_core::iteration::{Evaluation, IterationRecord};
use promptsmith_core::knowledge::KnowledgeBase;
use promptsmith_core::session::{
    RefinementConfig, Session, SessionFilter, SessionId, SessionStatus, SessionSummary, StopReason,
};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::check_append;

/// A durable SQLite-backed Knowledge Base.
pub struct SqliteKnowledgeBase {
    pool: SqlitePool,
}

impl SqliteKnowledgeBase {
    /// Open (or create) the database at `path`.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, KnowledgeError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| KnowledgeError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // Every connection to ":memory:" is its own database, so keep exactly one alive.
        let pool_options = if path.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| KnowledgeError::Storage(format!("Failed to open SQLite: {e}")))?;

        let kb = Self { pool };
        kb.run_migrations().await?;
        info!("SQLite knowledge base initialized at {path}");
        Ok(kb)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, KnowledgeError> {
        let kb = Self { pool };
        kb.run_migrations().await?;
        Ok(kb)
    }

    async fn run_migrations(&self) -> Result<(), KnowledgeError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id             TEXT PRIMARY KEY NOT NULL,
                initial_prompt TEXT NOT NULL,
                config         TEXT NOT NULL,
                status         TEXT NOT NULL,
                stop_reason    TEXT,
                created_at     TEXT NOT NULL,
                finished_at    TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| KnowledgeError::MigrationFailed(format!("sessions table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS iterations (
                session_id  TEXT NOT NULL REFERENCES sessions(id),
                sequence    INTEGER NOT NULL,
                prompt      TEXT NOT NULL,
                rationale   TEXT NOT NULL,
                raw_output  TEXT NOT NULL,
                evaluation  TEXT NOT NULL,
                overall     REAL NOT NULL,
                created_at  TEXT NOT NULL,
                PRIMARY KEY (session_id, sequence)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| KnowledgeError::MigrationFailed(format!("iterations table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_created_at ON sessions(created_at DESC)")
            .execute(&self.pool)
            .await
            .map_err(|e| KnowledgeError::MigrationFailed(format!("created_at index: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status)")
            .execute(&self.pool)
            .await
            .map_err(|e| KnowledgeError::MigrationFailed(format!("status index: {e}")))?;

        debug!("Knowledge base migrations complete");
        Ok(())
    }

    fn row_to_session(row: &SqliteRow) -> Result<Session, KnowledgeError> {
        let config_json: String = col(row, "config")?;
        let config: RefinementConfig = serde_json::from_str(&config_json)
            .map_err(|e| KnowledgeError::QueryFailed(format!("config column: {e}")))?;

        Ok(Session {
            id: SessionId(col(row, "id")?),
            initial_prompt: col(row, "initial_prompt")?,
            config,
            status: parse_status(&col::<String>(row, "status")?)?,
            stop_reason: col::<Option<String>>(row, "stop_reason")?
                .map(|s| parse_reason(&s))
                .transpose()?,
            created_at: parse_time(&col::<String>(row, "created_at")?),
            finished_at: col::<Option<String>>(row, "finished_at")?.map(|s| parse_time(&s)),
        })
    }

    fn row_to_record(row: &SqliteRow) -> Result<IterationRecord, KnowledgeError> {
        let evaluation_json: String = col(row, "evaluation")?;
        let evaluation: Evaluation = serde_json::from_str(&evaluation_json)
            .map_err(|e| KnowledgeError::QueryFailed(format!("evaluation column: {e}")))?;
        let sequence: i64 = col(row, "sequence")?;

        Ok(IterationRecord {
            session_id: SessionId(col(row, "session_id")?),
            sequence: sequence as u32,
            prompt: col(row, "prompt")?,
            rationale: col(row, "rationale")?,
            raw_output: col(row, "raw_output")?,
            evaluation,
            created_at: parse_time(&col::<String>(row, "created_at")?),
        })
    }
}

fn col<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, KnowledgeError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| KnowledgeError::QueryFailed(format!("{name} column: {e}")))
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_status(s: &str) -> Result<SessionStatus, KnowledgeError> {
    s.parse()
        .map_err(|e: promptsmith_core::Error| KnowledgeError::QueryFailed(e.to_string()))
}

fn parse_reason(s: &str) -> Result<StopReason, KnowledgeError> {
    s.parse()
        .map_err(|e: promptsmith_core::Error| KnowledgeError::QueryFailed(e.to_string()))
}

#[async_trait]
impl KnowledgeBase for SqliteKnowledgeBase {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create_session(&self, session: &Session) -> Result<(), KnowledgeError> {
        let config = serde_json::to_string(&session.config)
            .map_err(|e| KnowledgeError::Storage(format!("Cannot encode config: {e}")))?;

        sqlx::query(
            "INSERT INTO sessions (id, initial_prompt, config, status, stop_reason, created_at, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(session.id.as_str())
        .bind(&session.initial_prompt)
        .bind(config)
        .bind(session.status.as_str())
        .bind(session.stop_reason.map(|r| r.as_str()))
        .bind(session.created_at.to_rfc3339())
        .bind(session.finished_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(|e| KnowledgeError::Storage(format!("Failed to create session: {e}")))?;

        debug!(session_id = %session.id, "Session created");
        Ok(())
    }

    async fn append(&self, record: &IterationRecord) -> Result<(), KnowledgeError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| KnowledgeError::Storage(format!("Failed to begin transaction: {e}")))?;

        let status = sqlx::query("SELECT status FROM sessions WHERE id = ?1")
            .bind(record.session_id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| KnowledgeError::QueryFailed(format!("session lookup: {e}")))?
            .map(|row| col::<String>(&row, "status").and_then(|s| parse_status(&s)))
            .transpose()?;

        let last: i64 = sqlx::query(
            "SELECT COALESCE(MAX(sequence), 0) AS last FROM iterations WHERE session_id = ?1",
        )
        .bind(record.session_id.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| KnowledgeError::QueryFailed(format!("sequence lookup: {e}")))
        .and_then(|row| col(&row, "last"))?;

        check_append(status, last as u32, record)?;

        let evaluation = serde_json::to_string(&record.evaluation)
            .map_err(|e| KnowledgeError::Storage(format!("Cannot encode evaluation: {e}")))?;

        sqlx::query(
            "INSERT INTO iterations (session_id, sequence, prompt, rationale, raw_output, evaluation, overall, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(record.session_id.as_str())
        .bind(record.sequence as i64)
        .bind(&record.prompt)
        .bind(&record.rationale)
        .bind(&record.raw_output)
        .bind(evaluation)
        .bind(record.evaluation.overall_satisfaction)
        .bind(record.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => KnowledgeError::SequenceViolation {
                session_id: record.session_id.to_string(),
                expected: last as u32 + 1,
                got: record.sequence,
            },
            _ => KnowledgeError::Storage(format!("Failed to append iteration: {e}")),
        })?;

        tx.commit()
            .await
            .map_err(|e| KnowledgeError::Storage(format!("Failed to commit append: {e}")))?;

        debug!(session_id = %record.session_id, sequence = record.sequence, "Iteration appended");
        Ok(())
    }

    async fn finish_session(
        &self,
        id: &SessionId,
        status: SessionStatus,
        reason: StopReason,
    ) -> Result<(), KnowledgeError> {
        let result = sqlx::query(
            "UPDATE sessions SET status = ?1, stop_reason = ?2, finished_at = ?3
             WHERE id = ?4 AND status = 'running'",
        )
        .bind(status.as_str())
        .bind(reason.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| KnowledgeError::Storage(format!("Failed to finish session: {e}")))?;

        if result.rows_affected() == 0 {
            return match self.session(id).await? {
                None => Err(KnowledgeError::SessionNotFound(id.to_string())),
                Some(_) => Err(KnowledgeError::SessionClosed(id.to_string())),
            };
        }
        Ok(())
    }

    async fn session(&self, id: &SessionId) -> Result<Option<Session>, KnowledgeError> {
        sqlx::query("SELECT * FROM sessions WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| KnowledgeError::QueryFailed(format!("session lookup: {e}")))?
            .map(|row| Self::row_to_session(&row))
            .transpose()
    }

    async fn get_session(&self, id: &SessionId) -> Result<Vec<IterationRecord>, KnowledgeError> {
        if self.session(id).await?.is_none() {
            return Err(KnowledgeError::SessionNotFound(id.to_string()));
        }

        let rows = sqlx::query("SELECT * FROM iterations WHERE session_id = ?1 ORDER BY sequence ASC")
            .bind(id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| KnowledgeError::QueryFailed(format!("iteration lookup: {e}")))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<SessionSummary>, KnowledgeError> {
        let limit = filter.limit.map_or(-1, |l| l as i64);
        let rows = sqlx::query(
            r#"
            SELECT s.*, COUNT(i.sequence) AS iteration_count, MAX(i.overall) AS best_score
            FROM sessions s
            LEFT JOIN iterations i ON i.session_id = s.id
            WHERE ?1 IS NULL OR s.status = ?1
            GROUP BY s.id
            ORDER BY s.created_at DESC
            LIMIT ?2
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| KnowledgeError::QueryFailed(format!("session listing: {e}")))?;

        rows.iter()
            .map(|row| {
                let session = Self::row_to_session(row)?;
                let count: i64 = col(row, "iteration_count")?;
                Ok(SessionSummary {
                    id: session.id,
                    initial_prompt: session.initial_prompt,
                    status: session.status,
                    stop_reason: session.stop_reason,
                    iterations: count as u32,
                    best_score: col(row, "best_score")?,
                    created_at: session.created_at,
                    finished_at: session.finished_at,
                })
            })
            .collect()
    }

    async fn health_check(&self) -> Result<bool, KnowledgeError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| true)
            .map_err(|e| KnowledgeError::Storage(e.to_string()))
    }
}
