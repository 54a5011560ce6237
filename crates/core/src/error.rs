//! Error types for the Promptsmith domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Promptsmith operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Knowledge base errors ---
    #[error("Persistence error: {0}")]
    Persistence(#[from] KnowledgeError),

    // --- Self-correction validation ---
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Short machine-readable kind, used in diagnoses and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApiError { .. } => "api_error",
            Self::RateLimited { .. } => "rate_limited",
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::ModelNotFound(_) => "model_not_found",
            Self::MalformedResponse(_) => "malformed_response",
            Self::NotConfigured(_) => "not_configured",
            Self::Timeout(_) => "timeout",
            Self::Network(_) => "network",
        }
    }
}

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Sequence violation for session {session_id}: expected {expected}, got {got}")]
    SequenceViolation {
        session_id: String,
        expected: u32,
        got: u32,
    },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session {0} is already terminal")]
    SessionClosed(String),

    #[error("Integrity check failed: {0}")]
    Integrity(String),
}

/// Flaw detection failures inside the self-correction sub-loop.
///
/// These never escape the sub-loop as fatal errors; they are reported as
/// events and degrade to the unrevised candidate.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Self-correction exhausted after {attempts} attempt(s): {last_feedback}")]
    Exhausted { attempts: u32, last_feedback: String },

    #[error("Flaw analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Revision failed: {0}")]
    RevisionFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn sequence_violation_names_both_numbers() {
        let err = Error::Persistence(KnowledgeError::SequenceViolation {
            session_id: "abc".into(),
            expected: 3,
            got: 5,
        });
        let text = err.to_string();
        assert!(text.contains("expected 3"));
        assert!(text.contains("got 5"));
    }

    #[test]
    fn provider_error_kinds_are_stable() {
        assert_eq!(ProviderError::Timeout("x".into()).kind(), "timeout");
        assert_eq!(
            ProviderError::MalformedResponse("x".into()).kind(),
            "malformed_response"
        );
    }
}
