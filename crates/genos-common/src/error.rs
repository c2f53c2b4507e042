//! Error types for the Genos engine
//!
//! One variant per failure class the lifecycle loop distinguishes; nothing
//! here is user-facing, failures surface through logs and the lifecycle
//! audit trail only.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using GenosError
pub type Result<T> = std::result::Result<T, GenosError>;

/// Unified error type for Genos operations
#[derive(Debug, Error)]
pub enum GenosError {
    /// Bus or store temporarily unavailable; retried with backoff and never
    /// surfaced as a failure to lifecycle decisions.
    #[error("Transient IO error: {0}")]
    TransientIo(String),

    /// Completion response failed schema validation. Retried once with a
    /// stricter instruction, then the batch/request is parked.
    #[error("Malformed model output: {0}")]
    MalformedModelOutput(String),

    /// Optimistic write rejected; caller re-reads and retries, bounded.
    #[error("Concurrency conflict on agent {agent_id}: expected version {expected}, found {found}")]
    ConcurrencyConflict {
        agent_id: Uuid,
        expected: u64,
        found: u64,
    },

    /// Action refused by policy (e.g. duplication inside the cooldown).
    /// Logged and ignored.
    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    /// Agent failed its QA battery. Terminal for that agent version.
    #[error("Validation failure for agent {agent_id}: {reason}")]
    ValidationFailure { agent_id: Uuid, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Bus error: {0}")]
    Bus(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GenosError {
    /// True for errors worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, GenosError::TransientIo(_) | GenosError::Timeout(_))
    }
}

impl From<serde_json::Error> for GenosError {
    fn from(err: serde_json::Error) -> Self {
        GenosError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for GenosError {
    fn from(err: std::io::Error) -> Self {
        GenosError::TransientIo(err.to_string())
    }
}

impl From<anyhow::Error> for GenosError {
    fn from(err: anyhow::Error) -> Self {
        GenosError::Internal(err.to_string())
    }
}
