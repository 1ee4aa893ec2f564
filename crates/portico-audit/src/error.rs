//! Error types for the audit crate.

use thiserror::Error;

/// Errors that can occur during audit operations.
///
/// Persistence failures never fail the recorded request; they are caught
/// at the write site and logged locally. Query failures do surface, to the
/// reporting endpoints.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Failed to query audit records.
    #[error("failed to query audit records: {0}")]
    QueryFailed(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
