//! Audit recording configuration.

use serde::{Deserialize, Serialize};

/// Configuration for audit recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether audit recording is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Where persisted records go.
    #[serde(default)]
    pub sink: AuditSink,

    /// File path for the `file` sink (JSON lines, appended).
    #[serde(default = "default_file_path")]
    pub file_path: String,

    /// Capacity of the in-process queue between the request path and the
    /// background writer. When the queue is full, records are dropped
    /// rather than blocking the response.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditSink {
    /// Keep records in process memory. Useful for development and tests;
    /// records do not survive a restart.
    #[default]
    Memory,
    /// Append JSON lines to a file.
    File,
    /// Insert into the `audit_records` table.
    Postgres,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            sink: AuditSink::default(),
            file_path: default_file_path(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_file_path() -> String {
    "audit.log".to_string()
}

fn default_queue_capacity() -> usize {
    1024
}
