//! Audit storage backends.

use crate::error::AuditError;
use crate::record::{AuditAction, AuditOutcome, AuditRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::RwLock;
use uuid::Uuid;

/// Trait for audit storage backends.
///
/// The recorder only ever appends; `query`/`get` exist for the reporting
/// surface (the admin audit endpoint).
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append one audit record.
    async fn append(&self, record: AuditRecord) -> Result<(), AuditError>;

    /// Query audit records with filters, newest first.
    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditRecord>, AuditError>;

    /// Get an audit record by ID.
    async fn get(&self, id: Uuid) -> Result<Option<AuditRecord>, AuditError>;
}

/// Filter for querying audit records.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Filter by acting user.
    pub actor_id: Option<Uuid>,
    /// Filter by organizational entity.
    pub acting_entity_id: Option<Uuid>,
    /// Filter by action.
    pub action: Option<AuditAction>,
    /// Filter by resource name.
    pub resource: Option<String>,
    /// Filter by target record identifier.
    pub resource_id: Option<String>,
    /// Filter by outcome.
    pub outcome: Option<AuditOutcome>,
    /// Records created at or after this instant.
    pub start_time: Option<DateTime<Utc>>,
    /// Records created at or before this instant.
    pub end_time: Option<DateTime<Utc>>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

impl AuditFilter {
    /// Whether a record passes every set criterion. Shared by the
    /// in-process backends; the Postgres backend expresses the same
    /// conditions in SQL.
    pub fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(actor) = self.actor_id {
            if record.actor_id != Some(actor) {
                return false;
            }
        }
        if let Some(entity) = self.acting_entity_id {
            if record.acting_entity_id != Some(entity) {
                return false;
            }
        }
        if let Some(action) = self.action {
            if record.action != action {
                return false;
            }
        }
        if let Some(ref resource) = self.resource {
            if &record.resource != resource {
                return false;
            }
        }
        if let Some(ref resource_id) = self.resource_id {
            if record.resource_id.as_ref() != Some(resource_id) {
                return false;
            }
        }
        if let Some(outcome) = self.outcome {
            if record.outcome != outcome {
                return false;
            }
        }
        if let Some(start) = self.start_time {
            if record.created_at < start {
                return false;
            }
        }
        if let Some(end) = self.end_time {
            if record.created_at > end {
                return false;
            }
        }
        true
    }
}

fn apply_window(mut results: Vec<AuditRecord>, filter: &AuditFilter) -> Vec<AuditRecord> {
    // Newest first.
    results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    if let Some(offset) = filter.offset {
        results = results.into_iter().skip(offset).collect();
    }
    if let Some(limit) = filter.limit {
        results.truncate(limit);
    }
    results
}

/// In-memory storage. Records do not survive a restart; intended for
/// development and tests.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<AuditRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append(&self, record: AuditRecord) -> Result<(), AuditError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| AuditError::Storage(format!("lock poisoned: {e}")))?;
        records.push(record);
        Ok(())
    }

    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
        let records = self
            .records
            .read()
            .map_err(|e| AuditError::Storage(format!("lock poisoned: {e}")))?;
        let results: Vec<_> = records.iter().filter(|r| filter.matches(r)).cloned().collect();
        Ok(apply_window(results, &filter))
    }

    async fn get(&self, id: Uuid) -> Result<Option<AuditRecord>, AuditError> {
        let records = self
            .records
            .read()
            .map_err(|e| AuditError::Storage(format!("lock poisoned: {e}")))?;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }
}

/// File storage: appends one JSON object per line.
pub struct FileStore {
    path: String,
    // In-memory mirror for querying; the file itself is write-only here.
    records: RwLock<Vec<AuditRecord>>,
}

impl FileStore {
    /// Create a new file store appending to `path`.
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            records: RwLock::new(Vec::new()),
        }
    }

    /// The file path records are appended to.
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl AuditStore for FileStore {
    async fn append(&self, record: AuditRecord) -> Result<(), AuditError> {
        let json = serde_json::to_string(&record)?;

        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", json)?;

        let mut records = self
            .records
            .write()
            .map_err(|e| AuditError::Storage(format!("lock poisoned: {e}")))?;
        records.push(record);
        Ok(())
    }

    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
        let records = self
            .records
            .read()
            .map_err(|e| AuditError::Storage(format!("lock poisoned: {e}")))?;
        let results: Vec<_> = records.iter().filter(|r| filter.matches(r)).cloned().collect();
        Ok(apply_window(results, &filter))
    }

    async fn get(&self, id: Uuid) -> Result<Option<AuditRecord>, AuditError> {
        let records = self
            .records
            .read()
            .map_err(|e| AuditError::Storage(format!("lock poisoned: {e}")))?;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }
}

/// Storage that discards everything. Backs the disabled recorder.
#[derive(Default)]
pub struct NullStore;

impl NullStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditStore for NullStore {
    async fn append(&self, _record: AuditRecord) -> Result<(), AuditError> {
        Ok(())
    }

    async fn query(&self, _filter: AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
        Ok(vec![])
    }

    async fn get(&self, _id: Uuid) -> Result<Option<AuditRecord>, AuditError> {
        Ok(None)
    }
}
