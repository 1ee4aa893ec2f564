//! # portico-audit
//!
//! Audit logging for the Portico investment portal.
//!
//! This crate provides the request-side half of the portal's compliance
//! surface:
//! - Classifying HTTP calls into `(resource, action, resource_id)` triples
//!   from the URL path and method
//! - Redacting sensitive fields from logged payloads by key name
//! - Deciding per request whether a record is persisted (write actions
//!   always, reads only on failure)
//! - Recording events asynchronously so a slow or failing audit sink never
//!   delays a response
//! - Storing records as JSON lines, in memory, or not at all
//!
//! ## Record shape
//!
//! Every event becomes one immutable [`AuditRecord`]: who ([`AuditRecord::actor_id`]),
//! what ([`AuditAction`] + resource), the outcome, network context, optional
//! before/after snapshots, and a typed detail payload.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use portico_audit::{classify, redact, AuditRecorder, MemoryStore};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let store = Arc::new(MemoryStore::new());
//! let recorder = AuditRecorder::new(store, 1024);
//!
//! let classification = classify("GET", "/api/notes/abc123");
//! assert_eq!(classification.resource, "notes");
//!
//! let body = serde_json::json!({ "amount": 1000, "password": "hunter2" });
//! let safe = redact(&body);
//! assert_eq!(safe["password"], "[REDACTED]");
//! # }
//! ```

pub mod classify;
pub mod error;
pub mod net;
pub mod record;
pub mod recorder;
pub mod redact;
pub mod store;

pub use classify::{classify, Classification, ADMIN_PREFIXES, API_PREFIX, RESERVED_KEYWORDS};
pub use error::AuditError;
pub use net::{client_ip, NetworkContext};
pub use record::{
    AuditAction, AuditOutcome, AuditRecord, AuditRecordBuilder, AuthDetail, ChangeSet, HttpDetail,
    RecordDetail,
};
pub use recorder::{should_persist, AuditRecorder, ALWAYS_LOG_ACTIONS};
pub use redact::{is_sensitive_key, redact, REDACTED_MARKER, SENSITIVE_KEY_FRAGMENTS};
pub use store::{AuditFilter, AuditStore, FileStore, MemoryStore, NullStore};
