//! Audit record types.
//!
//! An [`AuditRecord`] is an immutable, append-only fact about one action:
//! who did what to which resource, whether it worked, and from where.
//! Records are created once at the end of a request's lifecycle (or by an
//! explicit side-channel event) and never mutated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::net::NetworkContext;

/// Normalized verb describing what was done to a resource.
///
/// The vocabulary is closed: anything the classifier cannot map lands on
/// [`AuditAction::Unknown`], which signals a classification gap, not an
/// error. The raw HTTP method always rides along in the record detail, so
/// nothing is lost by the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Read,
    List,
    Search,
    Export,
    Update,
    Delete,
    Login,
    Logout,
    Import,
    Approve,
    Reject,
    BulkCreate,
    Unknown,
}

impl AuditAction {
    /// The serialized (snake_case) name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::List => "list",
            Self::Search => "search",
            Self::Export => "export",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Login => "login",
            Self::Logout => "logout",
            Self::Import => "import",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::BulkCreate => "bulk_create",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a serialized action name. Unrecognized names map to `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "create" => Some(Self::Create),
            "read" => Some(Self::Read),
            "list" => Some(Self::List),
            "search" => Some(Self::Search),
            "export" => Some(Self::Export),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            "login" => Some(Self::Login),
            "logout" => Some(Self::Logout),
            "import" => Some(Self::Import),
            "approve" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            "bulk_create" => Some(Self::BulkCreate),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the recorded action succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
}

impl AuditOutcome {
    /// Derive the outcome from an HTTP status code: success iff the status
    /// is in `[200, 300)`.
    pub fn from_status(status: u16) -> Self {
        if (200..300).contains(&status) {
            Self::Success
        } else {
            Self::Failure
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional before/after snapshots of the mutated payload.
///
/// Both sides are stored redacted. `before` is only present when an
/// upstream handler explicitly staged a snapshot prior to its mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// State before the mutation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,

    /// State after the mutation (for writes, the redacted request body).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.before.is_none() && self.after.is_none()
    }
}

/// Typed detail payload of a record.
///
/// Known event sources get a structured shape; everything else goes
/// through the free-form `Custom` escape hatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordDetail {
    /// Captured by the request middleware.
    Http(HttpDetail),
    /// Captured by the authentication flows (login, logout).
    Auth(AuthDetail),
    /// Free-form key/value detail for everything else.
    Custom(serde_json::Map<String, Value>),
}

impl Default for RecordDetail {
    fn default() -> Self {
        Self::Custom(serde_json::Map::new())
    }
}

/// Request/response detail attached by the HTTP middleware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpDetail {
    /// Raw HTTP method (preserved even when the action is `unknown`).
    pub method: String,

    /// Request path as received.
    pub path: String,

    /// Final response status code.
    pub status: u16,

    /// Wall time between request entry and handler completion.
    pub duration_ms: u64,

    /// Redacted query parameters, if any were present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,

    /// Redacted request body, when it parsed as JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Error message extracted from a failure response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Detail attached by manual authentication events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthDetail {
    /// Email the credential was presented for, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Why the attempt failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// An immutable audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique record ID.
    pub id: Uuid,

    /// The authenticated user, absent for unauthenticated actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<Uuid>,

    /// Organizational entity the actor was operating as, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acting_entity_id: Option<Uuid>,

    /// What was done.
    pub action: AuditAction,

    /// Resource name derived from the URL (e.g. "notes", "borrowers").
    pub resource: String,

    /// Identifier of the specific record acted upon, when one was present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,

    /// Whether the action succeeded.
    pub outcome: AuditOutcome,

    /// Best-effort client IP ("unknown" when nothing was derivable).
    pub ip_address: String,

    /// Client user-agent string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Redacted before/after snapshots, for mutations that captured them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<ChangeSet>,

    /// Typed detail payload.
    pub detail: RecordDetail,

    /// Server-assigned timestamp. Monotonically non-decreasing in storage
    /// order only as a best effort; concurrent writers may interleave.
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Create a new record with the required fields.
    pub fn new(action: AuditAction, resource: impl Into<String>, outcome: AuditOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id: None,
            acting_entity_id: None,
            action,
            resource: resource.into(),
            resource_id: None,
            outcome,
            ip_address: "unknown".to_string(),
            user_agent: None,
            changes: None,
            detail: RecordDetail::default(),
            created_at: Utc::now(),
        }
    }

    /// Create a builder for an audit record.
    pub fn builder(
        action: AuditAction,
        resource: impl Into<String>,
        outcome: AuditOutcome,
    ) -> AuditRecordBuilder {
        AuditRecordBuilder::new(action, resource, outcome)
    }
}

/// Builder for creating audit records.
#[derive(Debug)]
pub struct AuditRecordBuilder {
    record: AuditRecord,
}

impl AuditRecordBuilder {
    /// Create a new builder with required fields.
    pub fn new(action: AuditAction, resource: impl Into<String>, outcome: AuditOutcome) -> Self {
        Self {
            record: AuditRecord::new(action, resource, outcome),
        }
    }

    /// Set the acting user.
    pub fn actor(mut self, actor_id: Uuid) -> Self {
        self.record.actor_id = Some(actor_id);
        self
    }

    /// Set the organizational entity context.
    pub fn acting_entity(mut self, entity_id: Uuid) -> Self {
        self.record.acting_entity_id = Some(entity_id);
        self
    }

    /// Set the target record identifier.
    pub fn resource_id(mut self, id: impl Into<String>) -> Self {
        self.record.resource_id = Some(id.into());
        self
    }

    /// Set the network context (client IP and user agent).
    pub fn network(mut self, net: &NetworkContext) -> Self {
        self.record.ip_address = net.ip.clone();
        self.record.user_agent = net.user_agent.clone();
        self
    }

    /// Set the before-state snapshot.
    pub fn before(mut self, state: Value) -> Self {
        self.record
            .changes
            .get_or_insert_with(ChangeSet::default)
            .before = Some(state);
        self
    }

    /// Set the after-state snapshot.
    pub fn after(mut self, state: Value) -> Self {
        self.record
            .changes
            .get_or_insert_with(ChangeSet::default)
            .after = Some(state);
        self
    }

    /// Set the typed detail payload.
    pub fn detail(mut self, detail: RecordDetail) -> Self {
        self.record.detail = detail;
        self
    }

    /// Build the audit record.
    pub fn build(self) -> AuditRecord {
        self.record
    }
}
