//! RBAC domain model.
//!
//! Users hold roles via [`RoleAssignment`]; roles hold permissions via
//! [`RolePermission`]; a user's effective permission set is the union of
//! permissions reachable through all of their roles. There is no per-user
//! override or deny-list.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account lifecycle state.
///
/// `pending_verification` → `active` on email verification;
/// `suspended`/`inactive` by administrative action. Temporary lockout is
/// not a status: it is the time-bound `locked_until` field on [`User`],
/// which clears itself once the window passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
    PendingVerification,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
            Self::PendingVerification => "pending_verification",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "suspended" => Some(Self::Suspended),
            "pending_verification" => Some(Self::PendingVerification),
            _ => None,
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The security-relevant subset of a portal user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// Argon2 PHC hash of the credential. Never serialized to clients.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub status: UserStatus,
    pub email_verified: bool,
    pub mfa_enabled: bool,
    #[serde(skip_serializing)]
    pub mfa_secret: Option<String>,
    pub failed_login_attempts: u32,
    /// End of the current lockout window, if one is in force.
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new account in `pending_verification` with a hashed
    /// credential.
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: password_hash.into(),
            status: UserStatus::PendingVerification,
            email_verified: false,
            mfa_enabled: false,
            mfa_secret: None,
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a lockout window is in force at `now`. A past
    /// `locked_until` means unlocked; no explicit transition is needed.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}

/// A named, reusable bundle of permissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    /// Unique, stable identifier (e.g. "admin", "investor").
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    /// System roles are seeded and not intended for ad-hoc deletion; the
    /// model does not enforce this.
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn new(input: NewRole) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: input.name,
            display_name: input.display_name,
            description: input.description,
            is_system: input.is_system,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for creating a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRole {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_system: bool,
}

/// Partial update for a role. `None` fields are left unchanged; the
/// `name` is stable and cannot be changed here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRole {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// An atomic (resource, action) capability grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub id: Uuid,
    pub resource: String,
    pub action: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Permission {
    pub fn new(input: NewPermission) -> Self {
        Self {
            id: Uuid::new_v4(),
            resource: input.resource,
            action: input.action,
            description: input.description,
            created_at: Utc::now(),
        }
    }

    /// Derived key in "{resource}.{action}" form.
    pub fn key(&self) -> String {
        format!("{}.{}", self.resource, self.action)
    }

    /// Whether this permission grants the given pair.
    pub fn grants(&self, resource: &str, action: &str) -> bool {
        self.resource == resource && self.action == action
    }
}

/// Input for creating a permission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPermission {
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Many-to-many link from a user to a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user_id: Uuid,
    pub role_id: Uuid,
    /// Who made the assignment, when known.
    pub assigned_by: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
}

impl RoleAssignment {
    pub fn new(user_id: Uuid, role_id: Uuid, assigned_by: Option<Uuid>) -> Self {
        Self {
            user_id,
            role_id,
            assigned_by,
            assigned_at: Utc::now(),
        }
    }
}

/// Many-to-many link from a role to a permission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePermission {
    pub role_id: Uuid,
    pub permission_id: Uuid,
}

/// An authenticated session: opaque bearer token plus refresh token.
///
/// Expired sessions are inert: callers must treat them as absent even
/// when they have not been physically deleted yet. Best-effort sweeping
/// removes them in the background.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    /// IP the session was issued to.
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Issue a fresh session with random opaque tokens.
    pub fn issue(
        user_id: Uuid,
        session_ttl: Duration,
        refresh_ttl: Duration,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            token: generate_token(),
            refresh_token: generate_token(),
            expires_at: now + session_ttl,
            refresh_expires_at: now + refresh_ttl,
            ip_address,
            user_agent,
            created_at: now,
        }
    }

    /// Whether the bearer token has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whether the refresh token has expired at `now`.
    pub fn is_refresh_expired(&self, now: DateTime<Utc>) -> bool {
        self.refresh_expires_at <= now
    }
}

/// 32 random bytes, URL-safe base64. Opaque to clients.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
