//! Auth storage backends.
//!
//! Everything the resolver and account service need is behind
//! [`AuthStore`], so tests run against [`MemoryAuthStore`] and production
//! runs against the Postgres implementation in `portico-pg`. All lookups
//! are point reads; nothing here caches.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::AuthError;
use crate::model::{Permission, Role, RoleAssignment, RolePermission, Session, User};

/// Trait for auth storage backends.
#[async_trait]
pub trait AuthStore: Send + Sync {
    // ===== Users =====

    /// Insert a new user. Fails with [`AuthError::Conflict`] when the
    /// email is already taken.
    async fn insert_user(&self, user: &User) -> Result<(), AuthError>;

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError>;

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    /// Persist the current state of a user row (status, counters,
    /// lockout, verification, login timestamps).
    async fn update_user(&self, user: &User) -> Result<(), AuthError>;

    // ===== Roles =====

    /// Insert a new role. Fails with [`AuthError::Conflict`] when the
    /// name is already taken.
    async fn insert_role(&self, role: &Role) -> Result<(), AuthError>;

    async fn role_by_id(&self, id: Uuid) -> Result<Option<Role>, AuthError>;

    async fn role_by_name(&self, name: &str) -> Result<Option<Role>, AuthError>;

    async fn list_roles(&self) -> Result<Vec<Role>, AuthError>;

    async fn update_role(&self, role: &Role) -> Result<(), AuthError>;

    /// Delete a role. Returns whether it existed. Backends need not clean
    /// up assignments or links that reference it; readers treat any
    /// dangling reference as absence.
    async fn delete_role(&self, id: Uuid) -> Result<bool, AuthError>;

    // ===== Permissions =====

    /// Insert a new permission. Fails with [`AuthError::Conflict`] when
    /// the (resource, action) pair already exists.
    async fn insert_permission(&self, permission: &Permission) -> Result<(), AuthError>;

    async fn permission_by_id(&self, id: Uuid) -> Result<Option<Permission>, AuthError>;

    async fn list_permissions(&self) -> Result<Vec<Permission>, AuthError>;

    /// Delete a permission. Returns whether it existed.
    async fn delete_permission(&self, id: Uuid) -> Result<bool, AuthError>;

    // ===== User-role assignments =====

    /// Assign a role to a user. Assigning an already-held role is
    /// idempotent: no duplicate row, no error.
    async fn assign_role(&self, assignment: &RoleAssignment) -> Result<(), AuthError>;

    /// Remove a role from a user. Removing an assignment that does not
    /// exist is a no-op.
    async fn unassign_role(&self, user_id: Uuid, role_id: Uuid) -> Result<(), AuthError>;

    async fn assignments_for_user(&self, user_id: Uuid)
        -> Result<Vec<RoleAssignment>, AuthError>;

    // ===== Role-permission links =====

    /// Attach a permission to a role. Attaching an already-linked
    /// permission is idempotent: no duplicate row, no error.
    async fn attach_permission(&self, link: &RolePermission) -> Result<(), AuthError>;

    /// Detach a permission from a role. Detaching a link that does not
    /// exist is a no-op.
    async fn detach_permission(&self, role_id: Uuid, permission_id: Uuid)
        -> Result<(), AuthError>;

    async fn links_for_role(&self, role_id: Uuid) -> Result<Vec<RolePermission>, AuthError>;

    // ===== Sessions =====

    async fn insert_session(&self, session: &Session) -> Result<(), AuthError>;

    async fn session_by_token(&self, token: &str) -> Result<Option<Session>, AuthError>;

    async fn session_by_refresh_token(&self, token: &str)
        -> Result<Option<Session>, AuthError>;

    async fn delete_session(&self, id: Uuid) -> Result<(), AuthError>;

    /// Delete every session whose refresh expiry has passed. Returns the
    /// number removed.
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AuthError>;
}

#[derive(Default)]
struct MemoryInner {
    users: HashMap<Uuid, User>,
    roles: HashMap<Uuid, Role>,
    permissions: HashMap<Uuid, Permission>,
    assignments: Vec<RoleAssignment>,
    links: Vec<RolePermission>,
    sessions: HashMap<Uuid, Session>,
}

/// In-memory auth store for development and tests.
#[derive(Default)]
pub struct MemoryAuthStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryInner>, AuthError> {
        self.inner
            .read()
            .map_err(|e| AuthError::Store(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryInner>, AuthError> {
        self.inner
            .write()
            .map_err(|e| AuthError::Store(format!("lock poisoned: {e}")))
    }
}

#[async_trait]
impl AuthStore for MemoryAuthStore {
    async fn insert_user(&self, user: &User) -> Result<(), AuthError> {
        let mut inner = self.write()?;
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(AuthError::Conflict(format!(
                "email already registered: {}",
                user.email
            )));
        }
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        Ok(self.read()?.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, user: &User) -> Result<(), AuthError> {
        let mut inner = self.write()?;
        if !inner.users.contains_key(&user.id) {
            return Err(AuthError::NotFound(format!("user {}", user.id)));
        }
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn insert_role(&self, role: &Role) -> Result<(), AuthError> {
        let mut inner = self.write()?;
        if inner.roles.values().any(|r| r.name == role.name) {
            return Err(AuthError::Conflict(format!("role name taken: {}", role.name)));
        }
        inner.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn role_by_id(&self, id: Uuid) -> Result<Option<Role>, AuthError> {
        Ok(self.read()?.roles.get(&id).cloned())
    }

    async fn role_by_name(&self, name: &str) -> Result<Option<Role>, AuthError> {
        Ok(self.read()?.roles.values().find(|r| r.name == name).cloned())
    }

    async fn list_roles(&self) -> Result<Vec<Role>, AuthError> {
        let mut roles: Vec<_> = self.read()?.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn update_role(&self, role: &Role) -> Result<(), AuthError> {
        let mut inner = self.write()?;
        if !inner.roles.contains_key(&role.id) {
            return Err(AuthError::NotFound(format!("role {}", role.id)));
        }
        inner.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn delete_role(&self, id: Uuid) -> Result<bool, AuthError> {
        Ok(self.write()?.roles.remove(&id).is_some())
    }

    async fn insert_permission(&self, permission: &Permission) -> Result<(), AuthError> {
        let mut inner = self.write()?;
        if inner
            .permissions
            .values()
            .any(|p| p.resource == permission.resource && p.action == permission.action)
        {
            return Err(AuthError::Conflict(format!(
                "permission exists: {}",
                permission.key()
            )));
        }
        inner.permissions.insert(permission.id, permission.clone());
        Ok(())
    }

    async fn permission_by_id(&self, id: Uuid) -> Result<Option<Permission>, AuthError> {
        Ok(self.read()?.permissions.get(&id).cloned())
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, AuthError> {
        let mut permissions: Vec<_> = self.read()?.permissions.values().cloned().collect();
        permissions.sort_by_key(|p| p.key());
        Ok(permissions)
    }

    async fn delete_permission(&self, id: Uuid) -> Result<bool, AuthError> {
        Ok(self.write()?.permissions.remove(&id).is_some())
    }

    async fn assign_role(&self, assignment: &RoleAssignment) -> Result<(), AuthError> {
        let mut inner = self.write()?;
        let exists = inner
            .assignments
            .iter()
            .any(|a| a.user_id == assignment.user_id && a.role_id == assignment.role_id);
        if !exists {
            inner.assignments.push(assignment.clone());
        }
        Ok(())
    }

    async fn unassign_role(&self, user_id: Uuid, role_id: Uuid) -> Result<(), AuthError> {
        self.write()?
            .assignments
            .retain(|a| !(a.user_id == user_id && a.role_id == role_id));
        Ok(())
    }

    async fn assignments_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<RoleAssignment>, AuthError> {
        Ok(self
            .read()?
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn attach_permission(&self, link: &RolePermission) -> Result<(), AuthError> {
        let mut inner = self.write()?;
        let exists = inner
            .links
            .iter()
            .any(|l| l.role_id == link.role_id && l.permission_id == link.permission_id);
        if !exists {
            inner.links.push(link.clone());
        }
        Ok(())
    }

    async fn detach_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> Result<(), AuthError> {
        self.write()?
            .links
            .retain(|l| !(l.role_id == role_id && l.permission_id == permission_id));
        Ok(())
    }

    async fn links_for_role(&self, role_id: Uuid) -> Result<Vec<RolePermission>, AuthError> {
        Ok(self
            .read()?
            .links
            .iter()
            .filter(|l| l.role_id == role_id)
            .cloned()
            .collect())
    }

    async fn insert_session(&self, session: &Session) -> Result<(), AuthError> {
        self.write()?.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn session_by_token(&self, token: &str) -> Result<Option<Session>, AuthError> {
        Ok(self
            .read()?
            .sessions
            .values()
            .find(|s| s.token == token)
            .cloned())
    }

    async fn session_by_refresh_token(
        &self,
        token: &str,
    ) -> Result<Option<Session>, AuthError> {
        Ok(self
            .read()?
            .sessions
            .values()
            .find(|s| s.refresh_token == token)
            .cloned())
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), AuthError> {
        self.write()?.sessions.remove(&id);
        Ok(())
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let mut inner = self.write()?;
        let before = inner.sessions.len();
        inner.sessions.retain(|_, s| s.refresh_expires_at > now);
        Ok((before - inner.sessions.len()) as u64)
    }
}
