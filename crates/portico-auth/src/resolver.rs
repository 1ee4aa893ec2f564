//! Permission resolution.
//!
//! Walks user -> role -> permission chains against the store on every
//! call. There is no cache layer: a revoked role or detached permission
//! stops granting access on the very next check. References to rows
//! that no longer exist are skipped, never errors.

use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AuthError;
use crate::model::{Permission, Role};
use crate::store::AuthStore;

/// Resolves effective roles and permissions for users.
#[derive(Clone)]
pub struct PermissionResolver {
    store: Arc<dyn AuthStore>,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self { store }
    }

    /// Roles currently assigned to a user. Assignments pointing at a
    /// deleted role are dropped from the result.
    pub async fn user_roles(&self, user_id: Uuid) -> Result<Vec<Role>, AuthError> {
        let assignments = self.store.assignments_for_user(user_id).await?;
        let mut roles = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            if let Some(role) = self.store.role_by_id(assignment.role_id).await? {
                roles.push(role);
            }
        }
        Ok(roles)
    }

    /// Permissions attached to a role. Links pointing at a deleted
    /// permission are dropped from the result.
    pub async fn role_permissions(&self, role_id: Uuid) -> Result<Vec<Permission>, AuthError> {
        let links = self.store.links_for_role(role_id).await?;
        let mut permissions = Vec::with_capacity(links.len());
        for link in links {
            if let Some(permission) = self.store.permission_by_id(link.permission_id).await? {
                permissions.push(permission);
            }
        }
        Ok(permissions)
    }

    /// Union of permissions across all of a user's roles, deduplicated
    /// by (resource, action).
    pub async fn user_permissions(&self, user_id: Uuid) -> Result<Vec<Permission>, AuthError> {
        let mut seen = HashSet::new();
        let mut permissions = Vec::new();
        for role in self.user_roles(user_id).await? {
            for permission in self.role_permissions(role.id).await? {
                if seen.insert(permission.key()) {
                    permissions.push(permission);
                }
            }
        }
        Ok(permissions)
    }

    /// Whether the user holds a permission granting `action` on
    /// `resource` through any assigned role. Returns on the first match.
    pub async fn user_has_permission(
        &self,
        user_id: Uuid,
        resource: &str,
        action: &str,
    ) -> Result<bool, AuthError> {
        for role in self.user_roles(user_id).await? {
            for permission in self.role_permissions(role.id).await? {
                if permission.grants(resource, action) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}
