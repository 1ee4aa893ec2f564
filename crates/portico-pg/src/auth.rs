//! Postgres auth storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use portico_auth::{
    AuthError, AuthStore, Permission, Role, RoleAssignment, RolePermission, Session, User,
    UserStatus,
};

const USER_COLUMNS: &str = "id, email, password_hash, status, email_verified, mfa_enabled, \
     mfa_secret, failed_login_attempts, locked_until, last_login_at, created_at, updated_at";

const ROLE_COLUMNS: &str = "id, name, display_name, description, is_system, created_at, updated_at";

const PERMISSION_COLUMNS: &str = "id, resource, action, description, created_at";

const SESSION_COLUMNS: &str = "id, user_id, token, refresh_token, expires_at, \
     refresh_expires_at, ip_address, user_agent, created_at";

/// Auth storage backed by the relational schema in `migrations/`.
///
/// Junction tables carry foreign keys with `ON DELETE CASCADE`, so this
/// backend cleans up assignments and links eagerly; the resolver's
/// dangling-reference tolerance still applies to anything it missed.
pub struct PgAuthStore {
    pool: PgPool,
}

impl PgAuthStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthStore for PgAuthStore {
    async fn insert_user(&self, user: &User) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, status, email_verified, mfa_enabled, \
             mfa_secret, failed_login_attempts, locked_until, last_login_at, created_at, \
             updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.status.as_str())
        .bind(user.email_verified)
        .bind(user.mfa_enabled)
        .bind(&user.mfa_secret)
        .bind(user.failed_login_attempts as i32)
        .bind(user.locked_until)
        .bind(user.last_login_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err(&format!("insert user {}", user.email), e))?;
        Ok(())
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err("load user", e))?;
        decode_optional(row, user_from_row)
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err("load user by email", e))?;
        decode_optional(row, user_from_row)
    }

    async fn update_user(&self, user: &User) -> Result<(), AuthError> {
        let result = sqlx::query(
            "UPDATE users SET email = $2, password_hash = $3, status = $4, email_verified = $5, \
             mfa_enabled = $6, mfa_secret = $7, failed_login_attempts = $8, locked_until = $9, \
             last_login_at = $10, updated_at = $11 WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.status.as_str())
        .bind(user.email_verified)
        .bind(user.mfa_enabled)
        .bind(&user.mfa_secret)
        .bind(user.failed_login_attempts as i32)
        .bind(user.locked_until)
        .bind(user.last_login_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("update user", e))?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound(format!("user {}", user.id)));
        }
        Ok(())
    }

    async fn insert_role(&self, role: &Role) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO roles (id, name, display_name, description, is_system, created_at, \
             updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(role.id)
        .bind(&role.name)
        .bind(&role.display_name)
        .bind(&role.description)
        .bind(role.is_system)
        .bind(role.created_at)
        .bind(role.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err(&format!("insert role {}", role.name), e))?;
        Ok(())
    }

    async fn role_by_id(&self, id: Uuid) -> Result<Option<Role>, AuthError> {
        let row = sqlx::query(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err("load role", e))?;
        decode_optional(row, role_from_row)
    }

    async fn role_by_name(&self, name: &str) -> Result<Option<Role>, AuthError> {
        let row = sqlx::query(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE name = $1"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err("load role by name", e))?;
        decode_optional(row, role_from_row)
    }

    async fn list_roles(&self) -> Result<Vec<Role>, AuthError> {
        let rows = sqlx::query(&format!("SELECT {ROLE_COLUMNS} FROM roles ORDER BY name"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_err("list roles", e))?;
        decode_all(&rows, role_from_row)
    }

    async fn update_role(&self, role: &Role) -> Result<(), AuthError> {
        let result = sqlx::query(
            "UPDATE roles SET name = $2, display_name = $3, description = $4, is_system = $5, \
             updated_at = $6 WHERE id = $1",
        )
        .bind(role.id)
        .bind(&role.name)
        .bind(&role.display_name)
        .bind(&role.description)
        .bind(role.is_system)
        .bind(role.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("update role", e))?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound(format!("role {}", role.id)));
        }
        Ok(())
    }

    async fn delete_role(&self, id: Uuid) -> Result<bool, AuthError> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| store_err("delete role", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_permission(&self, permission: &Permission) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO permissions (id, resource, action, description, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(permission.id)
        .bind(&permission.resource)
        .bind(&permission.action)
        .bind(&permission.description)
        .bind(permission.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err(&format!("insert permission {}", permission.key()), e))?;
        Ok(())
    }

    async fn permission_by_id(&self, id: Uuid) -> Result<Option<Permission>, AuthError> {
        let row = sqlx::query(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("load permission", e))?;
        decode_optional(row, permission_from_row)
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, AuthError> {
        let rows = sqlx::query(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions ORDER BY resource, action"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("list permissions", e))?;
        decode_all(&rows, permission_from_row)
    }

    async fn delete_permission(&self, id: Uuid) -> Result<bool, AuthError> {
        let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| store_err("delete permission", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn assign_role(&self, assignment: &RoleAssignment) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id, assigned_by, assigned_at) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (user_id, role_id) DO NOTHING",
        )
        .bind(assignment.user_id)
        .bind(assignment.role_id)
        .bind(assignment.assigned_by)
        .bind(assignment.assigned_at)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("assign role", e))?;
        Ok(())
    }

    async fn unassign_role(&self, user_id: Uuid, role_id: Uuid) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await
            .map_err(|e| store_err("unassign role", e))?;
        Ok(())
    }

    async fn assignments_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<RoleAssignment>, AuthError> {
        let rows = sqlx::query(
            "SELECT user_id, role_id, assigned_by, assigned_at FROM user_roles \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("load role assignments", e))?;
        decode_all(&rows, assignment_from_row)
    }

    async fn attach_permission(&self, link: &RolePermission) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2) \
             ON CONFLICT (role_id, permission_id) DO NOTHING",
        )
        .bind(link.role_id)
        .bind(link.permission_id)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("attach permission", e))?;
        Ok(())
    }

    async fn detach_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2")
            .bind(role_id)
            .bind(permission_id)
            .execute(&self.pool)
            .await
            .map_err(|e| store_err("detach permission", e))?;
        Ok(())
    }

    async fn links_for_role(&self, role_id: Uuid) -> Result<Vec<RolePermission>, AuthError> {
        let rows = sqlx::query(
            "SELECT role_id, permission_id FROM role_permissions WHERE role_id = $1",
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("load permission links", e))?;
        decode_all(&rows, link_from_row)
    }

    async fn insert_session(&self, session: &Session) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO sessions (id, user_id, token, refresh_token, expires_at, \
             refresh_expires_at, ip_address, user_agent, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.token)
        .bind(&session.refresh_token)
        .bind(session.expires_at)
        .bind(session.refresh_expires_at)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("insert session", e))?;
        Ok(())
    }

    async fn session_by_token(&self, token: &str) -> Result<Option<Session>, AuthError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("load session", e))?;
        decode_optional(row, session_from_row)
    }

    async fn session_by_refresh_token(
        &self,
        token: &str,
    ) -> Result<Option<Session>, AuthError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE refresh_token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("load session by refresh token", e))?;
        decode_optional(row, session_from_row)
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| store_err("delete session", e))?;
        Ok(())
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM sessions WHERE refresh_expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| store_err("purge sessions", e))?;
        Ok(result.rows_affected())
    }
}

fn store_err(context: &str, err: sqlx::Error) -> AuthError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AuthError::Conflict(context.to_string())
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            AuthError::NotFound(context.to_string())
        }
        _ => AuthError::Store(format!("{context}: {err}")),
    }
}

fn decode_optional<T>(
    row: Option<PgRow>,
    decode: fn(&PgRow) -> anyhow::Result<T>,
) -> Result<Option<T>, AuthError> {
    row.map(|r| decode(&r))
        .transpose()
        .map_err(|e| AuthError::Store(e.to_string()))
}

fn decode_all<T>(
    rows: &[PgRow],
    decode: fn(&PgRow) -> anyhow::Result<T>,
) -> Result<Vec<T>, AuthError> {
    rows.iter()
        .map(|r| decode(r).map_err(|e| AuthError::Store(e.to_string())))
        .collect()
}

fn user_from_row(row: &PgRow) -> anyhow::Result<User> {
    let status_text: String = row.try_get("status")?;
    let status = UserStatus::parse(&status_text)
        .ok_or_else(|| anyhow::anyhow!("unrecognized user status '{status_text}'"))?;
    let failed_login_attempts: i32 = row.try_get("failed_login_attempts")?;

    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        status,
        email_verified: row.try_get("email_verified")?,
        mfa_enabled: row.try_get("mfa_enabled")?,
        mfa_secret: row.try_get("mfa_secret")?,
        failed_login_attempts: failed_login_attempts as u32,
        locked_until: row.try_get("locked_until")?,
        last_login_at: row.try_get("last_login_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn role_from_row(row: &PgRow) -> anyhow::Result<Role> {
    Ok(Role {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        display_name: row.try_get("display_name")?,
        description: row.try_get("description")?,
        is_system: row.try_get("is_system")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn permission_from_row(row: &PgRow) -> anyhow::Result<Permission> {
    Ok(Permission {
        id: row.try_get("id")?,
        resource: row.try_get("resource")?,
        action: row.try_get("action")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
    })
}

fn assignment_from_row(row: &PgRow) -> anyhow::Result<RoleAssignment> {
    Ok(RoleAssignment {
        user_id: row.try_get("user_id")?,
        role_id: row.try_get("role_id")?,
        assigned_by: row.try_get("assigned_by")?,
        assigned_at: row.try_get("assigned_at")?,
    })
}

fn link_from_row(row: &PgRow) -> anyhow::Result<RolePermission> {
    Ok(RolePermission {
        role_id: row.try_get("role_id")?,
        permission_id: row.try_get("permission_id")?,
    })
}

fn session_from_row(row: &PgRow) -> anyhow::Result<Session> {
    Ok(Session {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        token: row.try_get("token")?,
        refresh_token: row.try_get("refresh_token")?,
        expires_at: row.try_get("expires_at")?,
        refresh_expires_at: row.try_get("refresh_expires_at")?,
        ip_address: row.try_get("ip_address")?,
        user_agent: row.try_get("user_agent")?,
        created_at: row.try_get("created_at")?,
    })
}
