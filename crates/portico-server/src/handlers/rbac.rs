//! Role and permission administration handlers.
//!
//! Mutating handlers stage a `StagedBefore` snapshot on the response so
//! the audit middleware can record a before/after diff. The snapshots are
//! staged raw; redaction happens in the middleware.

use crate::context::{Identity, StagedBefore};
use crate::error::ServerError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use portico_auth::{
    NewPermission, NewRole, Permission, Role, RoleAssignment, RolePermission, UpdateRole, User,
    UserStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePermissionRequest {
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

/// A role together with its attached permissions.
#[derive(Debug, Serialize)]
pub struct RoleDetail {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<Permission>,
}

// ===== Roles =====

/// `GET /api/admin/roles`
pub async fn list_roles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Role>>, ServerError> {
    Ok(Json(state.auth_store.list_roles().await?))
}

/// `POST /api/admin/roles`
pub async fn create_role(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<Role>), ServerError> {
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(ServerError::InvalidRequest("role name is required".to_string()));
    }

    let role = Role::new(NewRole {
        display_name: body.display_name.unwrap_or_else(|| name.clone()),
        name,
        description: body.description,
        is_system: false,
    });
    state.auth_store.insert_role(&role).await?;

    tracing::info!(role_id = %role.id, name = %role.name, "role created");
    Ok((StatusCode::CREATED, Json(role)))
}

/// `GET /api/admin/roles/{id}`
pub async fn get_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoleDetail>, ServerError> {
    let Some(role) = state.auth_store.role_by_id(id).await? else {
        return Err(ServerError::NotFound(format!("role {id}")));
    };
    let permissions = state.resolver.role_permissions(id).await?;
    Ok(Json(RoleDetail { role, permissions }))
}

/// `PUT /api/admin/roles/{id}`
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateRole>,
) -> Result<(Extension<StagedBefore>, Json<Role>), ServerError> {
    let Some(role) = state.auth_store.role_by_id(id).await? else {
        return Err(ServerError::NotFound(format!("role {id}")));
    };
    if role.is_system {
        return Err(ServerError::InvalidRequest(
            "system roles cannot be modified".to_string(),
        ));
    }

    let before = StagedBefore::of(&role)?;

    let mut updated = role;
    if let Some(display_name) = body.display_name {
        updated.display_name = display_name;
    }
    if body.description.is_some() {
        updated.description = body.description;
    }
    updated.updated_at = Utc::now();
    state.auth_store.update_role(&updated).await?;

    Ok((Extension(before), Json(updated)))
}

/// `DELETE /api/admin/roles/{id}`
pub async fn delete_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<(Extension<StagedBefore>, StatusCode), ServerError> {
    let Some(role) = state.auth_store.role_by_id(id).await? else {
        return Err(ServerError::NotFound(format!("role {id}")));
    };
    if role.is_system {
        return Err(ServerError::InvalidRequest(
            "system roles cannot be deleted".to_string(),
        ));
    }

    let before = StagedBefore::of(&role)?;
    state.auth_store.delete_role(id).await?;

    tracing::info!(role_id = %id, name = %role.name, "role deleted");
    Ok((Extension(before), StatusCode::NO_CONTENT))
}

// ===== Permissions =====

/// `GET /api/admin/permissions`
pub async fn list_permissions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Permission>>, ServerError> {
    Ok(Json(state.auth_store.list_permissions().await?))
}

/// `POST /api/admin/permissions`
pub async fn create_permission(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreatePermissionRequest>,
) -> Result<(StatusCode, Json<Permission>), ServerError> {
    let resource = body.resource.trim().to_lowercase();
    let action = body.action.trim().to_lowercase();
    if resource.is_empty() || action.is_empty() {
        return Err(ServerError::InvalidRequest(
            "both resource and action are required".to_string(),
        ));
    }

    let permission = Permission::new(NewPermission {
        resource,
        action,
        description: body.description,
    });
    state.auth_store.insert_permission(&permission).await?;

    tracing::info!(permission = %permission.key(), "permission created");
    Ok((StatusCode::CREATED, Json(permission)))
}

/// `DELETE /api/admin/permissions/{id}`
pub async fn delete_permission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<(Extension<StagedBefore>, StatusCode), ServerError> {
    let Some(permission) = state.auth_store.permission_by_id(id).await? else {
        return Err(ServerError::NotFound(format!("permission {id}")));
    };

    let before = StagedBefore::of(&permission)?;
    state.auth_store.delete_permission(id).await?;

    tracing::info!(permission = %permission.key(), "permission deleted");
    Ok((Extension(before), StatusCode::NO_CONTENT))
}

/// `POST /api/admin/roles/{id}/permissions/{pid}`
///
/// Idempotent: attaching an already-attached permission leaves the single
/// link in place and still reports success.
pub async fn attach_permission(
    State(state): State<Arc<AppState>>,
    Path((id, pid)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ServerError> {
    if state.auth_store.role_by_id(id).await?.is_none() {
        return Err(ServerError::NotFound(format!("role {id}")));
    }
    if state.auth_store.permission_by_id(pid).await?.is_none() {
        return Err(ServerError::NotFound(format!("permission {pid}")));
    }

    state
        .auth_store
        .attach_permission(&RolePermission {
            role_id: id,
            permission_id: pid,
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/admin/roles/{id}/permissions/{pid}`
///
/// Detaching a link that does not exist is a no-op, not an error.
pub async fn detach_permission(
    State(state): State<Arc<AppState>>,
    Path((id, pid)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ServerError> {
    state.auth_store.detach_permission(id, pid).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ===== Users =====

/// `POST /api/admin/users/{id}/roles/{rid}`
pub async fn assign_role(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path((id, rid)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ServerError> {
    if state.auth_store.user_by_id(id).await?.is_none() {
        return Err(ServerError::NotFound(format!("user {id}")));
    }
    if state.auth_store.role_by_id(rid).await?.is_none() {
        return Err(ServerError::NotFound(format!("role {rid}")));
    }

    state
        .auth_store
        .assign_role(&RoleAssignment::new(id, rid, Some(identity.user_id)))
        .await?;

    tracing::info!(user_id = %id, role_id = %rid, assigned_by = %identity.user_id, "role assigned");
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/admin/users/{id}/roles/{rid}`
pub async fn unassign_role(
    State(state): State<Arc<AppState>>,
    Path((id, rid)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ServerError> {
    state.auth_store.unassign_role(id, rid).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PATCH /api/admin/users/{id}/status`
pub async fn set_user_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusRequest>,
) -> Result<(Extension<StagedBefore>, Json<User>), ServerError> {
    let Some(status) = UserStatus::parse(&body.status) else {
        return Err(ServerError::InvalidRequest(format!(
            "unknown status '{}'",
            body.status
        )));
    };

    let Some(current) = state.auth_store.user_by_id(id).await? else {
        return Err(ServerError::NotFound(format!("user {id}")));
    };
    let before = StagedBefore(json!({ "status": current.status.as_str() }));

    let user = state.accounts.set_status(id, status).await?;
    Ok((Extension(before), Json(user)))
}

/// `POST /api/admin/users/{id}/verify`
///
/// Administrative shortcut for completing email verification on behalf
/// of a user.
pub async fn verify_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ServerError> {
    let user = state.accounts.verify_email(id).await?;
    Ok(Json(user))
}
