//! Authentication handlers: registration, login, logout, refresh, and
//! the current-identity endpoint.

use crate::context::{self, Identity};
use crate::error::ServerError;
use crate::state::AppState;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use portico_auth::{Session, User};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token pair issued on login and refresh. The embedded `User` serializes
/// without its credential fields.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub user: User,
}

impl SessionResponse {
    fn new(user: User, session: Session) -> Self {
        Self {
            token: session.token,
            refresh_token: session.refresh_token,
            expires_at: session.expires_at,
            refresh_expires_at: session.refresh_expires_at,
            user,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

/// `POST /api/auth/register`
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), ServerError> {
    if !body.email.contains('@') {
        return Err(ServerError::InvalidRequest(
            "a valid email address is required".to_string(),
        ));
    }
    if body.password.len() < 8 {
        return Err(ServerError::InvalidRequest(
            "password must be at least 8 characters".to_string(),
        ));
    }

    let user = state.accounts.register(&body.email, &body.password).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<Arc<AppState>>,
    connect_info: Option<Extension<ConnectInfo<SocketAddr>>>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ServerError> {
    let net = context::network_from(&headers, connect_info.as_ref().map(|Extension(info)| info));
    let (user, session) = state.accounts.login(&body.email, &body.password, &net).await?;
    Ok(Json(SessionResponse::new(user, session)))
}

/// `POST /api/auth/logout`
///
/// Reads the bearer token straight from the header rather than requiring
/// an authenticated identity: a token whose session already expired can
/// still be logged out, and a missing token is simply nothing to revoke.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    connect_info: Option<Extension<ConnectInfo<SocketAddr>>>,
    headers: HeaderMap,
) -> Result<StatusCode, ServerError> {
    let net = context::network_from(&headers, connect_info.as_ref().map(|Extension(info)| info));
    if let Some(token) = context::bearer_token(&headers) {
        state.accounts.logout(&token, &net).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/auth/refresh`
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    connect_info: Option<Extension<ConnectInfo<SocketAddr>>>,
    headers: HeaderMap,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<SessionResponse>, ServerError> {
    let net = context::network_from(&headers, connect_info.as_ref().map(|Extension(info)| info));
    let (user, session) = state.accounts.refresh(&body.refresh_token, &net).await?;
    Ok(Json(SessionResponse::new(user, session)))
}

/// `GET /api/auth/me`: the authenticated user with role names and
/// effective permission keys, resolved fresh on every call.
pub async fn me(
    State(state): State<Arc<AppState>>,
    identity: Option<Extension<Identity>>,
) -> Result<Json<MeResponse>, ServerError> {
    let Some(Extension(identity)) = identity else {
        return Err(ServerError::Unauthorized);
    };

    let Some(user) = state.auth_store.user_by_id(identity.user_id).await? else {
        return Err(ServerError::Unauthorized);
    };

    let roles = state.resolver.user_roles(identity.user_id).await?;
    let permissions = state.resolver.user_permissions(identity.user_id).await?;

    Ok(Json(MeResponse {
        user,
        roles: roles.into_iter().map(|role| role.name).collect(),
        permissions: permissions.iter().map(|p| p.key()).collect(),
    }))
}
