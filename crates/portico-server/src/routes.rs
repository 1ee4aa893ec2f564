//! Route definitions for the portal API.

use crate::state::AppState;
use crate::{handlers, middleware};
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Create the portal router with the full middleware stack.
///
/// Layer order, outermost first: trace, audit recording, session
/// authentication, then per-route permission guards. The audit layer
/// sits outside session auth and reads the actor identity that session
/// auth mirrors into the response extensions.
pub fn create_router(state: Arc<AppState>) -> Router {
    let guarded = |resource: &'static str, action: &'static str| {
        from_fn_with_state(
            (state.clone(), resource, action),
            middleware::guard::require_permission,
        )
    };

    let auth = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/logout", post(handlers::auth::logout))
        .route("/refresh", post(handlers::auth::refresh))
        .route("/me", get(handlers::auth::me));

    let admin = Router::new()
        // Roles
        .route(
            "/roles",
            get(handlers::rbac::list_roles).route_layer(guarded("roles", "read")),
        )
        .route(
            "/roles",
            post(handlers::rbac::create_role).route_layer(guarded("roles", "create")),
        )
        .route(
            "/roles/{id}",
            get(handlers::rbac::get_role).route_layer(guarded("roles", "read")),
        )
        .route(
            "/roles/{id}",
            put(handlers::rbac::update_role).route_layer(guarded("roles", "update")),
        )
        .route(
            "/roles/{id}",
            delete(handlers::rbac::delete_role).route_layer(guarded("roles", "delete")),
        )
        .route(
            "/roles/{id}/permissions/{pid}",
            post(handlers::rbac::attach_permission).route_layer(guarded("roles", "update")),
        )
        .route(
            "/roles/{id}/permissions/{pid}",
            delete(handlers::rbac::detach_permission).route_layer(guarded("roles", "update")),
        )
        // Permissions
        .route(
            "/permissions",
            get(handlers::rbac::list_permissions).route_layer(guarded("permissions", "read")),
        )
        .route(
            "/permissions",
            post(handlers::rbac::create_permission).route_layer(guarded("permissions", "create")),
        )
        .route(
            "/permissions/{id}",
            delete(handlers::rbac::delete_permission).route_layer(guarded("permissions", "delete")),
        )
        // User administration
        .route(
            "/users/{id}/roles/{rid}",
            post(handlers::rbac::assign_role).route_layer(guarded("users", "update")),
        )
        .route(
            "/users/{id}/roles/{rid}",
            delete(handlers::rbac::unassign_role).route_layer(guarded("users", "update")),
        )
        .route(
            "/users/{id}/status",
            patch(handlers::rbac::set_user_status).route_layer(guarded("users", "update")),
        )
        .route(
            "/users/{id}/verify",
            post(handlers::rbac::verify_user).route_layer(guarded("users", "update")),
        )
        // Audit trail
        .route(
            "/audit",
            get(handlers::audit::query_records).route_layer(guarded("audit", "read")),
        )
        .route(
            "/audit/{id}",
            get(handlers::audit::get_record).route_layer(guarded("audit", "read")),
        );

    Router::new()
        .route("/healthz", get(health))
        .route("/api/health", get(health))
        .nest("/api/auth", auth)
        .nest("/api/admin", admin)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::session::attach_identity,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::audit::record_requests,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true, "service": "portico" }))
}
