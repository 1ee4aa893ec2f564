//! Per-route permission guards.

use crate::context::Identity;
use crate::error::ServerError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

/// Route-layer middleware requiring one `resource.action` permission.
///
/// Applied per route with the required capability baked into the state
/// tuple. Distinguishes the two refusals: no identity at all is a 401,
/// an identity without the permission is a 403. The permission lookup is
/// a fresh read on every request; a revocation is effective on the next
/// call.
pub async fn require_permission(
    State((state, resource, action)): State<(Arc<AppState>, &'static str, &'static str)>,
    req: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let Some(identity) = req.extensions().get::<Identity>().cloned() else {
        return Err(ServerError::Unauthorized);
    };

    let allowed = state
        .resolver
        .user_has_permission(identity.user_id, resource, action)
        .await?;

    if !allowed {
        tracing::warn!(
            user_id = %identity.user_id,
            resource,
            action,
            "permission denied"
        );
        return Err(ServerError::Forbidden(format!("{resource}.{action}")));
    }

    Ok(next.run(req).await)
}
