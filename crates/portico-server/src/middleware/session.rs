//! Bearer-token session authentication.
//!
//! Permissive: an absent or invalid token leaves the request anonymous
//! rather than rejecting it. Routes that require an identity enforce that
//! themselves through the permission guard or an explicit check, which
//! keeps public endpoints (login, registration) on the same middleware
//! stack as everything else.

use crate::context::{self, Identity};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use uuid::Uuid;

/// Resolve the bearer token to an [`Identity`] and attach it to the
/// request extensions. After the inner stack runs, the identity is
/// mirrored into the response extensions so the audit middleware (which
/// sits outside this one) can attribute the record.
pub async fn attach_identity(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let mut identity = None;

    if let Some(token) = context::bearer_token(req.headers()) {
        match state.accounts.authenticate(&token).await {
            Ok((user, _session)) => {
                let entity_id = context::header_str(req.headers(), "x-acting-entity")
                    .and_then(|value| Uuid::parse_str(value.trim()).ok());
                let id = Identity {
                    user_id: user.id,
                    entity_id,
                };
                req.extensions_mut().insert(id.clone());
                identity = Some(id);
            }
            Err(err) => {
                // The request proceeds anonymously; guarded routes will
                // reject it downstream with a clean 401.
                tracing::debug!(error = %err, "bearer token rejected");
            }
        }
    }

    let mut response = next.run(req).await;
    if let Some(id) = identity {
        response.extensions_mut().insert(id);
    }
    response
}
