//! Request-scoped context types.
//!
//! The session middleware inserts an [`Identity`] into the request
//! extensions and mirrors it into the response extensions, so both the
//! handlers downstream and the audit middleware upstream can see who
//! acted. Handlers that mutate a record may stage a [`StagedBefore`]
//! snapshot on their response; the audit middleware folds it into the
//! record's change set.

use axum::extract::ConnectInfo;
use axum::http::header::{AsHeaderName, AUTHORIZATION, USER_AGENT};
use axum::http::HeaderMap;
use portico_audit::NetworkContext;
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use uuid::Uuid;

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct Identity {
    /// The user behind the session token.
    pub user_id: Uuid,

    /// Organizational entity the caller is operating as, when the client
    /// declared one.
    pub entity_id: Option<Uuid>,
}

/// A pre-mutation snapshot staged by a handler for the audit trail.
///
/// The value is stored raw here; redaction happens when the audit
/// middleware assembles the record.
#[derive(Debug, Clone)]
pub struct StagedBefore(pub Value);

impl StagedBefore {
    /// Capture a serializable value as the before-state.
    pub fn of<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self(serde_json::to_value(value)?))
    }
}

/// Read a header as a string, tolerating absent or non-UTF-8 values.
pub fn header_str(headers: &HeaderMap, name: impl AsHeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Extract the bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = header_str(headers, AUTHORIZATION)?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

/// Build the client network context from forwarding headers and the peer
/// socket. `ConnectInfo` is optional because test harnesses drive the
/// router without a real connection.
pub fn network_from(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> NetworkContext {
    let socket = connect_info.map(|ConnectInfo(addr)| addr.ip().to_string());
    NetworkContext::from_parts(
        header_str(headers, "x-forwarded-for"),
        header_str(headers, "x-real-ip"),
        socket.as_deref(),
        header_str(headers, USER_AGENT),
    )
}
