//! Request auditing middleware.
//!
//! Outermost application layer (inside only the trace layer): it times
//! the request, classifies it into a `(resource, action, resource_id)`
//! triple, captures redacted query and body payloads, and hands a record
//! to the recorder once the response is known. The walk through the
//! inner stack is observational only: the middleware never changes a
//! status, never rejects a request, and a failure to record is a log
//! line, not an error.

use crate::context::{self, Identity, StagedBefore};
use crate::state::AppState;
use axum::body::{Body, HttpBody};
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use portico_audit::{
    classify, redact, should_persist, AuditAction, AuditOutcome, AuditRecord, HttpDetail,
    RecordDetail, API_PREFIX,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Paths under the API prefix that are still never audited. Paths outside
/// the prefix (health probes, static assets) are skipped wholesale.
const SKIP_PATHS: &[&str] = &["/api/health"];

/// Longest error text lifted from a non-JSON failure body.
const ERROR_TEXT_LIMIT: usize = 200;

pub async fn record_requests(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    if is_skipped(&path) {
        return next.run(req).await;
    }

    let start = Instant::now();
    let method = req.method().as_str().to_string();
    let raw_query = req.uri().query().map(|q| q.to_string());
    // ConnectInfo rides in the request extensions when the server was
    // built with connect info; test harnesses drive the router without it.
    let connect_info = req.extensions().get::<ConnectInfo<SocketAddr>>().cloned();
    let net = context::network_from(req.headers(), connect_info.as_ref());
    let classification = classify(&method, &path);

    let (req, request_body) =
        capture_request_body(req, state.config.server.body_capture_limit).await;

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let outcome = AuditOutcome::from_status(status);
    let duration_ms = start.elapsed().as_millis() as u64;

    if !should_persist(classification.action, outcome) {
        return response;
    }

    let actor = response.extensions().get::<Identity>().cloned();
    let staged = response.extensions().get::<StagedBefore>().cloned();

    let (response, error) = if outcome.is_success() {
        (response, None)
    } else {
        extract_error(response).await
    };

    let body = request_body.as_ref().map(redact);
    let query = raw_query.as_deref().and_then(query_value).map(|v| redact(&v));

    let mut builder =
        AuditRecord::builder(classification.action, classification.resource, outcome)
            .network(&net)
            .detail(RecordDetail::Http(HttpDetail {
                method,
                path,
                status,
                duration_ms,
                query,
                body: body.clone(),
                error,
            }));

    if let Some(id) = classification.resource_id {
        builder = builder.resource_id(id);
    }
    if let Some(identity) = actor {
        builder = builder.actor(identity.user_id);
        if let Some(entity_id) = identity.entity_id {
            builder = builder.acting_entity(entity_id);
        }
    }
    if let Some(StagedBefore(before)) = staged {
        builder = builder.before(redact(&before));
    }
    if let Some(after) = body {
        if matches!(
            classification.action,
            AuditAction::Create | AuditAction::Update | AuditAction::BulkCreate
        ) {
            builder = builder.after(after);
        }
    }

    state.recorder.record(builder.build());
    response
}

fn is_skipped(path: &str) -> bool {
    !path.starts_with(API_PREFIX) || SKIP_PATHS.iter().any(|skip| path.starts_with(skip))
}

/// Buffer a mutating request's body and parse it as JSON, then hand the
/// handler an identical body. Bodies of unknown or oversized length are
/// passed through untouched and the record simply carries no payload.
async fn capture_request_body(req: Request, limit: usize) -> (Request, Option<Value>) {
    if !matches!(req.method().as_str(), "POST" | "PUT" | "PATCH" | "DELETE") {
        return (req, None);
    }

    let Some(size) = req.body().size_hint().exact() else {
        return (req, None);
    };
    if size == 0 || size > limit as u64 {
        return (req, None);
    }

    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, size as usize).await {
        Ok(bytes) => bytes,
        Err(err) => {
            // The stream failed mid-read; there is nothing left to restore.
            tracing::warn!(error = %err, "failed to buffer request body for audit");
            return (Request::from_parts(parts, Body::empty()), None);
        }
    };

    let parsed = serde_json::from_slice::<Value>(&bytes).ok();
    (Request::from_parts(parts, Body::from(bytes)), parsed)
}

/// Pull an error message out of a failure response, rebuilding the
/// response around the same bytes. Streaming or oversized bodies are left
/// alone.
async fn extract_error(response: Response) -> (Response, Option<String>) {
    let Some(size) = response.body().size_hint().exact() else {
        return (response, None);
    };
    if size == 0 || size > ERROR_TEXT_LIMIT as u64 * 64 {
        return (response, None);
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, size as usize).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(error = %err, "failed to buffer failure response body");
            return (Response::from_parts(parts, Body::empty()), None);
        }
    };

    let error = error_message(&bytes);
    (Response::from_parts(parts, Body::from(bytes)), error)
}

/// Best-effort error text: the `error` or `message` field of a JSON body,
/// else the raw text truncated to a sane length.
fn error_message(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
        for key in ["error", "message"] {
            if let Some(message) = value.get(key).and_then(Value::as_str) {
                return Some(message.to_string());
            }
        }
    }

    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(truncate(trimmed, ERROR_TEXT_LIMIT))
}

/// Parse a raw query string into a JSON object for redaction. Values stay
/// percent-encoded; the audit trail wants the keys and shapes, not a
/// faithful decode.
fn query_value(raw: &str) -> Option<Value> {
    let mut map = serde_json::Map::new();
    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
    if map.is_empty() {
        return None;
    }
    Some(Value::Object(map))
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
