//! Audit trail reporting handlers.

use crate::error::ServerError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use portico_audit::{AuditAction, AuditFilter, AuditOutcome, AuditRecord};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

/// Query parameters of `GET /api/admin/audit`. All optional; unspecified
/// fields do not constrain the result.
#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub actor_id: Option<Uuid>,
    pub entity_id: Option<Uuid>,
    pub action: Option<String>,
    pub resource: Option<String>,
    pub resource_id: Option<String>,
    pub outcome: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// `GET /api/admin/audit`: filtered audit records, newest first.
pub async fn query_records(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditQuery>,
) -> Result<Json<Vec<AuditRecord>>, ServerError> {
    let filter = build_filter(params)?;
    let records = state.audit_store.query(filter).await?;
    Ok(Json(records))
}

/// `GET /api/admin/audit/{id}`
pub async fn get_record(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AuditRecord>, ServerError> {
    let Some(record) = state.audit_store.get(id).await? else {
        return Err(ServerError::NotFound(format!("audit record {id}")));
    };
    Ok(Json(record))
}

fn build_filter(params: AuditQuery) -> Result<AuditFilter, ServerError> {
    let action = match params.action.as_deref() {
        Some(raw) => Some(AuditAction::parse(raw).ok_or_else(|| {
            ServerError::InvalidRequest(format!("unknown action '{raw}'"))
        })?),
        None => None,
    };
    let outcome = match params.outcome.as_deref() {
        Some(raw) => Some(AuditOutcome::parse(raw).ok_or_else(|| {
            ServerError::InvalidRequest(format!("unknown outcome '{raw}'"))
        })?),
        None => None,
    };

    Ok(AuditFilter {
        actor_id: params.actor_id,
        acting_entity_id: params.entity_id,
        action,
        resource: params.resource,
        resource_id: params.resource_id,
        outcome,
        start_time: params.start,
        end_time: params.end,
        limit: Some(params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)),
        offset: params.offset,
    })
}
