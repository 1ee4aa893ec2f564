//! Postgres audit storage.

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use portico_audit::{
    AuditAction, AuditError, AuditFilter, AuditOutcome, AuditRecord, AuditStore, ChangeSet,
    RecordDetail,
};

use crate::args_add;

const RECORD_COLUMNS: &str = "id, actor_id, acting_entity_id, action, resource, resource_id, \
     outcome, ip_address, user_agent, before_state, after_state, detail, created_at";

/// Audit storage backed by the `audit_records` table.
///
/// Enum fields are stored as their serialized text names and the typed
/// detail payload as JSONB, so the table stays queryable with plain SQL.
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn append(&self, record: AuditRecord) -> Result<(), AuditError> {
        let detail = serde_json::to_value(&record.detail)?;
        let (before, after) = match &record.changes {
            Some(changes) => (changes.before.clone(), changes.after.clone()),
            None => (None, None),
        };

        sqlx::query(
            "INSERT INTO audit_records (id, actor_id, acting_entity_id, action, resource, \
             resource_id, outcome, ip_address, user_agent, before_state, after_state, detail, \
             created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(record.id)
        .bind(record.actor_id)
        .bind(record.acting_entity_id)
        .bind(record.action.as_str())
        .bind(&record.resource)
        .bind(&record.resource_id)
        .bind(record.outcome.as_str())
        .bind(&record.ip_address)
        .bind(&record.user_agent)
        .bind(before)
        .bind(after)
        .bind(detail)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AuditError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
        let mut where_parts: Vec<String> = Vec::new();
        let mut args = PgArguments::default();
        let mut idx: usize = 1;

        if let Some(actor) = filter.actor_id {
            where_parts.push(format!("actor_id = ${idx}"));
            args_add(&mut args, actor)?;
            idx += 1;
        }
        if let Some(entity) = filter.acting_entity_id {
            where_parts.push(format!("acting_entity_id = ${idx}"));
            args_add(&mut args, entity)?;
            idx += 1;
        }
        if let Some(action) = filter.action {
            where_parts.push(format!("action = ${idx}"));
            args_add(&mut args, action.as_str().to_string())?;
            idx += 1;
        }
        if let Some(resource) = filter.resource {
            where_parts.push(format!("resource = ${idx}"));
            args_add(&mut args, resource)?;
            idx += 1;
        }
        if let Some(resource_id) = filter.resource_id {
            where_parts.push(format!("resource_id = ${idx}"));
            args_add(&mut args, resource_id)?;
            idx += 1;
        }
        if let Some(outcome) = filter.outcome {
            where_parts.push(format!("outcome = ${idx}"));
            args_add(&mut args, outcome.as_str().to_string())?;
            idx += 1;
        }
        if let Some(start) = filter.start_time {
            where_parts.push(format!("created_at >= ${idx}"));
            args_add(&mut args, start)?;
            idx += 1;
        }
        if let Some(end) = filter.end_time {
            where_parts.push(format!("created_at <= ${idx}"));
            args_add(&mut args, end)?;
            idx += 1;
        }

        let mut sql = format!("SELECT {RECORD_COLUMNS} FROM audit_records");
        if !where_parts.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_parts.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT ${idx}"));
            args_add(&mut args, limit as i64)?;
            idx += 1;
        }
        if let Some(offset) = filter.offset {
            sql.push_str(&format!(" OFFSET ${idx}"));
            args_add(&mut args, offset as i64)?;
        }

        let rows = sqlx::query_with(&sql, args)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AuditError::QueryFailed(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(record_from_row(row)?);
        }
        Ok(records)
    }

    async fn get(&self, id: Uuid) -> Result<Option<AuditRecord>, AuditError> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM audit_records WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuditError::QueryFailed(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(record_from_row(&row)?)),
            None => Ok(None),
        }
    }
}

fn record_from_row(row: &PgRow) -> anyhow::Result<AuditRecord> {
    let action_text: String = row.try_get("action")?;
    let action = AuditAction::parse(&action_text)
        .ok_or_else(|| anyhow::anyhow!("unrecognized audit action '{action_text}'"))?;

    let outcome_text: String = row.try_get("outcome")?;
    let outcome = AuditOutcome::parse(&outcome_text)
        .ok_or_else(|| anyhow::anyhow!("unrecognized audit outcome '{outcome_text}'"))?;

    let before: Option<serde_json::Value> = row.try_get("before_state")?;
    let after: Option<serde_json::Value> = row.try_get("after_state")?;
    let changes = if before.is_none() && after.is_none() {
        None
    } else {
        Some(ChangeSet { before, after })
    };

    let detail: RecordDetail = serde_json::from_value(row.try_get("detail")?)?;

    Ok(AuditRecord {
        id: row.try_get("id")?,
        actor_id: row.try_get("actor_id")?,
        acting_entity_id: row.try_get("acting_entity_id")?,
        action,
        resource: row.try_get("resource")?,
        resource_id: row.try_get("resource_id")?,
        outcome,
        ip_address: row.try_get("ip_address")?,
        user_agent: row.try_get("user_agent")?,
        changes,
        detail,
        created_at: row.try_get("created_at")?,
    })
}
