//! Append-only audit log.
//!
//! Every mutation of an [`Entity`] appends exactly one record inside the same
//! database transaction as the mutation itself. A failed audit insert fails
//! the whole operation; provenance is never dropped silently. Records are
//! hash-chained and the table rejects UPDATE and DELETE.

mod chain;
mod query;

pub use chain::{verify_chain, ChainReport};
pub use query::{list, AuditPage, AuditQuery};

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, SqliteConnection};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{Entity, EntityKind};
use crate::errors::{AppError, AppResult};
use crate::utils::utc_now;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Restore,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
            AuditAction::Restore => "RESTORE",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(AuditAction::Create),
            "UPDATE" => Ok(AuditAction::Update),
            "DELETE" => Ok(AuditAction::Delete),
            "RESTORE" => Ok(AuditAction::Restore),
            other => Err(AppError::validation(format!("unknown audit action: {other}"))),
        }
    }
}

/// Origin of a request, captured alongside each audit record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from)
            });

        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Self { ip, user_agent }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// One audit record as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditRecord {
    pub id: Uuid,
    pub seq: i64,
    pub actor_id: Option<Uuid>,
    pub action: AuditAction,
    pub entity_type: EntityKind,
    pub entity_id: Uuid,
    #[schema(value_type = Option<Object>)]
    pub prior_state: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub new_state: Option<Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub prev_hash: Option<String>,
    pub hash: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbAuditRecord {
    pub seq: i64,
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub prior_state: Option<String>,
    pub new_state: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub prev_hash: Option<String>,
    pub hash: String,
}

pub(crate) const AUDIT_COLUMNS: &str = "seq, id, actor_id, action, entity_type, entity_id, prior_state, new_state, \
     ip_address, user_agent, occurred_at, prev_hash, hash";

fn parse_state(raw: Option<String>) -> AppResult<Option<Value>> {
    raw.map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|err| AppError::internal(format!("corrupt audit snapshot: {err}")))
}

impl TryFrom<DbAuditRecord> for AuditRecord {
    type Error = AppError;

    fn try_from(db: DbAuditRecord) -> Result<Self, Self::Error> {
        Ok(AuditRecord {
            id: db.id,
            seq: db.seq,
            actor_id: db.actor_id,
            action: db.action.parse()?,
            entity_type: db.entity_type.parse()?,
            entity_id: db.entity_id,
            prior_state: parse_state(db.prior_state)?,
            new_state: parse_state(db.new_state)?,
            ip_address: db.ip_address,
            user_agent: db.user_agent,
            occurred_at: db.occurred_at,
            prev_hash: db.prev_hash,
            hash: db.hash,
        })
    }
}

/// Input to [`record`]. Snapshots are stored as serialized JSON.
#[derive(Debug, Clone)]
pub struct NewAuditRecord {
    pub actor_id: Option<Uuid>,
    pub action: AuditAction,
    pub entity_type: EntityKind,
    pub entity_id: Uuid,
    pub prior_state: Option<Value>,
    pub new_state: Option<Value>,
    pub context: RequestContext,
}

/// Appends one record. Must run on a connection inside the transaction that
/// performed the mutation, after that mutation, so the write lock is already
/// held while the chain head is read.
pub async fn record(conn: &mut SqliteConnection, entry: NewAuditRecord) -> AppResult<AuditRecord> {
    let id = Uuid::new_v4();
    let occurred_at = utc_now();
    let prior_state = entry.prior_state.as_ref().map(Value::to_string);
    let new_state = entry.new_state.as_ref().map(Value::to_string);

    let prev_hash: Option<String> = sqlx::query_scalar("SELECT hash FROM audit_logs ORDER BY seq DESC LIMIT 1")
        .fetch_optional(&mut *conn)
        .await?;

    let hash = chain::compute_hash(
        prev_hash.as_deref(),
        &chain::HashInput {
            id,
            actor_id: entry.actor_id,
            action: entry.action.as_str(),
            entity_type: entry.entity_type.as_str(),
            entity_id: entry.entity_id,
            prior_state: prior_state.as_deref(),
            new_state: new_state.as_deref(),
            occurred_at,
        },
    );

    let seq = sqlx::query(
        "INSERT INTO audit_logs (id, actor_id, action, entity_type, entity_id, prior_state, new_state, \
         ip_address, user_agent, occurred_at, prev_hash, hash) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(entry.actor_id)
    .bind(entry.action.as_str())
    .bind(entry.entity_type.as_str())
    .bind(entry.entity_id)
    .bind(&prior_state)
    .bind(&new_state)
    .bind(&entry.context.ip)
    .bind(&entry.context.user_agent)
    .bind(occurred_at)
    .bind(&prev_hash)
    .bind(&hash)
    .execute(&mut *conn)
    .await
    .map_err(|err| AppError::internal(format!("failed to write audit record: {err}")))?
    .last_insert_rowid();

    tracing::debug!(
        audit_seq = seq,
        action = %entry.action,
        entity_type = %entry.entity_type,
        entity_id = %entry.entity_id,
        "audit record appended"
    );

    Ok(AuditRecord {
        id,
        seq,
        actor_id: entry.actor_id,
        action: entry.action,
        entity_type: entry.entity_type,
        entity_id: entry.entity_id,
        prior_state: entry.prior_state,
        new_state: entry.new_state,
        ip_address: entry.context.ip,
        user_agent: entry.context.user_agent,
        occurred_at,
        prev_hash,
        hash,
    })
}

fn snapshot<T: Serialize>(entity: &T) -> AppResult<Value> {
    serde_json::to_value(entity).map_err(|err| AppError::internal(format!("failed to snapshot entity: {err}")))
}

/// Records a typed state transition. The entity id comes from whichever
/// snapshot is present; at least one must be.
pub async fn record_change<T: Entity>(
    conn: &mut SqliteConnection,
    actor_id: Uuid,
    action: AuditAction,
    prior: Option<&T>,
    new: Option<&T>,
    context: &RequestContext,
) -> AppResult<AuditRecord> {
    let entity_id = new
        .or(prior)
        .map(T::id)
        .ok_or_else(|| AppError::internal("audit record needs a prior or new state"))?;

    record(
        conn,
        NewAuditRecord {
            actor_id: Some(actor_id),
            action,
            entity_type: T::KIND,
            entity_id,
            prior_state: prior.map(snapshot).transpose()?,
            new_state: new.map(snapshot).transpose()?,
            context: context.clone(),
        },
    )
    .await
}
