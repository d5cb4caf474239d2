use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::entity::EntityKind;
use crate::errors::{AppError, AppResult};
use crate::pagination::{check_range, Window};

/// Filters for the deleted-records view. A deletion counts as restored once a
/// later RESTORE record exists for the same entity.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeletedQuery {
    pub entity_type: Option<EntityKind>,
    pub deleted_by: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub include_restored: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeletedRecord {
    pub audit_seq: i64,
    pub entity_type: EntityKind,
    pub entity_id: Uuid,
    pub deleted_by: Option<Uuid>,
    pub deleted_at: DateTime<Utc>,
    pub restored: bool,
    pub restored_at: Option<DateTime<Utc>>,
    /// Entity state right before it was deleted.
    #[schema(value_type = Option<Object>)]
    pub snapshot: Option<Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeletedPage {
    pub records: Vec<DeletedRecord>,
    pub total: i64,
}

#[derive(Debug, FromRow)]
struct DbDeletedRecord {
    seq: i64,
    entity_type: String,
    entity_id: Uuid,
    deleted_by: Option<Uuid>,
    deleted_at: DateTime<Utc>,
    snapshot: Option<String>,
    restored_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbDeletedRecord> for DeletedRecord {
    type Error = AppError;

    fn try_from(db: DbDeletedRecord) -> Result<Self, Self::Error> {
        let snapshot = db
            .snapshot
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|err| AppError::internal(format!("corrupt audit snapshot: {err}")))?;

        Ok(DeletedRecord {
            audit_seq: db.seq,
            entity_type: db.entity_type.parse()?,
            entity_id: db.entity_id,
            deleted_by: db.deleted_by,
            deleted_at: db.deleted_at,
            restored: db.restored_at.is_some(),
            restored_at: db.restored_at,
            snapshot,
        })
    }
}

const LATER_RESTORE: &str = "FROM audit_logs r WHERE r.action = 'RESTORE' \
     AND r.entity_type = d.entity_type AND r.entity_id = d.entity_id AND r.seq > d.seq";

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &DeletedQuery) {
    builder.push(" FROM audit_logs d WHERE d.action = 'DELETE'");

    if let Some(entity_type) = query.entity_type {
        builder.push(" AND d.entity_type = ").push_bind(entity_type.as_str());
    }
    if let Some(deleted_by) = query.deleted_by {
        builder.push(" AND d.actor_id = ").push_bind(deleted_by);
    }
    if let Some(from) = query.from {
        builder.push(" AND d.occurred_at >= ").push_bind(from);
    }
    if let Some(to) = query.to {
        builder.push(" AND d.occurred_at <= ").push_bind(to);
    }
    if !query.include_restored {
        builder.push(format!(" AND NOT EXISTS (SELECT 1 {LATER_RESTORE})"));
    }
}

/// Deletion events newest first, with the total number of matches.
pub async fn list_deleted(pool: &SqlitePool, query: &DeletedQuery) -> AppResult<DeletedPage> {
    check_range(query.from, query.to)?;
    let window = Window::resolve(query.limit, query.offset)?;

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(1)");
    push_filters(&mut count, query);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut select = QueryBuilder::<Sqlite>::new(format!(
        "SELECT d.seq, d.entity_type, d.entity_id, d.actor_id AS deleted_by, d.occurred_at AS deleted_at, \
         d.prior_state AS snapshot, (SELECT MIN(r.occurred_at) {LATER_RESTORE}) AS restored_at"
    ));
    push_filters(&mut select, query);
    select
        .push(" ORDER BY d.occurred_at DESC, d.seq DESC LIMIT ")
        .push_bind(window.limit)
        .push(" OFFSET ")
        .push_bind(window.offset);

    let rows = select.build_query_as::<DbDeletedRecord>().fetch_all(pool).await?;
    let records = rows
        .into_iter()
        .map(DeletedRecord::try_from)
        .collect::<Result<_, _>>()?;

    Ok(DeletedPage { records, total })
}
