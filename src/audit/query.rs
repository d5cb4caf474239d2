use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{AuditAction, AuditRecord, DbAuditRecord, AUDIT_COLUMNS};
use crate::entity::EntityKind;
use crate::errors::AppResult;
use crate::pagination::{check_range, Window};

/// Filters for listing the audit log. Time bounds are inclusive.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditQuery {
    pub actor_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub entity_type: Option<EntityKind>,
    pub entity_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditPage {
    pub records: Vec<AuditRecord>,
    pub total: i64,
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &AuditQuery) {
    builder.push(" WHERE 1 = 1");

    if let Some(actor_id) = query.actor_id {
        builder.push(" AND actor_id = ").push_bind(actor_id);
    }
    if let Some(action) = query.action {
        builder.push(" AND action = ").push_bind(action.as_str());
    }
    if let Some(entity_type) = query.entity_type {
        builder.push(" AND entity_type = ").push_bind(entity_type.as_str());
    }
    if let Some(entity_id) = query.entity_id {
        builder.push(" AND entity_id = ").push_bind(entity_id);
    }
    if let Some(from) = query.from {
        builder.push(" AND occurred_at >= ").push_bind(from);
    }
    if let Some(to) = query.to {
        builder.push(" AND occurred_at <= ").push_bind(to);
    }
}

/// Matching records newest first, plus the total match count.
pub async fn list(pool: &SqlitePool, query: &AuditQuery) -> AppResult<AuditPage> {
    check_range(query.from, query.to)?;
    let window = Window::resolve(query.limit, query.offset)?;

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(1) FROM audit_logs");
    push_filters(&mut count, query);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {AUDIT_COLUMNS} FROM audit_logs"));
    push_filters(&mut select, query);
    select
        .push(" ORDER BY occurred_at DESC, seq DESC LIMIT ")
        .push_bind(window.limit)
        .push(" OFFSET ")
        .push_bind(window.offset);

    let rows = select.build_query_as::<DbAuditRecord>().fetch_all(pool).await?;
    let records = rows
        .into_iter()
        .map(AuditRecord::try_from)
        .collect::<Result<_, _>>()?;

    Ok(AuditPage { records, total })
}
