use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::entity::{self, Entity, EntityKind};
use crate::errors::{AppError, AppResult};
use crate::models::{
    client::Client, invoice::Invoice, job_order::JobOrder, lead::Lead, quotation::Quotation,
    service_type::ServiceType, site::Site, user::User,
};

/// Current row of some entity, type-erased for the coordinator.
#[derive(Debug, Clone)]
pub struct EntityState {
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
    pub snapshot: Value,
}

impl EntityState {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Change to the deletion marker. Each variant only applies when the row is
/// currently in the opposite state.
#[derive(Debug, Clone, Copy)]
pub enum DeletionPatch {
    MarkDeleted { at: DateTime<Utc>, by: Uuid },
    Clear,
}

/// Storage accessor for one entity table.
#[async_trait]
pub trait EntityAccessor: Send + Sync {
    async fn find_by_id(&self, conn: &mut SqliteConnection, id: Uuid) -> AppResult<Option<EntityState>>;

    /// Applies the patch as one conditional UPDATE. Returns false when the row
    /// is missing or not in the state the patch expects.
    async fn update(&self, conn: &mut SqliteConnection, id: Uuid, patch: DeletionPatch) -> AppResult<bool>;
}

struct TableAccessor<T>(PhantomData<fn() -> T>);

impl<T> TableAccessor<T> {
    fn new() -> Self {
        Self(PhantomData)
    }
}

#[async_trait]
impl<T: Entity> EntityAccessor for TableAccessor<T> {
    async fn find_by_id(&self, conn: &mut SqliteConnection, id: Uuid) -> AppResult<Option<EntityState>> {
        let Some(row) = entity::find_by_id::<T>(conn, id).await? else {
            return Ok(None);
        };

        let snapshot = serde_json::to_value(&row)
            .map_err(|err| AppError::internal(format!("failed to snapshot {}: {err}", T::KIND)))?;

        Ok(Some(EntityState {
            deleted_at: row.deleted_at(),
            deleted_by: row.deleted_by(),
            snapshot,
        }))
    }

    async fn update(&self, conn: &mut SqliteConnection, id: Uuid, patch: DeletionPatch) -> AppResult<bool> {
        let result = match patch {
            DeletionPatch::MarkDeleted { at, by } => {
                let sql = format!(
                    "UPDATE {} SET deleted_at = ?, deleted_by = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
                    T::TABLE
                );
                sqlx::query(&sql)
                    .bind(at)
                    .bind(by)
                    .bind(at)
                    .bind(id)
                    .execute(&mut *conn)
                    .await?
            }
            DeletionPatch::Clear => {
                let sql = format!(
                    "UPDATE {} SET deleted_at = NULL, deleted_by = NULL, updated_at = ? WHERE id = ? AND deleted_at IS NOT NULL",
                    T::TABLE
                );
                sqlx::query(&sql)
                    .bind(crate::utils::utc_now())
                    .bind(id)
                    .execute(&mut *conn)
                    .await?
            }
        };

        Ok(result.rows_affected() == 1)
    }
}

impl EntityKind {
    /// Accessor for this kind's table; the match keeps the mapping exhaustive.
    pub fn accessor(self) -> Box<dyn EntityAccessor> {
        match self {
            EntityKind::Lead => Box::new(TableAccessor::<Lead>::new()),
            EntityKind::Client => Box::new(TableAccessor::<Client>::new()),
            EntityKind::Site => Box::new(TableAccessor::<Site>::new()),
            EntityKind::Quotation => Box::new(TableAccessor::<Quotation>::new()),
            EntityKind::JobOrder => Box::new(TableAccessor::<JobOrder>::new()),
            EntityKind::Invoice => Box::new(TableAccessor::<Invoice>::new()),
            EntityKind::ServiceType => Box::new(TableAccessor::<ServiceType>::new()),
            EntityKind::User => Box::new(TableAccessor::<User>::new()),
        }
    }
}
