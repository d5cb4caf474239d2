//! Auditable, soft-deletable business records.
//!
//! Every table a user can delete carries `deleted_at` and `deleted_by`. A row
//! with `deleted_at` set is hidden from default listings; restoring clears both.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::Action;
use crate::errors::{AppError, AppResult};

/// Closed set of entity types that can be audited, deleted and restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Lead,
    Client,
    Site,
    Quotation,
    JobOrder,
    Invoice,
    ServiceType,
    User,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Lead,
        EntityKind::Client,
        EntityKind::Site,
        EntityKind::Quotation,
        EntityKind::JobOrder,
        EntityKind::Invoice,
        EntityKind::ServiceType,
        EntityKind::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Lead => "lead",
            EntityKind::Client => "client",
            EntityKind::Site => "site",
            EntityKind::Quotation => "quotation",
            EntityKind::JobOrder => "job_order",
            EntityKind::Invoice => "invoice",
            EntityKind::ServiceType => "service_type",
            EntityKind::User => "user",
        }
    }

    /// Action a principal needs to create, edit or delete this kind.
    pub fn manage_action(&self) -> Action {
        match self {
            EntityKind::Lead => Action::ManageLeads,
            EntityKind::Client | EntityKind::Site => Action::ManageClients,
            EntityKind::Quotation => Action::ManageQuotations,
            EntityKind::JobOrder => Action::ManageJobs,
            EntityKind::Invoice => Action::ManageInvoices,
            EntityKind::ServiceType => Action::ManageMasters,
            EntityKind::User => Action::ManageUsers,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AppError::invalid_entity_type(s))
    }
}

/// A persisted business record that participates in auditing and soft delete.
///
/// `COLUMNS` is the select list `FromRow` expects; it must include
/// `deleted_at` and `deleted_by`.
pub trait Entity: Serialize + for<'r> FromRow<'r, SqliteRow> + Send + Sync + Unpin + 'static {
    const KIND: EntityKind;
    const TABLE: &'static str;
    const COLUMNS: &'static str;

    fn id(&self) -> Uuid;
    fn deleted_at(&self) -> Option<DateTime<Utc>>;
    fn deleted_by(&self) -> Option<Uuid>;

    fn is_deleted(&self) -> bool {
        self.deleted_at().is_some()
    }
}

/// Fetches a row regardless of its deletion state.
pub async fn find_by_id<T: Entity>(conn: &mut SqliteConnection, id: Uuid) -> AppResult<Option<T>> {
    let sql = format!("SELECT {} FROM {} WHERE id = ?", T::COLUMNS, T::TABLE);
    let row = sqlx::query_as::<_, T>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row)
}

/// Fetches a live row; missing and soft-deleted rows are both `NotFound`.
pub async fn find_live<T: Entity>(conn: &mut SqliteConnection, id: Uuid) -> AppResult<T> {
    find_by_id::<T>(conn, id)
        .await?
        .filter(|row| !row.is_deleted())
        .ok_or_else(|| AppError::not_found(format!("{} not found", T::KIND)))
}

/// Default listing: live rows only, newest first.
pub async fn list_live<T: Entity>(pool: &SqlitePool) -> AppResult<Vec<T>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE deleted_at IS NULL ORDER BY created_at DESC",
        T::COLUMNS,
        T::TABLE
    );
    let rows = sqlx::query_as::<_, T>(&sql).fetch_all(pool).await?;

    Ok(rows)
}

/// Rejects references to rows that are missing or soft-deleted.
pub async fn ensure_live<T: Entity>(conn: &mut SqliteConnection, field: &str, id: Uuid) -> AppResult<()> {
    match find_by_id::<T>(conn, id).await? {
        Some(row) if !row.is_deleted() => Ok(()),
        _ => Err(AppError::validation(format!("{field} does not reference a live {}", T::KIND))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_type_names_parse() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_type_name_is_invalid_entity_type() {
        let err = "Widget".parse::<EntityKind>().unwrap_err();
        assert!(matches!(err, AppError::InvalidEntityType(name) if name == "Widget"));
    }

    #[test]
    fn type_names_are_case_sensitive() {
        assert!("JobOrder".parse::<EntityKind>().is_err());
        assert!("job_order".parse::<EntityKind>().is_ok());
    }
}
