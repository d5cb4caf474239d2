//! Soft-delete / restore coordinator.
//!
//! Each entity is LIVE (`deleted_at` null) or DELETED. Delete moves LIVE to
//! DELETED, restore moves DELETED back to LIVE; both transitions are a single
//! conditional UPDATE plus one audit record in the same transaction. Any other
//! transition is rejected with an explicit error.

mod accessor;
mod deleted;

pub use accessor::{DeletionPatch, EntityAccessor, EntityState};
pub use deleted::{list_deleted, DeletedPage, DeletedQuery, DeletedRecord};

use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::audit::{self, AuditAction, NewAuditRecord, RequestContext};
use crate::authz::{Action, Principal, RoleRegistry};
use crate::db;
use crate::entity::EntityKind;
use crate::errors::{AppError, AppResult};
use crate::utils::utc_now;

/// A validated restore request: known entity type plus a well-formed id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreTarget {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl RestoreTarget {
    /// Checks presence first, then the type name, then the id. No storage is
    /// touched here, so an unknown type never reaches persistence.
    pub fn parse(entity_type: Option<&str>, entity_id: Option<&str>) -> AppResult<Self> {
        let entity_type = entity_type
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::missing_field("entity_type"))?;
        let entity_id = entity_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::missing_field("entity_id"))?;

        let kind: EntityKind = entity_type.parse()?;
        // A malformed id cannot resolve to any row.
        let id = Uuid::parse_str(entity_id).map_err(|_| AppError::not_found(format!("{kind} not found")))?;

        Ok(Self { kind, id })
    }
}

/// LIVE → DELETED. Returns the snapshot of the row after deletion.
pub async fn soft_delete(
    pool: &SqlitePool,
    registry: &RoleRegistry,
    principal: &Principal,
    kind: EntityKind,
    id: Uuid,
    context: &RequestContext,
) -> AppResult<Value> {
    registry.require(principal, kind.manage_action())?;

    if kind == EntityKind::User && id == principal.user_id {
        return Err(AppError::validation("users cannot delete their own account"));
    }

    let accessor = kind.accessor();
    let mut tx = db::begin_write(pool).await?;

    let prior = accessor
        .find_by_id(&mut *tx, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("{kind} not found")))?;
    if prior.is_deleted() {
        return Err(AppError::already_deleted(format!("{kind} {id} is already deleted")));
    }

    let patch = DeletionPatch::MarkDeleted {
        at: utc_now(),
        by: principal.user_id,
    };
    if !accessor.update(&mut *tx, id, patch).await? {
        return Err(AppError::already_deleted(format!("{kind} {id} is already deleted")));
    }

    let current = accessor
        .find_by_id(&mut *tx, id)
        .await?
        .ok_or_else(|| AppError::internal(format!("{kind} {id} vanished during delete")))?;

    audit::record(
        &mut *tx,
        NewAuditRecord {
            actor_id: Some(principal.user_id),
            action: AuditAction::Delete,
            entity_type: kind,
            entity_id: id,
            prior_state: Some(prior.snapshot),
            new_state: None,
            context: context.clone(),
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        entity_type = %kind,
        entity_id = %id,
        actor_id = %principal.user_id,
        "entity soft deleted"
    );

    Ok(current.snapshot)
}

/// DELETED → LIVE. Owner only; returns the restored row.
pub async fn restore(
    pool: &SqlitePool,
    registry: &RoleRegistry,
    principal: &Principal,
    target: RestoreTarget,
    context: &RequestContext,
) -> AppResult<Value> {
    registry.require(principal, Action::RestoreRecords)?;

    let RestoreTarget { kind, id } = target;
    let accessor = kind.accessor();
    let mut tx = db::begin_write(pool).await?;

    let prior = accessor
        .find_by_id(&mut *tx, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("{kind} not found")))?;
    if !prior.is_deleted() {
        return Err(AppError::not_deleted(format!("{kind} {id} is not deleted")));
    }

    if let Some(client_id) = parent_client_id(kind, &prior.snapshot) {
        let client = EntityKind::Client.accessor().find_by_id(&mut *tx, client_id).await?;
        if client.map_or(true, |client| client.is_deleted()) {
            return Err(AppError::conflict(format!(
                "{kind} {id} belongs to client {client_id}, which is deleted; restore the client first"
            )));
        }
    }

    if !accessor.update(&mut *tx, id, DeletionPatch::Clear).await? {
        return Err(AppError::not_deleted(format!("{kind} {id} is not deleted")));
    }

    let restored = accessor
        .find_by_id(&mut *tx, id)
        .await?
        .ok_or_else(|| AppError::internal(format!("{kind} {id} vanished during restore")))?;

    audit::record(
        &mut *tx,
        NewAuditRecord {
            actor_id: Some(principal.user_id),
            action: AuditAction::Restore,
            entity_type: kind,
            entity_id: id,
            prior_state: Some(prior.snapshot),
            new_state: Some(restored.snapshot.clone()),
            context: context.clone(),
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        entity_type = %kind,
        entity_id = %id,
        actor_id = %principal.user_id,
        deleted_by = ?prior.deleted_by,
        "entity restored"
    );

    Ok(restored.snapshot)
}

/// Client a restored row hangs off, for the kinds that have one.
fn parent_client_id(kind: EntityKind, snapshot: &Value) -> Option<Uuid> {
    match kind {
        EntityKind::Site | EntityKind::Quotation | EntityKind::JobOrder | EntityKind::Invoice => snapshot
            .get("client_id")
            .and_then(Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok()),
        EntityKind::Lead | EntityKind::Client | EntityKind::ServiceType | EntityKind::User => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_are_named() {
        let err = RestoreTarget::parse(None, Some("x")).unwrap_err();
        assert!(err.to_string().contains("entity_type is required"));

        let err = RestoreTarget::parse(Some("lead"), Some("  ")).unwrap_err();
        assert!(err.to_string().contains("entity_id is required"));
    }

    #[test]
    fn unknown_type_fails_before_id_parsing() {
        let err = RestoreTarget::parse(Some("Widget"), Some("not-a-uuid")).unwrap_err();
        assert!(matches!(err, AppError::InvalidEntityType(_)));
    }

    #[test]
    fn only_client_owned_kinds_have_a_parent() {
        let client_id = Uuid::new_v4();
        let snapshot = serde_json::json!({ "client_id": client_id });

        assert_eq!(parent_client_id(EntityKind::Invoice, &snapshot), Some(client_id));
        assert_eq!(parent_client_id(EntityKind::Site, &snapshot), Some(client_id));
        assert_eq!(parent_client_id(EntityKind::Lead, &snapshot), None);
        assert_eq!(parent_client_id(EntityKind::JobOrder, &serde_json::json!({})), None);
    }

    #[test]
    fn malformed_id_does_not_resolve() {
        let err = RestoreTarget::parse(Some("invoice"), Some("E123")).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn valid_target_parses() {
        let id = Uuid::new_v4();
        let target = RestoreTarget::parse(Some("job_order"), Some(&id.to_string())).unwrap();
        assert_eq!(target, RestoreTarget { kind: EntityKind::JobOrder, id });
    }
}
