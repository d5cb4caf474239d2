use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{DbAuditRecord, AUDIT_COLUMNS};
use crate::errors::AppResult;

/// Fields covered by a record's hash, in their stored form.
pub(crate) struct HashInput<'a> {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: &'a str,
    pub entity_type: &'a str,
    pub entity_id: Uuid,
    pub prior_state: Option<&'a str>,
    pub new_state: Option<&'a str>,
    pub occurred_at: DateTime<Utc>,
}

/// SHA-256 over the previous hash followed by the record's canonical payload.
pub(crate) fn compute_hash(prev_hash: Option<&str>, input: &HashInput<'_>) -> String {
    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }

    let actor = input.actor_id.map(|id| id.to_string()).unwrap_or_default();
    let payload = [
        input.id.to_string().as_str(),
        actor.as_str(),
        input.action,
        input.entity_type,
        input.entity_id.to_string().as_str(),
        input.prior_state.unwrap_or(""),
        input.new_state.unwrap_or(""),
        input.occurred_at.to_rfc3339_opts(SecondsFormat::Nanos, true).as_str(),
    ]
    .join("\n");

    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChainReport {
    pub checked: u64,
    pub valid: bool,
    /// Sequence number of the first record whose hash or link does not match.
    pub first_broken_seq: Option<i64>,
}

/// Walks the whole log in insertion order and recomputes every link.
pub async fn verify_chain(pool: &SqlitePool) -> AppResult<ChainReport> {
    let sql = format!("SELECT {AUDIT_COLUMNS} FROM audit_logs ORDER BY seq ASC");
    let rows = sqlx::query_as::<_, DbAuditRecord>(&sql).fetch_all(pool).await?;

    let mut expected_prev: Option<String> = None;
    let mut checked = 0u64;

    for row in rows {
        checked += 1;

        let recomputed = compute_hash(
            expected_prev.as_deref(),
            &HashInput {
                id: row.id,
                actor_id: row.actor_id,
                action: &row.action,
                entity_type: &row.entity_type,
                entity_id: row.entity_id,
                prior_state: row.prior_state.as_deref(),
                new_state: row.new_state.as_deref(),
                occurred_at: row.occurred_at,
            },
        );

        if row.prev_hash != expected_prev || row.hash != recomputed {
            tracing::warn!(seq = row.seq, "audit chain broken");
            return Ok(ChainReport {
                checked,
                valid: false,
                first_broken_seq: Some(row.seq),
            });
        }

        expected_prev = Some(row.hash);
    }

    Ok(ChainReport {
        checked,
        valid: true,
        first_broken_seq: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(new_state: Option<&str>) -> HashInput<'_> {
        HashInput {
            id: Uuid::nil(),
            actor_id: None,
            action: "CREATE",
            entity_type: "lead",
            entity_id: Uuid::nil(),
            prior_state: None,
            new_state,
            occurred_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn hash_depends_on_previous_link() {
        let a = compute_hash(None, &input(Some("{}")));
        let b = compute_hash(Some(&a), &input(Some("{}")));
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn hash_depends_on_payload() {
        let a = compute_hash(None, &input(Some("{\"name\":\"a\"}")));
        let b = compute_hash(None, &input(Some("{\"name\":\"b\"}")));
        assert_ne!(a, b);
    }
}
