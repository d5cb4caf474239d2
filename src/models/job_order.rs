use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{Entity, EntityKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Scheduled => "SCHEDULED",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct JobOrder {
    pub id: Uuid,
    /// Generated as `JO-<year>-<seq>`, e.g. `JO-2026-0007`.
    #[schema(example = "JO-2026-0001")]
    pub job_number: String,
    pub client_id: Uuid,
    pub site_id: Option<Uuid>,
    pub quotation_id: Option<Uuid>,
    pub service_type_id: Option<Uuid>,
    pub description: Option<String>,
    #[schema(example = "PENDING")]
    pub status: String,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
}

impl Entity for JobOrder {
    const KIND: EntityKind = EntityKind::JobOrder;
    const TABLE: &'static str = "job_orders";
    const COLUMNS: &'static str = "id, job_number, client_id, site_id, quotation_id, service_type_id, description, \
         status, scheduled_for, assigned_to, created_by, created_at, updated_at, deleted_at, deleted_by";

    fn id(&self) -> Uuid {
        self.id
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn deleted_by(&self) -> Option<Uuid> {
        self.deleted_by
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct JobOrderCreateRequest {
    pub client_id: Uuid,
    pub site_id: Option<Uuid>,
    pub quotation_id: Option<Uuid>,
    pub service_type_id: Option<Uuid>,
    #[schema(example = "Replace compressor on unit 3")]
    pub description: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct JobOrderUpdateRequest {
    pub description: Option<String>,
    pub status: Option<JobStatus>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub assigned_to: Option<Uuid>,
    pub service_type_id: Option<Uuid>,
}
