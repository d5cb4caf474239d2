use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{Entity, EntityKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Converted,
    Lost,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "NEW",
            LeadStatus::Contacted => "CONTACTED",
            LeadStatus::Qualified => "QUALIFIED",
            LeadStatus::Converted => "CONVERTED",
            LeadStatus::Lost => "LOST",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<String>,
    #[schema(example = "NEW")]
    pub status: String,
    pub notes: Option<String>,
    pub converted_client_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
}

impl Lead {
    pub fn is_converted(&self) -> bool {
        self.status == LeadStatus::Converted.as_str()
    }
}

impl Entity for Lead {
    const KIND: EntityKind = EntityKind::Lead;
    const TABLE: &'static str = "leads";
    const COLUMNS: &'static str = "id, name, company, email, phone, source, status, notes, converted_client_id, \
         created_by, created_at, updated_at, deleted_at, deleted_by";

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
pub struct LeadCreateRequest {
    #[schema(example = "Maria Santos")]
    pub name: String,
    #[schema(example = "Santos Bakery")]
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[schema(example = "referral")]
    pub source: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct LeadUpdateRequest {
    pub name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<String>,
    /// `CONVERTED` is only reachable through the convert endpoint.
    pub status: Option<LeadStatus>,
    pub notes: Option<String>,
}

/// Optional overrides applied to the client created from a lead.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct LeadConvertRequest {
    pub client_name: Option<String>,
    pub address: Option<String>,
}
