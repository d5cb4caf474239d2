use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{Entity, EntityKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuotationStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotationStatus::Draft => "DRAFT",
            QuotationStatus::Sent => "SENT",
            QuotationStatus::Accepted => "ACCEPTED",
            QuotationStatus::Rejected => "REJECTED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Quotation {
    pub id: Uuid,
    pub client_id: Uuid,
    pub site_id: Option<Uuid>,
    pub title: String,
    /// Amount in minor currency units.
    pub amount_cents: i64,
    #[schema(example = "DRAFT")]
    pub status: String,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
}

impl Entity for Quotation {
    const KIND: EntityKind = EntityKind::Quotation;
    const TABLE: &'static str = "quotations";
    const COLUMNS: &'static str = "id, client_id, site_id, title, amount_cents, status, valid_until, created_by, \
         created_at, updated_at, deleted_at, deleted_by";

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
pub struct QuotationCreateRequest {
    pub client_id: Uuid,
    pub site_id: Option<Uuid>,
    #[schema(example = "Quarterly aircon cleaning")]
    pub title: String,
    #[schema(example = 1250000)]
    pub amount_cents: i64,
    pub valid_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct QuotationUpdateRequest {
    pub title: Option<String>,
    pub amount_cents: Option<i64>,
    pub status: Option<QuotationStatus>,
    pub valid_until: Option<DateTime<Utc>>,
}
