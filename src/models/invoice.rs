use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{Entity, EntityKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Unpaid,
    Paid,
    Void,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Unpaid => "UNPAID",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Void => "VOID",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Invoice {
    pub id: Uuid,
    #[schema(example = "INV-2026-0001")]
    pub invoice_number: String,
    pub client_id: Uuid,
    pub job_order_id: Option<Uuid>,
    pub amount_cents: i64,
    #[schema(example = "UNPAID")]
    pub status: String,
    pub issued_at: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
}

impl Entity for Invoice {
    const KIND: EntityKind = EntityKind::Invoice;
    const TABLE: &'static str = "invoices";
    const COLUMNS: &'static str = "id, invoice_number, client_id, job_order_id, amount_cents, status, issued_at, \
         due_date, created_by, created_at, updated_at, deleted_at, deleted_by";

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
pub struct InvoiceCreateRequest {
    pub client_id: Uuid,
    pub job_order_id: Option<Uuid>,
    #[schema(example = 1250000)]
    pub amount_cents: i64,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct InvoiceUpdateRequest {
    pub amount_cents: Option<i64>,
    pub status: Option<InvoiceStatus>,
    pub due_date: Option<DateTime<Utc>>,
}
