use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{Entity, EntityKind};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Lead this client was converted from, if any.
    pub lead_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
}

impl Entity for Client {
    const KIND: EntityKind = EntityKind::Client;
    const TABLE: &'static str = "clients";
    const COLUMNS: &'static str =
        "id, name, email, phone, address, lead_id, created_by, created_at, updated_at, deleted_at, deleted_by";

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
pub struct ClientCreateRequest {
    #[schema(example = "Santos Bakery")]
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[schema(example = "12 Mabini St, Quezon City")]
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct ClientUpdateRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}
