use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::audit::{self, AuditAction, RequestContext};
use crate::authz::{Action, Principal};
use crate::db;
use crate::entity::{self, EntityKind};
use crate::errors::AppResult;
use crate::extract::{ApiJson, ApiPath};
use crate::lifecycle;
use crate::models::client::{Client, ClientCreateRequest, ClientUpdateRequest};
use crate::utils::{optional_text, required_text, utc_now};

#[utoipa::path(
    get,
    path = "/clients",
    tag = "Clients",
    responses(
        (status = 200, description = "Live clients, newest first", body = [Client]),
        (status = 403, description = "Requires ManageClients")
    )
)]
pub async fn list_clients(State(state): State<AppState>, principal: Principal) -> AppResult<Json<Vec<Client>>> {
    state.roles.require(&principal, Action::ManageClients)?;
    Ok(Json(entity::list_live::<Client>(&state.pool).await?))
}

#[utoipa::path(
    post,
    path = "/clients",
    tag = "Clients",
    request_body = ClientCreateRequest,
    responses(
        (status = 201, description = "Client created", body = Client),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn create_client(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiJson(payload): ApiJson<ClientCreateRequest>,
) -> AppResult<(StatusCode, Json<Client>)> {
    state.roles.require(&principal, Action::ManageClients)?;

    let name = required_text("name", Some(&payload.name))?;
    let now = utc_now();
    let id = Uuid::new_v4();

    let mut tx = db::begin_write(&state.pool).await?;
    sqlx::query(
        "INSERT INTO clients (id, name, email, phone, address, created_by, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(&name)
    .bind(optional_text(payload.email.as_deref()))
    .bind(optional_text(payload.phone.as_deref()))
    .bind(optional_text(payload.address.as_deref()))
    .bind(principal.user_id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let client = entity::find_live::<Client>(&mut *tx, id).await?;
    audit::record_change(&mut *tx, principal.user_id, AuditAction::Create, None, Some(&client), &context).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(client)))
}

#[utoipa::path(
    get,
    path = "/clients/{id}",
    tag = "Clients",
    params(("id" = Uuid, Path, description = "Client id")),
    responses(
        (status = 200, description = "Client detail", body = Client),
        (status = 404, description = "Client not found")
    )
)]
pub async fn get_client(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Client>> {
    state.roles.require(&principal, Action::ManageClients)?;

    let mut conn = state.pool.acquire().await?;
    Ok(Json(entity::find_live::<Client>(&mut conn, id).await?))
}

#[utoipa::path(
    put,
    path = "/clients/{id}",
    tag = "Clients",
    params(("id" = Uuid, Path, description = "Client id")),
    request_body = ClientUpdateRequest,
    responses(
        (status = 200, description = "Client updated", body = Client),
        (status = 404, description = "Client not found")
    )
)]
pub async fn update_client(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<ClientUpdateRequest>,
) -> AppResult<Json<Client>> {
    state.roles.require(&principal, Action::ManageClients)?;

    let mut tx = db::begin_write(&state.pool).await?;
    let prior = entity::find_live::<Client>(&mut *tx, id).await?;

    let mut next = prior.clone();
    if let Some(name) = payload.name.as_deref() {
        next.name = required_text("name", Some(name))?;
    }
    if payload.email.is_some() {
        next.email = optional_text(payload.email.as_deref());
    }
    if payload.phone.is_some() {
        next.phone = optional_text(payload.phone.as_deref());
    }
    if payload.address.is_some() {
        next.address = optional_text(payload.address.as_deref());
    }

    sqlx::query(
        "UPDATE clients SET name = ?, email = ?, phone = ?, address = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&next.name)
    .bind(&next.email)
    .bind(&next.phone)
    .bind(&next.address)
    .bind(utc_now())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let client = entity::find_live::<Client>(&mut *tx, id).await?;
    audit::record_change(&mut *tx, principal.user_id, AuditAction::Update, Some(&prior), Some(&client), &context).await?;
    tx.commit().await?;

    Ok(Json(client))
}

#[utoipa::path(
    delete,
    path = "/clients/{id}",
    tag = "Clients",
    params(("id" = Uuid, Path, description = "Client id")),
    responses(
        (status = 204, description = "Client soft deleted"),
        (status = 400, description = "Client already deleted"),
        (status = 404, description = "Client not found")
    )
)]
pub async fn delete_client(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    lifecycle::soft_delete(&state.pool, &state.roles, &principal, EntityKind::Client, id, &context).await?;
    Ok(StatusCode::NO_CONTENT)
}
