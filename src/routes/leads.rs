use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::app::AppState;
use crate::audit::{self, AuditAction, RequestContext};
use crate::authz::{Action, Principal};
use crate::db;
use crate::entity::{self, EntityKind};
use crate::errors::{AppError, AppResult};
use crate::extract::{ApiJson, ApiPath};
use crate::lifecycle;
use crate::models::client::Client;
use crate::models::lead::{Lead, LeadConvertRequest, LeadCreateRequest, LeadStatus, LeadUpdateRequest};
use crate::utils::{optional_text, required_text, utc_now};

#[utoipa::path(
    get,
    path = "/leads",
    tag = "Leads",
    responses(
        (status = 200, description = "Live leads, newest first", body = [Lead]),
        (status = 403, description = "Requires ManageLeads")
    )
)]
pub async fn list_leads(State(state): State<AppState>, principal: Principal) -> AppResult<Json<Vec<Lead>>> {
    state.roles.require(&principal, Action::ManageLeads)?;
    Ok(Json(entity::list_live::<Lead>(&state.pool).await?))
}

#[utoipa::path(
    post,
    path = "/leads",
    tag = "Leads",
    request_body = LeadCreateRequest,
    responses(
        (status = 201, description = "Lead created", body = Lead),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn create_lead(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiJson(payload): ApiJson<LeadCreateRequest>,
) -> AppResult<(StatusCode, Json<Lead>)> {
    state.roles.require(&principal, Action::ManageLeads)?;

    let name = required_text("name", Some(&payload.name))?;
    let now = utc_now();
    let id = Uuid::new_v4();

    let mut tx = db::begin_write(&state.pool).await?;
    sqlx::query(
        "INSERT INTO leads (id, name, company, email, phone, source, status, notes, created_by, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(&name)
    .bind(optional_text(payload.company.as_deref()))
    .bind(optional_text(payload.email.as_deref()))
    .bind(optional_text(payload.phone.as_deref()))
    .bind(optional_text(payload.source.as_deref()))
    .bind(LeadStatus::New.as_str())
    .bind(optional_text(payload.notes.as_deref()))
    .bind(principal.user_id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let lead = entity::find_live::<Lead>(&mut *tx, id).await?;
    audit::record_change(&mut *tx, principal.user_id, AuditAction::Create, None, Some(&lead), &context).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(lead)))
}

#[utoipa::path(
    get,
    path = "/leads/{id}",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "Lead id")),
    responses(
        (status = 200, description = "Lead detail", body = Lead),
        (status = 404, description = "Lead not found")
    )
)]
pub async fn get_lead(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Lead>> {
    state.roles.require(&principal, Action::ManageLeads)?;

    let mut conn = state.pool.acquire().await?;
    Ok(Json(entity::find_live::<Lead>(&mut conn, id).await?))
}

#[utoipa::path(
    put,
    path = "/leads/{id}",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "Lead id")),
    request_body = LeadUpdateRequest,
    responses(
        (status = 200, description = "Lead updated", body = Lead),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Lead not found")
    )
)]
pub async fn update_lead(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<LeadUpdateRequest>,
) -> AppResult<Json<Lead>> {
    state.roles.require(&principal, Action::ManageLeads)?;

    if payload.status == Some(LeadStatus::Converted) {
        return Err(AppError::validation("status CONVERTED is set by converting the lead"));
    }

    let mut tx = db::begin_write(&state.pool).await?;
    let prior = entity::find_live::<Lead>(&mut *tx, id).await?;
    if prior.is_converted() && payload.status.is_some() {
        return Err(AppError::validation("status of a converted lead cannot change"));
    }

    let mut next = prior.clone();
    if let Some(name) = payload.name.as_deref() {
        next.name = required_text("name", Some(name))?;
    }
    if payload.company.is_some() {
        next.company = optional_text(payload.company.as_deref());
    }
    if payload.email.is_some() {
        next.email = optional_text(payload.email.as_deref());
    }
    if payload.phone.is_some() {
        next.phone = optional_text(payload.phone.as_deref());
    }
    if payload.source.is_some() {
        next.source = optional_text(payload.source.as_deref());
    }
    if let Some(status) = payload.status {
        next.status = status.as_str().to_string();
    }
    if payload.notes.is_some() {
        next.notes = optional_text(payload.notes.as_deref());
    }

    sqlx::query(
        "UPDATE leads SET name = ?, company = ?, email = ?, phone = ?, source = ?, status = ?, notes = ?, updated_at = ? \
         WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&next.name)
    .bind(&next.company)
    .bind(&next.email)
    .bind(&next.phone)
    .bind(&next.source)
    .bind(&next.status)
    .bind(&next.notes)
    .bind(utc_now())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let lead = entity::find_live::<Lead>(&mut *tx, id).await?;
    audit::record_change(&mut *tx, principal.user_id, AuditAction::Update, Some(&prior), Some(&lead), &context).await?;
    tx.commit().await?;

    Ok(Json(lead))
}

#[utoipa::path(
    delete,
    path = "/leads/{id}",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "Lead id")),
    responses(
        (status = 204, description = "Lead soft deleted"),
        (status = 400, description = "Lead already deleted"),
        (status = 404, description = "Lead not found")
    )
)]
pub async fn delete_lead(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    lifecycle::soft_delete(&state.pool, &state.roles, &principal, EntityKind::Lead, id, &context).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Converts a lead into a client. Converting an already converted lead
/// returns its existing client.
#[utoipa::path(
    post,
    path = "/leads/{id}/convert",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "Lead id")),
    request_body = LeadConvertRequest,
    responses(
        (status = 201, description = "Client created from the lead", body = Client),
        (status = 200, description = "Lead was already converted", body = Client),
        (status = 404, description = "Lead not found"),
        (status = 409, description = "The converted client is deleted")
    )
)]
pub async fn convert_lead(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<LeadConvertRequest>,
) -> AppResult<(StatusCode, Json<Client>)> {
    state.roles.require(&principal, Action::ManageLeads)?;

    let mut tx = db::begin_write(&state.pool).await?;
    let prior = entity::find_live::<Lead>(&mut *tx, id).await?;

    if prior.is_converted() {
        if let Some(client_id) = prior.converted_client_id {
            match entity::find_by_id::<Client>(&mut *tx, client_id).await? {
                Some(client) if client.deleted_at.is_none() => return Ok((StatusCode::OK, Json(client))),
                Some(_) => {
                    return Err(AppError::conflict(format!(
                        "lead {id} was converted to client {client_id}, which is deleted; restore the client instead"
                    )))
                }
                None => {}
            }
        }
        tracing::warn!(
            lead_id = %id,
            client_id = ?prior.converted_client_id,
            "converted lead has no client row; creating a replacement client"
        );
    }

    let client = insert_client_from_lead(&mut *tx, principal.user_id, &prior, &payload).await?;
    audit::record_change(&mut *tx, principal.user_id, AuditAction::Create, None, Some(&client), &context).await?;

    sqlx::query("UPDATE leads SET status = ?, converted_client_id = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(LeadStatus::Converted.as_str())
        .bind(client.id)
        .bind(utc_now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let lead = entity::find_live::<Lead>(&mut *tx, id).await?;
    audit::record_change(&mut *tx, principal.user_id, AuditAction::Update, Some(&prior), Some(&lead), &context).await?;
    tx.commit().await?;

    tracing::info!(lead_id = %id, client_id = %client.id, "lead converted");

    Ok((StatusCode::CREATED, Json(client)))
}

async fn insert_client_from_lead(
    conn: &mut SqliteConnection,
    actor_id: Uuid,
    lead: &Lead,
    overrides: &LeadConvertRequest,
) -> AppResult<Client> {
    let name = optional_text(overrides.client_name.as_deref())
        .or_else(|| optional_text(lead.company.as_deref()))
        .unwrap_or_else(|| lead.name.clone());
    let now = utc_now();
    let client_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO clients (id, name, email, phone, address, lead_id, created_by, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(client_id)
    .bind(&name)
    .bind(&lead.email)
    .bind(&lead.phone)
    .bind(optional_text(overrides.address.as_deref()))
    .bind(lead.id)
    .bind(actor_id)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    entity::find_live::<Client>(conn, client_id).await
}
