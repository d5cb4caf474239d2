use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
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
use crate::models::quotation::{Quotation, QuotationCreateRequest, QuotationStatus, QuotationUpdateRequest};
use crate::routes::sites::ensure_site_of_client;
use crate::utils::{required_text, utc_now};

fn check_amount(amount_cents: i64) -> AppResult<()> {
    if amount_cents < 0 {
        return Err(AppError::validation("amount_cents must not be negative"));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/quotations",
    tag = "Quotations",
    responses(
        (status = 200, description = "Live quotations, newest first", body = [Quotation]),
        (status = 403, description = "Requires ManageQuotations")
    )
)]
pub async fn list_quotations(State(state): State<AppState>, principal: Principal) -> AppResult<Json<Vec<Quotation>>> {
    state.roles.require(&principal, Action::ManageQuotations)?;
    Ok(Json(entity::list_live::<Quotation>(&state.pool).await?))
}

#[utoipa::path(
    post,
    path = "/quotations",
    tag = "Quotations",
    request_body = QuotationCreateRequest,
    responses(
        (status = 201, description = "Quotation created", body = Quotation),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn create_quotation(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiJson(payload): ApiJson<QuotationCreateRequest>,
) -> AppResult<(StatusCode, Json<Quotation>)> {
    state.roles.require(&principal, Action::ManageQuotations)?;

    let title = required_text("title", Some(&payload.title))?;
    check_amount(payload.amount_cents)?;

    let mut tx = db::begin_write(&state.pool).await?;
    entity::ensure_live::<Client>(&mut *tx, "client_id", payload.client_id).await?;
    if let Some(site_id) = payload.site_id {
        ensure_site_of_client(&mut *tx, site_id, payload.client_id).await?;
    }

    let now = utc_now();
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO quotations (id, client_id, site_id, title, amount_cents, status, valid_until, created_by, \
         created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(payload.client_id)
    .bind(payload.site_id)
    .bind(&title)
    .bind(payload.amount_cents)
    .bind(QuotationStatus::Draft.as_str())
    .bind(payload.valid_until)
    .bind(principal.user_id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let quotation = entity::find_live::<Quotation>(&mut *tx, id).await?;
    audit::record_change(&mut *tx, principal.user_id, AuditAction::Create, None, Some(&quotation), &context).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(quotation)))
}

#[utoipa::path(
    get,
    path = "/quotations/{id}",
    tag = "Quotations",
    params(("id" = Uuid, Path, description = "Quotation id")),
    responses(
        (status = 200, description = "Quotation detail", body = Quotation),
        (status = 404, description = "Quotation not found")
    )
)]
pub async fn get_quotation(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Quotation>> {
    state.roles.require(&principal, Action::ManageQuotations)?;

    let mut conn = state.pool.acquire().await?;
    Ok(Json(entity::find_live::<Quotation>(&mut conn, id).await?))
}

#[utoipa::path(
    put,
    path = "/quotations/{id}",
    tag = "Quotations",
    params(("id" = Uuid, Path, description = "Quotation id")),
    request_body = QuotationUpdateRequest,
    responses(
        (status = 200, description = "Quotation updated", body = Quotation),
        (status = 404, description = "Quotation not found")
    )
)]
pub async fn update_quotation(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<QuotationUpdateRequest>,
) -> AppResult<Json<Quotation>> {
    state.roles.require(&principal, Action::ManageQuotations)?;

    let mut tx = db::begin_write(&state.pool).await?;
    let prior = entity::find_live::<Quotation>(&mut *tx, id).await?;

    let mut next = prior.clone();
    if let Some(title) = payload.title.as_deref() {
        next.title = required_text("title", Some(title))?;
    }
    if let Some(amount_cents) = payload.amount_cents {
        check_amount(amount_cents)?;
        next.amount_cents = amount_cents;
    }
    if let Some(status) = payload.status {
        next.status = status.as_str().to_string();
    }
    if payload.valid_until.is_some() {
        next.valid_until = payload.valid_until;
    }

    sqlx::query(
        "UPDATE quotations SET title = ?, amount_cents = ?, status = ?, valid_until = ?, updated_at = ? \
         WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&next.title)
    .bind(next.amount_cents)
    .bind(&next.status)
    .bind(next.valid_until)
    .bind(utc_now())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let quotation = entity::find_live::<Quotation>(&mut *tx, id).await?;
    audit::record_change(
        &mut *tx,
        principal.user_id,
        AuditAction::Update,
        Some(&prior),
        Some(&quotation),
        &context,
    )
    .await?;
    tx.commit().await?;

    Ok(Json(quotation))
}

#[utoipa::path(
    delete,
    path = "/quotations/{id}",
    tag = "Quotations",
    params(("id" = Uuid, Path, description = "Quotation id")),
    responses(
        (status = 204, description = "Quotation soft deleted"),
        (status = 400, description = "Quotation already deleted"),
        (status = 404, description = "Quotation not found")
    )
)]
pub async fn delete_quotation(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    lifecycle::soft_delete(&state.pool, &state.roles, &principal, EntityKind::Quotation, id, &context).await?;
    Ok(StatusCode::NO_CONTENT)
}
