use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::audit::{self, AuditAction, RequestContext};
use crate::authz::{Action, Principal};
use crate::db::{self, numbering::INVOICES};
use crate::entity::{self, EntityKind};
use crate::errors::{AppError, AppResult};
use crate::extract::{ApiJson, ApiPath};
use crate::lifecycle;
use crate::models::client::Client;
use crate::models::invoice::{Invoice, InvoiceCreateRequest, InvoiceStatus, InvoiceUpdateRequest};
use crate::models::job_order::JobOrder;
use crate::utils::utc_now;

fn check_amount(amount_cents: i64) -> AppResult<()> {
    if amount_cents < 0 {
        return Err(AppError::validation("amount_cents must not be negative"));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/invoices",
    tag = "Invoices",
    responses(
        (status = 200, description = "Live invoices, newest first", body = [Invoice]),
        (status = 403, description = "Requires ViewInvoices")
    )
)]
pub async fn list_invoices(State(state): State<AppState>, principal: Principal) -> AppResult<Json<Vec<Invoice>>> {
    state.roles.require(&principal, Action::ViewInvoices)?;
    Ok(Json(entity::list_live::<Invoice>(&state.pool).await?))
}

#[utoipa::path(
    post,
    path = "/invoices",
    tag = "Invoices",
    request_body = InvoiceCreateRequest,
    responses(
        (status = 201, description = "Invoice issued", body = Invoice),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Requires ManageInvoices")
    )
)]
pub async fn create_invoice(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiJson(payload): ApiJson<InvoiceCreateRequest>,
) -> AppResult<(StatusCode, Json<Invoice>)> {
    state.roles.require(&principal, Action::ManageInvoices)?;
    check_amount(payload.amount_cents)?;

    let mut tx = db::begin_write(&state.pool).await?;
    entity::ensure_live::<Client>(&mut *tx, "client_id", payload.client_id).await?;
    if let Some(job_order_id) = payload.job_order_id {
        let job_order = entity::find_by_id::<JobOrder>(&mut *tx, job_order_id)
            .await?
            .filter(|job_order| job_order.deleted_at.is_none())
            .ok_or_else(|| AppError::validation("job_order_id does not reference a live job order"))?;
        if job_order.client_id != payload.client_id {
            return Err(AppError::validation("job_order_id belongs to a different client"));
        }
    }

    let now = utc_now();
    let id = Uuid::new_v4();
    let stem = INVOICES.stem(now);
    let sql = format!(
        "INSERT INTO invoices (id, invoice_number, client_id, job_order_id, amount_cents, status, issued_at, due_date, \
         created_by, created_at, updated_at) VALUES (?, {}, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        INVOICES.next_value_sql()
    );

    INVOICES
        .bind(sqlx::query(&sql).bind(id), &stem)
        .bind(payload.client_id)
        .bind(payload.job_order_id)
        .bind(payload.amount_cents)
        .bind(InvoiceStatus::Unpaid.as_str())
        .bind(now)
        .bind(payload.due_date)
        .bind(principal.user_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    let invoice = entity::find_live::<Invoice>(&mut *tx, id).await?;
    audit::record_change(&mut *tx, principal.user_id, AuditAction::Create, None, Some(&invoice), &context).await?;
    tx.commit().await?;

    tracing::info!(invoice_id = %id, invoice_number = %invoice.invoice_number, "invoice issued");

    Ok((StatusCode::CREATED, Json(invoice)))
}

#[utoipa::path(
    get,
    path = "/invoices/{id}",
    tag = "Invoices",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "Invoice detail", body = Invoice),
        (status = 404, description = "Invoice not found")
    )
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Invoice>> {
    state.roles.require(&principal, Action::ViewInvoices)?;

    let mut conn = state.pool.acquire().await?;
    Ok(Json(entity::find_live::<Invoice>(&mut conn, id).await?))
}

#[utoipa::path(
    put,
    path = "/invoices/{id}",
    tag = "Invoices",
    params(("id" = Uuid, Path, description = "Invoice id")),
    request_body = InvoiceUpdateRequest,
    responses(
        (status = 200, description = "Invoice updated", body = Invoice),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Invoice not found")
    )
)]
pub async fn update_invoice(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<InvoiceUpdateRequest>,
) -> AppResult<Json<Invoice>> {
    state.roles.require(&principal, Action::ManageInvoices)?;

    let mut tx = db::begin_write(&state.pool).await?;
    let prior = entity::find_live::<Invoice>(&mut *tx, id).await?;

    if prior.status == InvoiceStatus::Void.as_str() {
        return Err(AppError::validation("void invoices cannot be changed"));
    }

    let mut next = prior.clone();
    if let Some(amount_cents) = payload.amount_cents {
        check_amount(amount_cents)?;
        next.amount_cents = amount_cents;
    }
    if let Some(status) = payload.status {
        next.status = status.as_str().to_string();
    }
    if payload.due_date.is_some() {
        next.due_date = payload.due_date;
    }

    sqlx::query(
        "UPDATE invoices SET amount_cents = ?, status = ?, due_date = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(next.amount_cents)
    .bind(&next.status)
    .bind(next.due_date)
    .bind(utc_now())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let invoice = entity::find_live::<Invoice>(&mut *tx, id).await?;
    audit::record_change(&mut *tx, principal.user_id, AuditAction::Update, Some(&prior), Some(&invoice), &context).await?;
    tx.commit().await?;

    Ok(Json(invoice))
}

#[utoipa::path(
    delete,
    path = "/invoices/{id}",
    tag = "Invoices",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 204, description = "Invoice soft deleted"),
        (status = 400, description = "Invoice already deleted"),
        (status = 404, description = "Invoice not found")
    )
)]
pub async fn delete_invoice(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    lifecycle::soft_delete(&state.pool, &state.roles, &principal, EntityKind::Invoice, id, &context).await?;
    Ok(StatusCode::NO_CONTENT)
}
