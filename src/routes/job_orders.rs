use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::audit::{self, AuditAction, RequestContext};
use crate::authz::{Action, Principal};
use crate::db::{self, numbering::JOB_ORDERS};
use crate::entity::{self, EntityKind};
use crate::errors::{AppError, AppResult};
use crate::extract::{ApiJson, ApiPath};
use crate::lifecycle;
use crate::models::client::Client;
use crate::models::job_order::{JobOrder, JobOrderCreateRequest, JobOrderUpdateRequest, JobStatus};
use crate::models::quotation::Quotation;
use crate::models::service_type::ServiceType;
use crate::models::user::User;
use crate::routes::sites::ensure_site_of_client;
use crate::utils::{optional_text, utc_now};

#[utoipa::path(
    get,
    path = "/job-orders",
    tag = "Job Orders",
    responses(
        (status = 200, description = "Live job orders, newest first", body = [JobOrder]),
        (status = 403, description = "Requires ViewJobs")
    )
)]
pub async fn list_job_orders(State(state): State<AppState>, principal: Principal) -> AppResult<Json<Vec<JobOrder>>> {
    state.roles.require(&principal, Action::ViewJobs)?;
    Ok(Json(entity::list_live::<JobOrder>(&state.pool).await?))
}

/// Creates a job order; `job_number` is assigned as the next number of the
/// current year.
#[utoipa::path(
    post,
    path = "/job-orders",
    tag = "Job Orders",
    request_body = JobOrderCreateRequest,
    responses(
        (status = 201, description = "Job order created", body = JobOrder),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Requires ManageJobs")
    )
)]
pub async fn create_job_order(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiJson(payload): ApiJson<JobOrderCreateRequest>,
) -> AppResult<(StatusCode, Json<JobOrder>)> {
    state.roles.require(&principal, Action::ManageJobs)?;

    let mut tx = db::begin_write(&state.pool).await?;
    entity::ensure_live::<Client>(&mut *tx, "client_id", payload.client_id).await?;
    if let Some(site_id) = payload.site_id {
        ensure_site_of_client(&mut *tx, site_id, payload.client_id).await?;
    }
    if let Some(quotation_id) = payload.quotation_id {
        let quotation = entity::find_by_id::<Quotation>(&mut *tx, quotation_id)
            .await?
            .filter(|quotation| quotation.deleted_at.is_none())
            .ok_or_else(|| AppError::validation("quotation_id does not reference a live quotation"))?;
        if quotation.client_id != payload.client_id {
            return Err(AppError::validation("quotation_id belongs to a different client"));
        }
    }
    if let Some(service_type_id) = payload.service_type_id {
        entity::ensure_live::<ServiceType>(&mut *tx, "service_type_id", service_type_id).await?;
    }
    if let Some(assigned_to) = payload.assigned_to {
        entity::ensure_live::<User>(&mut *tx, "assigned_to", assigned_to).await?;
    }

    let now = utc_now();
    let id = Uuid::new_v4();
    let stem = JOB_ORDERS.stem(now);
    let sql = format!(
        "INSERT INTO job_orders (id, job_number, client_id, site_id, quotation_id, service_type_id, description, \
         status, scheduled_for, assigned_to, created_by, created_at, updated_at) \
         VALUES (?, {}, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        JOB_ORDERS.next_value_sql()
    );

    JOB_ORDERS
        .bind(sqlx::query(&sql).bind(id), &stem)
        .bind(payload.client_id)
        .bind(payload.site_id)
        .bind(payload.quotation_id)
        .bind(payload.service_type_id)
        .bind(optional_text(payload.description.as_deref()))
        .bind(JobStatus::Pending.as_str())
        .bind(payload.scheduled_for)
        .bind(payload.assigned_to)
        .bind(principal.user_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    let job_order = entity::find_live::<JobOrder>(&mut *tx, id).await?;
    audit::record_change(&mut *tx, principal.user_id, AuditAction::Create, None, Some(&job_order), &context).await?;
    tx.commit().await?;

    tracing::info!(job_order_id = %id, job_number = %job_order.job_number, "job order created");

    Ok((StatusCode::CREATED, Json(job_order)))
}

#[utoipa::path(
    get,
    path = "/job-orders/{id}",
    tag = "Job Orders",
    params(("id" = Uuid, Path, description = "Job order id")),
    responses(
        (status = 200, description = "Job order detail", body = JobOrder),
        (status = 404, description = "Job order not found")
    )
)]
pub async fn get_job_order(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<JobOrder>> {
    state.roles.require(&principal, Action::ViewJobs)?;

    let mut conn = state.pool.acquire().await?;
    Ok(Json(entity::find_live::<JobOrder>(&mut conn, id).await?))
}

#[utoipa::path(
    put,
    path = "/job-orders/{id}",
    tag = "Job Orders",
    params(("id" = Uuid, Path, description = "Job order id")),
    request_body = JobOrderUpdateRequest,
    responses(
        (status = 200, description = "Job order updated", body = JobOrder),
        (status = 403, description = "Requires ManageJobs"),
        (status = 404, description = "Job order not found")
    )
)]
pub async fn update_job_order(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<JobOrderUpdateRequest>,
) -> AppResult<Json<JobOrder>> {
    state.roles.require(&principal, Action::ManageJobs)?;

    let mut tx = db::begin_write(&state.pool).await?;
    let prior = entity::find_live::<JobOrder>(&mut *tx, id).await?;

    let mut next = prior.clone();
    if payload.description.is_some() {
        next.description = optional_text(payload.description.as_deref());
    }
    if let Some(status) = payload.status {
        next.status = status.as_str().to_string();
    }
    if payload.scheduled_for.is_some() {
        next.scheduled_for = payload.scheduled_for;
    }
    if let Some(assigned_to) = payload.assigned_to {
        entity::ensure_live::<User>(&mut *tx, "assigned_to", assigned_to).await?;
        next.assigned_to = Some(assigned_to);
    }
    if let Some(service_type_id) = payload.service_type_id {
        entity::ensure_live::<ServiceType>(&mut *tx, "service_type_id", service_type_id).await?;
        next.service_type_id = Some(service_type_id);
    }

    sqlx::query(
        "UPDATE job_orders SET description = ?, status = ?, scheduled_for = ?, assigned_to = ?, service_type_id = ?, \
         updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&next.description)
    .bind(&next.status)
    .bind(next.scheduled_for)
    .bind(next.assigned_to)
    .bind(next.service_type_id)
    .bind(utc_now())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let job_order = entity::find_live::<JobOrder>(&mut *tx, id).await?;
    audit::record_change(
        &mut *tx,
        principal.user_id,
        AuditAction::Update,
        Some(&prior),
        Some(&job_order),
        &context,
    )
    .await?;
    tx.commit().await?;

    Ok(Json(job_order))
}

#[utoipa::path(
    delete,
    path = "/job-orders/{id}",
    tag = "Job Orders",
    params(("id" = Uuid, Path, description = "Job order id")),
    responses(
        (status = 204, description = "Job order soft deleted"),
        (status = 400, description = "Job order already deleted"),
        (status = 403, description = "Requires ManageJobs"),
        (status = 404, description = "Job order not found")
    )
)]
pub async fn delete_job_order(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    lifecycle::soft_delete(&state.pool, &state.roles, &principal, EntityKind::JobOrder, id, &context).await?;
    Ok(StatusCode::NO_CONTENT)
}
