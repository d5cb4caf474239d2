//! Master data. Any signed-in user can read service types; changing them
//! needs ManageMasters.

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
use crate::models::service_type::{ServiceType, ServiceTypeCreateRequest, ServiceTypeUpdateRequest};
use crate::utils::{optional_text, required_text, utc_now};

fn normalize_code(code: &str) -> AppResult<String> {
    Ok(required_text("code", Some(code))?.to_uppercase())
}

#[utoipa::path(
    get,
    path = "/masters/service-types",
    tag = "Masters",
    responses(
        (status = 200, description = "Live service types", body = [ServiceType]),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_service_types(
    State(state): State<AppState>,
    _principal: Principal,
) -> AppResult<Json<Vec<ServiceType>>> {
    Ok(Json(entity::list_live::<ServiceType>(&state.pool).await?))
}

#[utoipa::path(
    post,
    path = "/masters/service-types",
    tag = "Masters",
    request_body = ServiceTypeCreateRequest,
    responses(
        (status = 201, description = "Service type created", body = ServiceType),
        (status = 409, description = "Code already in use")
    )
)]
pub async fn create_service_type(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiJson(payload): ApiJson<ServiceTypeCreateRequest>,
) -> AppResult<(StatusCode, Json<ServiceType>)> {
    state.roles.require(&principal, Action::ManageMasters)?;

    let code = normalize_code(&payload.code)?;
    let name = required_text("name", Some(&payload.name))?;
    let now = utc_now();
    let id = Uuid::new_v4();

    let mut tx = db::begin_write(&state.pool).await?;
    sqlx::query(
        "INSERT INTO service_types (id, code, name, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(&code)
    .bind(&name)
    .bind(optional_text(payload.description.as_deref()))
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let service_type = entity::find_live::<ServiceType>(&mut *tx, id).await?;
    audit::record_change(&mut *tx, principal.user_id, AuditAction::Create, None, Some(&service_type), &context)
        .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(service_type)))
}

#[utoipa::path(
    put,
    path = "/masters/service-types/{id}",
    tag = "Masters",
    params(("id" = Uuid, Path, description = "Service type id")),
    request_body = ServiceTypeUpdateRequest,
    responses(
        (status = 200, description = "Service type updated", body = ServiceType),
        (status = 404, description = "Service type not found"),
        (status = 409, description = "Code already in use")
    )
)]
pub async fn update_service_type(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<ServiceTypeUpdateRequest>,
) -> AppResult<Json<ServiceType>> {
    state.roles.require(&principal, Action::ManageMasters)?;

    let mut tx = db::begin_write(&state.pool).await?;
    let prior = entity::find_live::<ServiceType>(&mut *tx, id).await?;

    let mut next = prior.clone();
    if let Some(code) = payload.code.as_deref() {
        next.code = normalize_code(code)?;
    }
    if let Some(name) = payload.name.as_deref() {
        next.name = required_text("name", Some(name))?;
    }
    if payload.description.is_some() {
        next.description = optional_text(payload.description.as_deref());
    }

    sqlx::query(
        "UPDATE service_types SET code = ?, name = ?, description = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&next.code)
    .bind(&next.name)
    .bind(&next.description)
    .bind(utc_now())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let service_type = entity::find_live::<ServiceType>(&mut *tx, id).await?;
    audit::record_change(
        &mut *tx,
        principal.user_id,
        AuditAction::Update,
        Some(&prior),
        Some(&service_type),
        &context,
    )
    .await?;
    tx.commit().await?;

    Ok(Json(service_type))
}

#[utoipa::path(
    delete,
    path = "/masters/service-types/{id}",
    tag = "Masters",
    params(("id" = Uuid, Path, description = "Service type id")),
    responses(
        (status = 204, description = "Service type soft deleted"),
        (status = 400, description = "Service type already deleted"),
        (status = 404, description = "Service type not found")
    )
)]
pub async fn delete_service_type(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    lifecycle::soft_delete(&state.pool, &state.roles, &principal, EntityKind::ServiceType, id, &context).await?;
    Ok(StatusCode::NO_CONTENT)
}
