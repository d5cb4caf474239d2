use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use sqlx::SqliteConnection;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::app::AppState;
use crate::audit::{self, AuditAction, RequestContext};
use crate::authz::{Action, Principal};
use crate::db;
use crate::entity::{self, Entity, EntityKind};
use crate::errors::{AppError, AppResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::lifecycle;
use crate::models::client::Client;
use crate::models::site::{Site, SiteCreateRequest, SiteUpdateRequest};
use crate::utils::{optional_text, required_text, utc_now};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SiteQuery {
    /// Only sites of this client.
    pub client_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/sites",
    tag = "Sites",
    params(SiteQuery),
    responses(
        (status = 200, description = "Live sites, newest first", body = [Site]),
        (status = 403, description = "Requires ManageClients")
    )
)]
pub async fn list_sites(
    State(state): State<AppState>,
    principal: Principal,
    ApiQuery(query): ApiQuery<SiteQuery>,
) -> AppResult<Json<Vec<Site>>> {
    state.roles.require(&principal, Action::ManageClients)?;

    let Some(client_id) = query.client_id else {
        return Ok(Json(entity::list_live::<Site>(&state.pool).await?));
    };

    let sql = format!(
        "SELECT {} FROM {} WHERE client_id = ? AND deleted_at IS NULL ORDER BY created_at DESC",
        Site::COLUMNS,
        Site::TABLE
    );
    let sites = sqlx::query_as::<_, Site>(&sql)
        .bind(client_id)
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(sites))
}

#[utoipa::path(
    post,
    path = "/sites",
    tag = "Sites",
    request_body = SiteCreateRequest,
    responses(
        (status = 201, description = "Site created", body = Site),
        (status = 400, description = "Invalid input or client not live")
    )
)]
pub async fn create_site(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiJson(payload): ApiJson<SiteCreateRequest>,
) -> AppResult<(StatusCode, Json<Site>)> {
    state.roles.require(&principal, Action::ManageClients)?;

    let name = required_text("name", Some(&payload.name))?;
    let now = utc_now();
    let id = Uuid::new_v4();

    let mut tx = db::begin_write(&state.pool).await?;
    entity::ensure_live::<Client>(&mut *tx, "client_id", payload.client_id).await?;

    sqlx::query(
        "INSERT INTO sites (id, client_id, name, address, contact_name, contact_phone, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(payload.client_id)
    .bind(&name)
    .bind(optional_text(payload.address.as_deref()))
    .bind(optional_text(payload.contact_name.as_deref()))
    .bind(optional_text(payload.contact_phone.as_deref()))
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let site = entity::find_live::<Site>(&mut *tx, id).await?;
    audit::record_change(&mut *tx, principal.user_id, AuditAction::Create, None, Some(&site), &context).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(site)))
}

#[utoipa::path(
    get,
    path = "/sites/{id}",
    tag = "Sites",
    params(("id" = Uuid, Path, description = "Site id")),
    responses(
        (status = 200, description = "Site detail", body = Site),
        (status = 404, description = "Site not found")
    )
)]
pub async fn get_site(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Site>> {
    state.roles.require(&principal, Action::ManageClients)?;

    let mut conn = state.pool.acquire().await?;
    Ok(Json(entity::find_live::<Site>(&mut conn, id).await?))
}

#[utoipa::path(
    put,
    path = "/sites/{id}",
    tag = "Sites",
    params(("id" = Uuid, Path, description = "Site id")),
    request_body = SiteUpdateRequest,
    responses(
        (status = 200, description = "Site updated", body = Site),
        (status = 404, description = "Site not found")
    )
)]
pub async fn update_site(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<SiteUpdateRequest>,
) -> AppResult<Json<Site>> {
    state.roles.require(&principal, Action::ManageClients)?;

    let mut tx = db::begin_write(&state.pool).await?;
    let prior = entity::find_live::<Site>(&mut *tx, id).await?;

    let mut next = prior.clone();
    if let Some(name) = payload.name.as_deref() {
        next.name = required_text("name", Some(name))?;
    }
    if payload.address.is_some() {
        next.address = optional_text(payload.address.as_deref());
    }
    if payload.contact_name.is_some() {
        next.contact_name = optional_text(payload.contact_name.as_deref());
    }
    if payload.contact_phone.is_some() {
        next.contact_phone = optional_text(payload.contact_phone.as_deref());
    }

    sqlx::query(
        "UPDATE sites SET name = ?, address = ?, contact_name = ?, contact_phone = ?, updated_at = ? \
         WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&next.name)
    .bind(&next.address)
    .bind(&next.contact_name)
    .bind(&next.contact_phone)
    .bind(utc_now())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let site = entity::find_live::<Site>(&mut *tx, id).await?;
    audit::record_change(&mut *tx, principal.user_id, AuditAction::Update, Some(&prior), Some(&site), &context).await?;
    tx.commit().await?;

    Ok(Json(site))
}

#[utoipa::path(
    delete,
    path = "/sites/{id}",
    tag = "Sites",
    params(("id" = Uuid, Path, description = "Site id")),
    responses(
        (status = 204, description = "Site soft deleted"),
        (status = 400, description = "Site already deleted"),
        (status = 404, description = "Site not found")
    )
)]
pub async fn delete_site(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    lifecycle::soft_delete(&state.pool, &state.roles, &principal, EntityKind::Site, id, &context).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Rejects a site that is not live or belongs to a different client.
pub(crate) async fn ensure_site_of_client(conn: &mut SqliteConnection, site_id: Uuid, client_id: Uuid) -> AppResult<()> {
    match entity::find_by_id::<Site>(conn, site_id).await? {
        Some(site) if !site.is_deleted() && site.client_id == client_id => Ok(()),
        Some(site) if !site.is_deleted() => Err(AppError::validation("site_id belongs to a different client")),
        _ => Err(AppError::validation("site_id does not reference a live site")),
    }
}
