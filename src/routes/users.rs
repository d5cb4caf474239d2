use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::app::AppState;
use crate::audit::{self, AuditAction, NewAuditRecord, RequestContext};
use crate::authz::{Action, Principal, Role};
use crate::db;
use crate::entity::{self, EntityKind};
use crate::errors::{AppError, AppResult};
use crate::extract::{ApiJson, ApiPath};
use crate::lifecycle;
use crate::models::user::{User, UserCreateRequest, UserUpdateRequest, UserWithRoles};
use crate::session;
use crate::utils::{hash_password, normalize_email, required_text, utc_now};

/// Inserts a user row and its role rows; returns the new id.
pub async fn insert_user(
    conn: &mut SqliteConnection,
    name: &str,
    email: &str,
    password: &str,
    roles: &[Role],
) -> AppResult<Uuid> {
    let password_hash = hash_password(password)?;
    let now = utc_now();
    let user_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    replace_roles(conn, user_id, roles).await?;

    Ok(user_id)
}

async fn replace_roles(conn: &mut SqliteConnection, user_id: Uuid, roles: &[Role]) -> AppResult<()> {
    sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    let now = utc_now();
    for role in roles {
        sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(role.as_str())
            .bind(now)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Live user together with its role names.
pub async fn user_with_roles(conn: &mut SqliteConnection, user_id: Uuid) -> AppResult<UserWithRoles> {
    let user = entity::find_live::<User>(conn, user_id).await?;
    let roles = session::load_roles(&mut *conn, user_id).await?;
    Ok(UserWithRoles { user, roles })
}

/// User snapshots include roles, so role changes show up in the audit trail.
pub(crate) async fn record_user_change(
    conn: &mut SqliteConnection,
    actor_id: Uuid,
    action: AuditAction,
    prior: Option<&UserWithRoles>,
    new: Option<&UserWithRoles>,
    context: &RequestContext,
) -> AppResult<()> {
    let entity_id = new
        .or(prior)
        .map(|u| u.user.id)
        .ok_or_else(|| AppError::internal("audit record needs a prior or new state"))?;
    let snapshot = |u: &UserWithRoles| {
        serde_json::to_value(u).map_err(|err| AppError::internal(format!("failed to snapshot user: {err}")))
    };

    audit::record(
        conn,
        NewAuditRecord {
            actor_id: Some(actor_id),
            action,
            entity_type: EntityKind::User,
            entity_id,
            prior_state: prior.map(snapshot).transpose()?,
            new_state: new.map(snapshot).transpose()?,
            context: context.clone(),
        },
    )
    .await?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    responses(
        (status = 200, description = "Live users with their roles", body = [UserWithRoles]),
        (status = 403, description = "Requires ManageUsers")
    )
)]
pub async fn list_users(State(state): State<AppState>, principal: Principal) -> AppResult<Json<Vec<UserWithRoles>>> {
    state.roles.require(&principal, Action::ManageUsers)?;

    let users = entity::list_live::<User>(&state.pool).await?;
    let mut result = Vec::with_capacity(users.len());
    for user in users {
        let roles = session::load_roles(&state.pool, user.id).await?;
        result.push(UserWithRoles { user, roles });
    }

    Ok(Json(result))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    request_body = UserCreateRequest,
    responses(
        (status = 201, description = "User created", body = UserWithRoles),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Requires ManageUsers"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiJson(payload): ApiJson<UserCreateRequest>,
) -> AppResult<(StatusCode, Json<UserWithRoles>)> {
    state.roles.require(&principal, Action::ManageUsers)?;

    let name = required_text("name", Some(&payload.name))?;
    let email = normalize_email("email", &payload.email)?;

    let mut tx = db::begin_write(&state.pool).await?;
    let user_id = insert_user(&mut *tx, &name, &email, &payload.password, &payload.roles).await?;
    let user = user_with_roles(&mut *tx, user_id).await?;
    record_user_change(&mut *tx, principal.user_id, AuditAction::Create, None, Some(&user), &context).await?;
    tx.commit().await?;

    tracing::info!(user_id = %user_id, roles = ?user.roles, "user created");

    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User detail", body = UserWithRoles),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<UserWithRoles>> {
    state.roles.require(&principal, Action::ManageUsers)?;

    let mut conn = state.pool.acquire().await?;
    Ok(Json(user_with_roles(&mut conn, id).await?))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "User updated", body = UserWithRoles),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UserUpdateRequest>,
) -> AppResult<Json<UserWithRoles>> {
    state.roles.require(&principal, Action::ManageUsers)?;

    if id == principal.user_id {
        if let Some(roles) = payload.roles.as_ref() {
            if !roles.contains(&Role::Owner) {
                return Err(AppError::validation("owners cannot remove their own OWNER role"));
            }
        }
    }

    let mut tx = db::begin_write(&state.pool).await?;
    let prior = user_with_roles(&mut *tx, id).await?;

    let name = match payload.name.as_deref() {
        Some(name) => required_text("name", Some(name))?,
        None => prior.user.name.clone(),
    };
    let email = match payload.email.as_deref() {
        Some(email) => normalize_email("email", email)?,
        None => prior.user.email.clone(),
    };

    sqlx::query("UPDATE users SET name = ?, email = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(&name)
        .bind(&email)
        .bind(utc_now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if let Some(roles) = payload.roles.as_ref() {
        replace_roles(&mut *tx, id, roles).await?;
    }

    let updated = user_with_roles(&mut *tx, id).await?;
    record_user_change(
        &mut *tx,
        principal.user_id,
        AuditAction::Update,
        Some(&prior),
        Some(&updated),
        &context,
    )
    .await?;
    tx.commit().await?;

    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "User soft deleted"),
        (status = 400, description = "Already deleted, or deleting yourself"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    lifecycle::soft_delete(&state.pool, &state.roles, &principal, EntityKind::User, id, &context).await?;
    Ok(StatusCode::NO_CONTENT)
}
