use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::audit::{AuditAction, RequestContext};
use crate::authz::{Principal, Role};
use crate::db;
use crate::errors::{AppError, AppResult};
use crate::extract::ApiJson;
use crate::models::user::{AuthResponse, LoginRequest, RegisterRequest, UserCredentials, UserWithRoles};
use crate::routes::users::{insert_user, record_user_change, user_with_roles};
use crate::session;
use crate::utils::{normalize_email, required_text, verify_password};

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    message: String,
}

/// Bootstrap registration. Only succeeds while the user table is empty; the
/// first account becomes the OWNER and everyone else is created by an owner.
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    security(()),
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Owner account created", body = AuthResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Registration is closed")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    context: RequestContext,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let name = required_text("name", Some(&payload.name))?;
    let email = normalize_email("email", &payload.email)?;

    let mut tx = db::begin_write(&state.pool).await?;

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users")
        .fetch_one(&mut *tx)
        .await?;
    if existing > 0 {
        return Err(AppError::forbidden(
            "registration is closed; ask an owner to create your account",
        ));
    }

    let user_id = insert_user(&mut *tx, &name, &email, &payload.password, &[Role::Owner]).await?;
    let user = user_with_roles(&mut *tx, user_id).await?;

    record_user_change(&mut *tx, user_id, AuditAction::Create, None, Some(&user), &context).await?;

    tx.commit().await?;

    tracing::info!(user_id = %user_id, "bootstrap owner registered");

    let token = session::open(&state.pool, &state.tokens, user_id).await?;

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    security(()),
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = payload.email.trim().to_lowercase();

    let credentials = sqlx::query_as::<_, UserCredentials>(
        "SELECT id, password_hash FROM users WHERE email = ? AND deleted_at IS NULL",
    )
    .bind(&email)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    if !verify_password(&payload.password, &credentials.password_hash)? {
        tracing::debug!(user_id = %credentials.id, "password mismatch");
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let token = session::open(&state.pool, &state.tokens, credentials.id).await?;
    let mut conn = state.pool.acquire().await?;
    let user = user_with_roles(&mut conn, credentials.id).await?;

    Ok(Json(AuthResponse { token, user }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user with roles", body = UserWithRoles),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(State(state): State<AppState>, principal: Principal) -> AppResult<Json<UserWithRoles>> {
    let mut conn = state.pool.acquire().await?;
    let user = user_with_roles(&mut conn, principal.user_id).await?;
    Ok(Json(user))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Session revoked", body = MessageResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn logout(State(state): State<AppState>, principal: Principal) -> AppResult<Json<MessageResponse>> {
    if let Some(session_id) = principal.session_id {
        session::revoke(&state.pool, session_id).await?;
        tracing::debug!(user_id = %principal.user_id, session_id = %session_id, "session revoked");
    }

    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}
