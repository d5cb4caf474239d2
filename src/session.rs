//! Bearer tokens and the server-side sessions behind them.
//!
//! A token is an HS256 JWT naming a user and a session row. The session row is
//! the source of truth: logout revokes it, and a revoked or expired session
//! rejects the token even while the JWT itself is still valid.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::authz::Principal;
use crate::errors::{AppError, AppResult};
use crate::utils::utc_now;

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
}

impl TokenConfig {
    pub fn from_env() -> AppResult<Self> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        let exp_hours = match std::env::var("JWT_EXP_HOURS") {
            Ok(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|hours| *hours > 0)
                .ok_or_else(|| AppError::configuration("JWT_EXP_HOURS must be a positive integer"))?,
            Err(_) => 24,
        };

        Ok(Self::new(secret.into_bytes(), exp_hours))
    }

    pub fn new(secret: Vec<u8>, exp_hours: i64) -> Self {
        Self {
            secret: Arc::new(secret),
            exp_hours,
        }
    }

    pub fn encode(&self, user_id: Uuid, session_id: Uuid, expires_at: DateTime<Utc>) -> AppResult<String> {
        let claims = Claims {
            sub: user_id,
            sid: session_id,
            exp: expires_at.timestamp() as usize,
            iat: utc_now().timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub sid: Uuid,
    pub exp: usize,
    pub iat: usize,
}

/// Opens a session for `user_id` and returns the bearer token for it.
pub async fn open(pool: &SqlitePool, tokens: &TokenConfig, user_id: Uuid) -> AppResult<String> {
    let now = utc_now();
    let expires_at = now + Duration::hours(tokens.exp_hours);
    let session_id = Uuid::new_v4();

    sqlx::query("INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(session_id)
        .bind(user_id)
        .bind(now)
        .bind(expires_at)
        .execute(pool)
        .await?;

    tokens.encode(user_id, session_id, expires_at)
}

pub async fn revoke(pool: &SqlitePool, session_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE sessions SET revoked_at = ? WHERE id = ? AND revoked_at IS NULL")
        .bind(utc_now())
        .bind(session_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[derive(Debug, FromRow)]
struct SessionUser {
    user_id: Uuid,
    name: String,
    email: String,
    expires_at: DateTime<Utc>,
}

/// Resolves token claims into a principal: the session must be open and
/// unexpired, and its user must be live.
pub async fn load_principal(pool: &SqlitePool, claims: &Claims) -> AppResult<Principal> {
    let row = sqlx::query_as::<_, SessionUser>(
        "SELECT u.id AS user_id, u.name, u.email, s.expires_at \
         FROM sessions s INNER JOIN users u ON u.id = s.user_id \
         WHERE s.id = ? AND s.user_id = ? AND s.revoked_at IS NULL AND u.deleted_at IS NULL",
    )
    .bind(claims.sid)
    .bind(claims.sub)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::unauthorized("session is not active"))?;

    if row.expires_at <= utc_now() {
        return Err(AppError::unauthorized("session expired"));
    }

    let roles = load_roles(pool, row.user_id).await?;

    Ok(Principal::new(row.user_id)
        .with_identity(row.name, row.email)
        .with_session(claims.sid)
        .with_roles(roles))
}

pub async fn load_roles<'c, E>(executor: E, user_id: Uuid) -> AppResult<Vec<String>>
where
    E: Executor<'c, Database = Sqlite>,
{
    let roles = sqlx::query_scalar::<_, String>("SELECT role FROM user_roles WHERE user_id = ? ORDER BY role")
        .bind(user_id)
        .fetch_all(executor)
        .await?;

    Ok(roles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_user_and_session() {
        let tokens = TokenConfig::new(b"unit-test-secret".to_vec(), 1);
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();

        let token = tokens
            .encode(user_id, session_id, utc_now() + Duration::hours(1))
            .unwrap();
        let claims = tokens.decode(&token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.sid, session_id);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let issuer = TokenConfig::new(b"secret-a".to_vec(), 1);
        let verifier = TokenConfig::new(b"secret-b".to_vec(), 1);

        let token = issuer
            .encode(Uuid::new_v4(), Uuid::new_v4(), utc_now() + Duration::hours(1))
            .unwrap();

        assert!(matches!(verifier.decode(&token), Err(AppError::Token(_))));
    }
}
