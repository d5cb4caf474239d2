use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type AppResult<T> = Result<T, AppError>;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("not deleted: {0}")]
    NotDeleted(String),
    #[error("already deleted: {0}")]
    AlreadyDeleted(String),
    #[error("invalid entity type: {0}")]
    InvalidEntityType(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("token error: {0}")]
    Token(String),
    #[error("database error")]
    Database(sqlx::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Validation failure for a required field that was absent or blank.
    pub fn missing_field(field: &str) -> Self {
        Self::Validation(format!("{field} is required"))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn not_deleted(message: impl Into<String>) -> Self {
        Self::NotDeleted(message.into())
    }

    pub fn already_deleted(message: impl Into<String>) -> Self {
        Self::AlreadyDeleted(message.into())
    }

    pub fn invalid_entity_type(name: impl Into<String>) -> Self {
        Self::InvalidEntityType(name.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn token(err: impl Into<String>) -> Self {
        Self::Token(err.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Stable machine-readable kind, used as the `error` field of responses.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::NotDeleted(_) => "not_deleted",
            AppError::AlreadyDeleted(_) => "already_deleted",
            AppError::InvalidEntityType(_) => "invalid_entity_type",
            AppError::Conflict(_) => "conflict",
            AppError::Configuration(_) => "configuration",
            AppError::Token(_) => "token",
            AppError::Database(_) => "internal_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotDeleted(_) => StatusCode::BAD_REQUEST,
            AppError::AlreadyDeleted(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidEntityType(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Self::Conflict("a record with the same unique value already exists".to_string());
            }
        }
        Self::Database(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Database details stay in the logs, the caller only sees the kind.
        let message = match &self {
            AppError::Database(err) => {
                tracing::error!(error = %err, "database failure");
                self.to_string()
            }
            AppError::Internal(detail) => {
                tracing::error!(detail = %detail, "internal failure");
                self.to_string()
            }
            _ => self.to_string(),
        };

        let payload = ErrorResponse {
            error: self.kind(),
            message,
        };

        (status, Json(payload)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_precondition_errors_are_bad_requests() {
        assert_eq!(AppError::not_deleted("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::already_deleted("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::invalid_entity_type("Widget").status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_field_names_the_field() {
        let err = AppError::missing_field("entity_type");
        assert_eq!(err.kind(), "validation_error");
        assert!(err.to_string().contains("entity_type is required"));
    }

    #[test]
    fn row_not_found_is_an_internal_database_error() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.kind(), "internal_error");
    }
}
