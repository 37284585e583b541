// src/error.rs
//! HTTP-facing error type; services work in `anyhow::Result` and convert here

use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::{Request, Response};
use tracing::error;

use crate::web::types::StandardErrorResponse;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{field}: {message}")]
    Validation { field: String, message: String },
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{} not found", what))
    }

    pub fn status(&self) -> Status {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation { .. } => Status::BadRequest,
            ApiError::Unauthorized(_) => Status::Unauthorized,
            ApiError::Forbidden(_) => Status::Forbidden,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Conflict(_) => Status::Conflict,
            ApiError::ServiceUnavailable(_) => Status::ServiceUnavailable,
            ApiError::Internal(_) => Status::InternalServerError,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn suggestions(&self) -> Vec<String> {
        match self {
            ApiError::Validation { field, .. } => vec![format!("Check the '{}' field", field)],
            ApiError::Unauthorized(_) => vec![
                "Obtain a token from /api/auth/token".to_string(),
                "Send it as 'Authorization: Bearer <token>'".to_string(),
            ],
            ApiError::Forbidden(_) => {
                vec!["This action requires a different account type".to_string()]
            }
            ApiError::ServiceUnavailable(_) => vec!["Try again later".to_string()],
            _ => Vec::new(),
        }
    }

    pub fn to_body(&self) -> StandardErrorResponse {
        StandardErrorResponse::new(
            self.to_string(),
            self.error_code().to_string(),
            self.suggestions(),
        )
    }
}

/// Extended result code SQLite uses for `ON DELETE RESTRICT`, which sqlx leaves unclassified.
const SQLITE_CONSTRAINT_TRIGGER: &str = "1811";

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(sqlx::Error::Database(db_err)) = err.downcast_ref::<sqlx::Error>() {
            if db_err.is_unique_violation() {
                return ApiError::Conflict("A record with these values already exists".to_string());
            }
            if db_err.is_foreign_key_violation()
                || db_err.code().as_deref() == Some(SQLITE_CONSTRAINT_TRIGGER)
            {
                return ApiError::Conflict(
                    "The record is still referenced by other records".to_string(),
                );
            }
        }
        error!("Internal error: {:#}", err);
        ApiError::Internal("Internal server error".to_string())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::from(anyhow::Error::from(err))
    }
}

impl From<crate::types::TransitionError> for ApiError {
    fn from(err: crate::types::TransitionError) -> Self {
        ApiError::validation("status", err.to_string())
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        Response::build_from(Json(self.to_body()).respond_to(req)?)
            .status(status)
            .ok()
    }
}
