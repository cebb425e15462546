use crate::middleware::error_handling;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use error_types::error_codes;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Why a request carried no usable identity
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("authentication required")]
    MissingSession,

    #[error("session is invalid or expired")]
    InvalidSession,

    #[error("Credentials not valid.")]
    InvalidCredentials,
}

#[derive(Debug, Error, Clone)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("{message}")]
    Validation { code: &'static str, message: String },

    #[error("{0}")]
    Unauthorized(AuthFailure),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal server error")]
    Internal,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(AppError::status_code(self)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        error_handling::into_response(self)
    }
}

impl From<tokio_postgres::Error> for AppError {
    fn from(e: tokio_postgres::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for AppError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        AppError::Storage(e.to_string())
    }
}

impl AppError {
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation {
            code,
            message: message.into(),
        }
    }

    /// Storage failures are transient; the caller may retry the whole request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Storage(_))
    }

    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation { .. } => 400,
            AppError::Unauthorized(_) => 401,
            AppError::NotFound(_) => 404,
            AppError::Conflict(_) => 409,
            AppError::Storage(_) => 503,
            AppError::Config(_) | AppError::StartServer(_) | AppError::Internal => 500,
        }
    }

    /// Stable machine code shared by HTTP bodies and WebSocket error frames
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { code, .. } => code,
            AppError::Unauthorized(AuthFailure::MissingSession) => error_codes::SESSION_MISSING,
            AppError::Unauthorized(AuthFailure::InvalidSession) => error_codes::SESSION_INVALID,
            AppError::Unauthorized(AuthFailure::InvalidCredentials) => {
                error_codes::INVALID_CREDENTIALS
            }
            AppError::NotFound(_) => error_codes::USER_NOT_FOUND,
            AppError::Conflict(_) => error_codes::USERNAME_TAKEN,
            AppError::Storage(_) => error_codes::STORAGE_UNAVAILABLE,
            AppError::Config(_) | AppError::StartServer(_) | AppError::Internal => {
                error_codes::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validation_error",
            AppError::Unauthorized(_) => "authentication_error",
            AppError::NotFound(_) => "not_found_error",
            AppError::Conflict(_) => "conflict_error",
            AppError::Storage(_) => "storage_error",
            AppError::Config(_) | AppError::StartServer(_) | AppError::Internal => "server_error",
        }
    }

    /// Message safe to show a client. Storage and server internals are not echoed.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Storage(_) => "storage temporarily unavailable, retry later".to_string(),
            AppError::Config(_) | AppError::StartServer(_) | AppError::Internal => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}
