use crate::middleware::error_handling;
use actix_web::{HttpResponse, ResponseError};
use chat_core::{KeyError, ValidationError};
use thiserror::Error;

impl ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        actix_web::http::StatusCode::from_u16(AppError::status_code(self))
            .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        error_handling::into_response(self)
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    /// Rejected before any persistence attempt.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Store or network failure during append, list or subscribe.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The live subscription failed and delivers nothing more.
    #[error("subscription terminated: {0}")]
    SubscriptionTerminated(String),

    #[error("internal server error")]
    Internal,
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::InvalidArgument(e.to_string())
    }
}

impl From<KeyError> for AppError {
    fn from(e: KeyError) -> Self {
        AppError::InvalidArgument(e.to_string())
    }
}

impl From<tokio_postgres::Error> for AppError {
    fn from(e: tokio_postgres::Error) -> Self {
        AppError::Unavailable(e.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for AppError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        AppError::Unavailable(e.to_string())
    }
}

impl AppError {
    /// Returns HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::InvalidArgument(_) => 400,
            AppError::Unavailable(_)
            | AppError::SubscriptionTerminated(_)
            | AppError::Config(_)
            | AppError::StartServer(_)
            | AppError::Internal => 500,
        }
    }
}
