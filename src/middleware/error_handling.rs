use crate::error::AppError;
use actix_web::{http::StatusCode, HttpResponse};
use error_types::{error_codes, error_types as kinds, ErrorResponse};

/// Map domain errors to HTTP responses
pub fn map_error(err: &AppError) -> (StatusCode, ErrorResponse) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let (error_type, code) = match err {
        AppError::InvalidArgument(_) => (kinds::VALIDATION_ERROR, error_codes::INVALID_ARGUMENT),
        AppError::Unavailable(_) => (
            kinds::SERVICE_UNAVAILABLE_ERROR,
            error_codes::STORE_UNAVAILABLE,
        ),
        AppError::SubscriptionTerminated(_) => (
            kinds::SERVICE_UNAVAILABLE_ERROR,
            error_codes::SUBSCRIPTION_TERMINATED,
        ),
        AppError::Config(_) | AppError::StartServer(_) => {
            (kinds::SERVER_ERROR, error_codes::CONFIGURATION_ERROR)
        }
        AppError::Internal => (kinds::SERVER_ERROR, error_codes::INTERNAL_SERVER_ERROR),
    };

    let response = ErrorResponse::new(
        status.canonical_reason().unwrap_or("Error"),
        &err.to_string(),
        status.as_u16(),
        error_type,
        code,
    );

    (status, response)
}

pub fn into_response(err: &AppError) -> HttpResponse {
    let (status, response) = map_error(err);
    HttpResponse::build(status).json(response)
}
