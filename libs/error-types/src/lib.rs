use serde::{Deserialize, Serialize};

/// Uniform API error body returned by every HealthSight endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short HTTP reason phrase, e.g. "Bad Request"
    pub error: String,

    /// Human readable description
    pub message: String,

    /// HTTP status code
    pub status: u16,

    /// Error category used by clients for routing.
    /// One of the constants in [`error_types`].
    pub error_type: String,

    /// Stable machine code, one of the constants in [`error_codes`]
    pub code: String,

    /// RFC 3339
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, status: u16, error_type: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            status,
            error_type: error_type.to_string(),
            code: code.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

pub mod error_codes {
    // Chat
    pub const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";
    pub const STORE_UNAVAILABLE: &str = "STORE_UNAVAILABLE";
    pub const SUBSCRIPTION_TERMINATED: &str = "SUBSCRIPTION_TERMINATED";

    // System
    pub const CONFIGURATION_ERROR: &str = "CONFIGURATION_ERROR";
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
}

pub mod error_types {
    pub const VALIDATION_ERROR: &str = "validation_error";
    pub const SERVER_ERROR: &str = "server_error";
    pub const SERVICE_UNAVAILABLE_ERROR: &str = "service_unavailable_error";
}
