//! # Actix Middleware Library
//!
//! Middleware shared by HealthSight Actix services
//!
//! ## Modules
//! - `request_id`: `x-request-id` propagation
//! - `logging`: request/response logging through `tracing`

pub mod logging;
pub mod request_id;

pub use logging::Logging;
pub use request_id::{RequestId, RequestIdValue};
