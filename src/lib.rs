//! HealthSight chat service
//!
//! Doctor/patient and room conversations keyed by a derived conversation
//! key, persisted by a [`services::MessageStore`] and pushed to live
//! subscribers as whole ordered snapshots.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod websocket;
