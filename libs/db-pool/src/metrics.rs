//! Prometheus metrics for database connection pool
//!
//! Tracks pool size, connection acquisition latency, and errors

use deadpool_postgres::{Client, Pool};
use prometheus::{register_histogram_vec, register_int_counter_vec, register_int_gauge_vec};
use prometheus::{HistogramVec, IntCounterVec, IntGaugeVec};
use std::time::Instant;

lazy_static::lazy_static! {
    /// Database connection pool size by state (idle/active/max)
    static ref DB_POOL_CONNECTIONS: IntGaugeVec = register_int_gauge_vec!(
        "db_pool_connections",
        "Database pool connection count by state",
        &["service", "state"]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// Time to acquire a connection from the pool
    static ref DB_POOL_ACQUIRE_DURATION: HistogramVec = register_histogram_vec!(
        "db_pool_acquire_duration_seconds",
        "Time to acquire connection from pool",
        &["service"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// Connection acquisition errors
    static ref DB_POOL_CONNECTION_ERRORS: IntCounterVec = register_int_counter_vec!(
        "db_pool_connection_errors_total",
        "Connection acquisition errors",
        &["service"]
    ).expect("Prometheus metrics registration should succeed at startup");
}

pub(crate) fn update_pool_metrics(pool: &Pool, service: &str) {
    let status = pool.status();
    let size = status.size as i64;
    let idle = status.available as i64;

    DB_POOL_CONNECTIONS
        .with_label_values(&[service, "idle"])
        .set(idle);
    DB_POOL_CONNECTIONS
        .with_label_values(&[service, "active"])
        .set(size - idle);
    DB_POOL_CONNECTIONS
        .with_label_values(&[service, "max"])
        .set(status.max_size as i64);
}

/// `pool.get()` that records acquisition latency and failures.
pub async fn acquire_with_metrics(
    pool: &Pool,
    service: &str,
) -> Result<Client, deadpool_postgres::PoolError> {
    let start = Instant::now();
    let result = pool.get().await;

    DB_POOL_ACQUIRE_DURATION
        .with_label_values(&[service])
        .observe(start.elapsed().as_secs_f64());

    if result.is_err() {
        DB_POOL_CONNECTION_ERRORS.with_label_values(&[service]).inc();
    }

    result
}
