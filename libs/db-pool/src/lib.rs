//! Database connection pool management
//!
//! Pool creation, env-driven configuration and schema bootstrap for the chat
//! service's PostgreSQL message store.

mod metrics;

pub use metrics::acquire_with_metrics;
use metrics::update_pool_metrics;

use deadpool_postgres::tokio_postgres::{Config as PgConfig, NoTls};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
pub use deadpool_postgres::PoolError;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

pub type PgPool = Pool;

#[derive(Debug, Error)]
pub enum DbPoolError {
    #[error("invalid database url: {0}")]
    InvalidUrl(#[source] tokio_postgres::Error),

    #[error("pool build failed: {0}")]
    Build(String),

    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("database connection verification timed out after {0}s")]
    VerifyTimeout(u64),
}

/// Database connection pool configuration
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Service name for metrics labeling
    pub service_name: String,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Connection creation timeout (new connection to PostgreSQL)
    pub connect_timeout_secs: u64,
    /// Connection acquisition timeout (get connection from pool)
    pub acquire_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            service_name: String::from("unknown"),
            database_url: String::new(),
            max_connections: 10,
            connect_timeout_secs: 5,
            acquire_timeout_secs: 10,
        }
    }
}

impl DbConfig {
    /// Build from `DATABASE_URL` and the `DB_*` tuning variables.
    pub fn from_env(service_name: &str) -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable not set".to_string())?;
        let defaults = Self::default();

        Ok(Self {
            service_name: service_name.to_string(),
            database_url,
            max_connections: env_or("DB_MAX_CONNECTIONS", defaults.max_connections),
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT_SECS", defaults.connect_timeout_secs),
            acquire_timeout_secs: env_or("DB_ACQUIRE_TIMEOUT_SECS", defaults.acquire_timeout_secs),
        })
    }

    /// Log pool configuration details
    pub fn log_config(&self) {
        info!(
            "Database Pool Configuration: max_connections={}, connect_timeout={}s, acquire_timeout={}s",
            self.max_connections, self.connect_timeout_secs, self.acquire_timeout_secs
        );
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Build a deadpool-postgres pool and verify it can reach the server.
pub async fn create_pool(config: DbConfig) -> Result<PgPool, DbPoolError> {
    debug!(
        service = %config.service_name,
        max = config.max_connections,
        acquire_timeout = config.acquire_timeout_secs,
        "Creating database pool"
    );

    let pg_config: PgConfig = config
        .database_url
        .parse()
        .map_err(DbPoolError::InvalidUrl)?;

    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
    let pool = Pool::builder(mgr)
        .max_size(config.max_connections as usize)
        .runtime(Runtime::Tokio1)
        .wait_timeout(Some(Duration::from_secs(config.acquire_timeout_secs)))
        .create_timeout(Some(Duration::from_secs(config.connect_timeout_secs)))
        .build()
        .map_err(|e| DbPoolError::Build(e.to_string()))?;

    let verify = async {
        let client = pool.get().await?;
        client.simple_query("SELECT 1").await?;
        Ok::<(), DbPoolError>(())
    };

    match tokio::time::timeout(Duration::from_secs(config.connect_timeout_secs), verify).await {
        Ok(Ok(())) => {
            info!(
                service = %config.service_name,
                "Database pool created and verified successfully"
            );

            update_pool_metrics(&pool, &config.service_name);

            let pool_clone = pool.clone();
            let service = config.service_name.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(30));
                loop {
                    interval.tick().await;
                    update_pool_metrics(&pool_clone, &service);
                }
            });

            Ok(pool)
        }
        Ok(Err(e)) => {
            error!(
                service = %config.service_name,
                error = %e,
                "Database connection verification failed"
            );
            Err(e)
        }
        Err(_) => {
            error!(
                service = %config.service_name,
                timeout_secs = config.connect_timeout_secs,
                "Database connection verification timeout"
            );
            Err(DbPoolError::VerifyTimeout(config.connect_timeout_secs))
        }
    }
}

/// Apply an idempotent schema script (`CREATE ... IF NOT EXISTS`).
pub async fn run_schema(pool: &PgPool, name: &str, sql: &str) -> Result<(), DbPoolError> {
    let client = pool.get().await?;
    client.batch_execute(sql).await?;
    info!(schema = %name, "Database schema applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DbConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.connect_timeout_secs, 5);
        assert_eq!(config.acquire_timeout_secs, 10);
    }

    #[test]
    #[serial_test::serial]
    fn test_config_from_env_overrides() {
        std::env::set_var("DATABASE_URL", "postgres://localhost/healthsight");
        std::env::set_var("DB_MAX_CONNECTIONS", "4");
        std::env::remove_var("DB_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("DB_ACQUIRE_TIMEOUT_SECS");

        let config = DbConfig::from_env("healthsight-chat-service").unwrap();
        assert_eq!(config.service_name, "healthsight-chat-service");
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.connect_timeout_secs, 5);

        std::env::remove_var("DB_MAX_CONNECTIONS");
        std::env::remove_var("DATABASE_URL");
    }

    #[test]
    #[serial_test::serial]
    fn test_config_requires_database_url() {
        std::env::remove_var("DATABASE_URL");
        assert!(DbConfig::from_env("svc").is_err());
    }
}
