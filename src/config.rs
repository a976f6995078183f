use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Which message store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl StoreBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Some(StoreBackend::Postgres),
            "memory" | "in-memory" | "mem" => Some(StoreBackend::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    /// Upper bound for every store round-trip; elapsed means `Unavailable`.
    pub store_timeout: Duration,
    /// `*` allows any origin.
    pub cors_allowed_origins: Vec<String>,
    pub log_format: LogFormat,
}

impl Config {
    fn parse_list(value: &str) -> Vec<String> {
        value
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    }

    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();

        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        let store_backend = match env::var("CHAT_STORE") {
            Ok(value) => StoreBackend::parse(&value).ok_or_else(|| {
                crate::error::AppError::Config(format!(
                    "CHAT_STORE must be 'postgres' or 'memory', got '{value}'"
                ))
            })?,
            Err(_) if database_url.is_some() => StoreBackend::Postgres,
            Err(_) => StoreBackend::Memory,
        };

        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(crate::error::AppError::Config(
                "DATABASE_URL missing (required when CHAT_STORE=postgres)".into(),
            ));
        }

        let store_timeout_ms: u64 = env::var("STORE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(5000);

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| Self::parse_list(&v))
            .unwrap_or_else(|_| vec!["*".to_string()]);

        let log_format = match env::var("LOG_FORMAT") {
            Ok(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            port,
            store_backend,
            database_url,
            store_timeout: Duration::from_millis(store_timeout_ms),
            cors_allowed_origins,
            log_format,
        })
    }

    /// In-memory configuration used by tests and local runs.
    pub fn in_memory() -> Self {
        Self {
            port: 8080,
            store_backend: StoreBackend::Memory,
            database_url: None,
            store_timeout: Duration::from_millis(5000),
            cors_allowed_origins: vec!["*".to_string()],
            log_format: LogFormat::Text,
        }
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_allowed_origins.iter().any(|o| o == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "PORT",
            "CHAT_STORE",
            "DATABASE_URL",
            "STORE_TIMEOUT_MS",
            "CORS_ALLOWED_ORIGINS",
            "LOG_FORMAT",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_to_memory_without_database_url() {
        clear_env();
        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.store_timeout, Duration::from_millis(5000));
        assert!(config.allows_any_origin());
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    #[serial]
    fn test_database_url_selects_postgres() {
        clear_env();
        env::set_var("DATABASE_URL", "postgres://localhost/healthsight");
        env::set_var("STORE_TIMEOUT_MS", "250");
        let config = Config::from_env().unwrap();
        assert_eq!(config.store_backend, StoreBackend::Postgres);
        assert_eq!(config.store_timeout, Duration::from_millis(250));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_postgres_without_url_is_rejected() {
        clear_env();
        env::set_var("CHAT_STORE", "postgres");
        assert!(matches!(
            Config::from_env(),
            Err(crate::error::AppError::Config(_))
        ));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_unknown_backend_is_rejected() {
        clear_env();
        env::set_var("CHAT_STORE", "firestore");
        assert!(Config::from_env().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_cors_origin_list() {
        clear_env();
        env::set_var("CORS_ALLOWED_ORIGINS", "https://app.healthsight.io, https://admin.healthsight.io");
        let config = Config::from_env().unwrap();
        assert_eq!(config.cors_allowed_origins.len(), 2);
        assert!(!config.allows_any_origin());
        clear_env();
    }
}
