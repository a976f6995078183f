use crate::services::pg_message_store::SCHEMA;
use db_pool::{create_pool as create_pg_pool, run_schema, DbConfig as DbPoolConfig, DbPoolError, PgPool};

pub async fn init_pool(database_url: &str) -> Result<PgPool, DbPoolError> {
    let mut cfg = DbPoolConfig::from_env("healthsight-chat-service").unwrap_or_default();
    if cfg.database_url.is_empty() {
        cfg.database_url = database_url.to_string();
    }
    cfg.log_config();
    let pool = create_pg_pool(cfg).await?;
    run_schema(&pool, "0001_chat_messages", SCHEMA).await?;
    Ok(pool)
}
