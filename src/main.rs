use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use healthsight_chat_service::{
    config::{self, StoreBackend},
    db, error, logging, routes,
    services::{ChatService, InMemoryMessageStore, MessageStore, PgMessageStore},
    state::AppState,
    websocket::SubscriptionRegistry,
};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> Result<(), error::AppError> {
    let cfg = Arc::new(config::Config::from_env()?);
    logging::init_tracing(cfg.log_format);

    let store: Arc<dyn MessageStore> = match cfg.store_backend {
        StoreBackend::Postgres => {
            let database_url = cfg.database_url.as_deref().ok_or_else(|| {
                error::AppError::Config("DATABASE_URL missing for postgres store".into())
            })?;
            let pool = db::init_pool(database_url)
                .await
                .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;
            Arc::new(PgMessageStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory message store; messages are lost on restart");
            Arc::new(InMemoryMessageStore::new())
        }
    };

    let chat = ChatService::new(store, SubscriptionRegistry::new(), cfg.store_timeout);
    let state = AppState {
        chat,
        config: cfg.clone(),
    };

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(
        %bind_addr,
        store = state.chat.backend(),
        store_timeout_ms = cfg.store_timeout.as_millis() as u64,
        "starting healthsight-chat-service"
    );

    HttpServer::new(move || {
        let cors = build_cors(&state.config);

        App::new()
            .wrap(cors)
            .wrap(actix_middleware::Logging)
            .wrap(actix_middleware::RequestId::new())
            .app_data(web::Data::new(state.clone()))
            .configure(routes::configure)
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind REST: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(format!("REST server: {e}")))
}

fn build_cors(cfg: &config::Config) -> Cors {
    let cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600);

    if cfg.allows_any_origin() {
        return cors.allow_any_origin();
    }
    cfg.cors_allowed_origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}
