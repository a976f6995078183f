// Re-export route modules
pub mod messages;
pub mod wsroute;

use crate::error::AppError;
use actix_web::web;

/// Register every chat endpoint.
///
/// `/api/chat/key` must precede `/api/chat/{key}`, which would otherwise
/// capture it.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        AppError::InvalidArgument(format!("malformed message body: {err}")).into()
    }))
    .service(messages::resolve_key)
    .service(messages::health)
    .service(wsroute::ws_handler)
    .service(messages::transcript)
    .service(messages::get_messages)
    .service(messages::send_message)
    .route("/metrics", web::get().to(crate::metrics::metrics_handler));
}
