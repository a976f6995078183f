use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, TextEncoder};

pub static MESSAGES_APPENDED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "chat_messages_appended_total",
            "Messages persisted by the chat service",
        ),
        &["backend"],
    )
    .expect("failed to create chat_messages_appended_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register chat_messages_appended_total");
    counter
});

pub static STORE_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "chat_store_failures_total",
            "Store operations that ended as Unavailable",
        ),
        &["operation"],
    )
    .expect("failed to create chat_store_failures_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register chat_store_failures_total");
    counter
});

pub static ACTIVE_SUBSCRIBERS: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new(
        "chat_active_subscribers",
        "Live subscriptions currently registered",
    )
    .expect("failed to create chat_active_subscribers");
    prometheus::default_registry()
        .register(Box::new(gauge.clone()))
        .expect("failed to register chat_active_subscribers");
    gauge
});

pub async fn metrics_handler() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
