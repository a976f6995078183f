// REST surface against the in-memory store.

use actix_web::{test, web, App};
use chat_core::ChatMessage;
use error_types::ErrorResponse;
use healthsight_chat_service::{
    config::Config,
    routes,
    services::{ChatService, InMemoryMessageStore},
    state::AppState,
    websocket::SubscriptionRegistry,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn state() -> AppState {
    let config = Config::in_memory();
    AppState {
        chat: ChatService::new(
            Arc::new(InMemoryMessageStore::new()),
            SubscriptionRegistry::new(),
            config.store_timeout,
        ),
        config: Arc::new(config),
    }
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .configure(routes::configure),
        )
        .await
    };
}

#[actix_web::test]
async fn test_post_then_get_returns_persisted_message() {
    let app = app!(state());

    let req = test::TestRequest::post()
        .uri("/api/chat/room_global")
        .set_json(json!({ "text": "Hello", "sender": "patient" }))
        .to_request();
    let created: ChatMessage = test::call_and_read_body_json(&app, req).await;
    assert_eq!(created.text, "Hello");
    assert_eq!(created.sender, "patient");
    assert!(!created.id.is_empty());

    let req = test::TestRequest::get()
        .uri("/api/chat/room_global")
        .to_request();
    let history: Vec<ChatMessage> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(history, vec![created]);
}

#[actix_web::test]
async fn test_unknown_conversation_is_empty() {
    let app = app!(state());

    let req = test::TestRequest::get()
        .uri("/api/chat/room_nobody")
        .to_request();
    let history: Vec<ChatMessage> = test::call_and_read_body_json(&app, req).await;
    assert!(history.is_empty());
}

#[actix_web::test]
async fn test_history_is_ordered_by_arrival() {
    let app = app!(state());

    for text in ["one", "two", "three"] {
        let req = test::TestRequest::post()
            .uri("/api/chat/room_ward-3")
            .set_json(json!({ "text": text, "sender": "Dr. Rao" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
    }

    let req = test::TestRequest::get()
        .uri("/api/chat/room_ward-3")
        .to_request();
    let history: Vec<ChatMessage> = test::call_and_read_body_json(&app, req).await;
    let texts: Vec<_> = history.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["one", "two", "three"]);
    assert!(history.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

#[actix_web::test]
async fn test_invalid_messages_are_rejected_with_400() {
    let app = app!(state());

    for body in [
        json!({ "text": "", "sender": "patient" }),
        json!({ "text": "   ", "sender": "patient" }),
        json!({ "text": "Hello" }),
        json!({ "sender": "patient" }),
    ] {
        let req = test::TestRequest::post()
            .uri("/api/chat/room_global")
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);

        let err: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(err.code, "INVALID_ARGUMENT");
        assert_eq!(err.status, 400);
    }

    let req = test::TestRequest::get()
        .uri("/api/chat/room_global")
        .to_request();
    let history: Vec<ChatMessage> = test::call_and_read_body_json(&app, req).await;
    assert!(history.is_empty());
}

#[actix_web::test]
async fn test_malformed_json_is_invalid_argument() {
    let app = app!(state());

    let req = test::TestRequest::post()
        .uri("/api/chat/room_global")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_invalid_key_is_rejected() {
    let app = app!(state());

    let req = test::TestRequest::get()
        .uri("/api/chat/room%20global")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_resolver_segment_is_not_a_conversation() {
    let app = app!(state());

    let req = test::TestRequest::post()
        .uri("/api/chat/key")
        .set_json(json!({ "text": "Hello", "sender": "patient" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.code, "INVALID_ARGUMENT");

    let req = test::TestRequest::get()
        .uri("/api/chat/key/transcript")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_resolve_key_is_order_independent() {
    let app = app!(state());

    let req = test::TestRequest::get()
        .uri("/api/chat/key?a=patient-42&b=doctor-1")
        .to_request();
    let first: Value = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::get()
        .uri("/api/chat/key?a=doctor-1&b=patient-42")
        .to_request();
    let second: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(first, second);
    assert_eq!(
        first["conversation_key"],
        "doctor_doctor-1_patient_patient-42"
    );

    let req = test::TestRequest::get()
        .uri("/api/chat/key?a=&b=doctor-1")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_doctor_patient_scenario() {
    let app = app!(state());

    let req = test::TestRequest::get()
        .uri("/api/chat/key?a=doctor-1&b=patient-42")
        .to_request();
    let resolved: Value = test::call_and_read_body_json(&app, req).await;
    let key = resolved["conversation_key"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/api/chat/{key}"))
        .set_json(json!({ "text": "Hello", "sender": "patient" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::get()
        .uri(&format!("/api/chat/{key}"))
        .to_request();
    let history: Vec<ChatMessage> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].text, "Hello");
    assert_eq!(history[0].sender, "patient");
}

#[actix_web::test]
async fn test_transcript_is_plain_text() {
    let app = app!(state());

    let req = test::TestRequest::post()
        .uri("/api/chat/room_global")
        .set_json(json!({ "text": "Appointment moved to 3pm", "sender": "admin" }))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get()
        .uri("/api/chat/room_global/transcript")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = test::read_body(resp).await;
    let body = std::str::from_utf8(&body).unwrap();
    assert!(body.starts_with("Conversation room_global"));
    assert!(body.contains("admin: Appointment moved to 3pm"));
}

#[actix_web::test]
async fn test_health_reports_store() {
    let app = app!(state());

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
}

#[actix_web::test]
async fn test_metrics_exposes_chat_counters() {
    let app = app!(state());

    let req = test::TestRequest::post()
        .uri("/api/chat/room_global")
        .set_json(json!({ "text": "ping", "sender": "admin" }))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get().uri("/metrics").to_request();
    let body = test::call_and_read_body(&app, req).await;
    let body = std::str::from_utf8(&body).unwrap();
    assert!(body.contains("chat_messages_appended_total"));
}
