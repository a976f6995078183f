//! Conversation endpoints
//!
//! Keys arrive as path segments and are validated before any store access.

use crate::{error::AppError, state::AppState};
use actix_web::{get, post, web, HttpResponse};
use chat_core::{resolve_conversation_key, ConversationKey, NewMessage};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct ResolveKeyQuery {
    pub a: String,
    pub b: String,
}

#[derive(Serialize)]
pub struct ResolveKeyResponse {
    pub conversation_key: ConversationKey,
}

/// GET /api/chat/key?a=&b=
/// Canonical key for a pair of participants; argument order does not matter
#[get("/api/chat/key")]
pub async fn resolve_key(query: web::Query<ResolveKeyQuery>) -> Result<HttpResponse, AppError> {
    let ResolveKeyQuery { a, b } = query.into_inner();
    if a.trim().is_empty() || b.trim().is_empty() {
        return Err(AppError::InvalidArgument(
            "both participant ids are required".into(),
        ));
    }

    let conversation_key = resolve_conversation_key(a.trim(), b.trim());
    // Ids with characters outside the key alphabet produce an unusable key.
    ConversationKey::parse(conversation_key.as_str())?;

    Ok(HttpResponse::Ok().json(ResolveKeyResponse { conversation_key }))
}

/// GET /api/chat/{key}
/// Full ordered history of the conversation
#[get("/api/chat/{key}")]
pub async fn get_messages(
    state: web::Data<AppState>,
    key: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let conversation_key = ConversationKey::parse(&key.into_inner())?;
    let messages = state.chat.fetch_once(&conversation_key).await?;
    Ok(HttpResponse::Ok().json(messages))
}

/// POST /api/chat/{key}
/// Append a message; responds with the persisted message
#[post("/api/chat/{key}")]
pub async fn send_message(
    state: web::Data<AppState>,
    key: web::Path<String>,
    body: web::Json<NewMessage>,
) -> Result<HttpResponse, AppError> {
    let conversation_key = ConversationKey::parse(&key.into_inner())?;
    let message = state
        .chat
        .append(&conversation_key, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(message))
}

/// GET /api/chat/{key}/transcript
#[get("/api/chat/{key}/transcript")]
pub async fn transcript(
    state: web::Data<AppState>,
    key: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let conversation_key = ConversationKey::parse(&key.into_inner())?;
    let body = state.chat.transcript(&conversation_key).await?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(body))
}

/// GET /health
#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    match state.chat.health_check().await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "store": state.chat.backend(),
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unavailable",
            "store": state.chat.backend(),
            "error": e.to_string(),
        })),
    }
}
