use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use chat_core::{ChatMessage, NewMessage};
use error_types::ErrorResponse;
use reqwest::{Client, Response, StatusCode};

/// Store operations as seen from a client.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn append(&self, conversation_key: &str, message: &NewMessage)
        -> ClientResult<ChatMessage>;

    async fn fetch_once(&self, conversation_key: &str) -> ClientResult<Vec<ChatMessage>>;
}

/// Talks to the chat service REST endpoints.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn messages_url(&self, conversation_key: &str) -> String {
        format!(
            "{}/api/chat/{}",
            self.base_url,
            urlencoding::encode(conversation_key)
        )
    }
}

async fn error_from_response(response: Response) -> ClientError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.message)
        .unwrap_or_else(|_| format!("HTTP {status}: {body}"));

    if status == StatusCode::BAD_REQUEST {
        ClientError::InvalidArgument(message)
    } else {
        ClientError::Unavailable(message)
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn append(
        &self,
        conversation_key: &str,
        message: &NewMessage,
    ) -> ClientResult<ChatMessage> {
        let response = self
            .client
            .post(self.messages_url(conversation_key))
            .json(message)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = error_from_response(response).await;
            tracing::warn!(conversation_key, error = %err, "append rejected");
            return Err(err);
        }

        response
            .json::<ChatMessage>()
            .await
            .map_err(|e| ClientError::Unavailable(format!("Parse failed: {e}")))
    }

    async fn fetch_once(&self, conversation_key: &str) -> ClientResult<Vec<ChatMessage>> {
        let response = self
            .client
            .get(self.messages_url(conversation_key))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        response
            .json::<Vec<ChatMessage>>()
            .await
            .map_err(|e| ClientError::Unavailable(format!("Parse failed: {e}")))
    }
}
