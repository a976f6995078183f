use crate::error::ClientError;
use chat_core::{ChatMessage, SubscriptionFrame};
use futures_util::StreamExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Live subscription to one conversation.
///
/// Dropping it stops delivery; [`unsubscribe`](Self::unsubscribe) also
/// closes the socket cleanly.
pub struct ClientSubscription {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ClientSubscription {
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub async fn unsubscribe(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ClientSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

pub fn subscription_url(ws_base_url: &str, conversation_key: &str) -> String {
    format!(
        "{}/api/chat/{}/ws",
        ws_base_url.trim_end_matches('/'),
        urlencoding::encode(conversation_key)
    )
}

/// Subscribe to whole ordered snapshots of `conversation_key`.
///
/// `on_update` gets the full list on every change, never a shorter list than
/// the one before. `on_error` runs at most once, after which nothing more is
/// delivered. Must be called within a tokio runtime.
pub fn subscribe<F, E>(
    ws_base_url: &str,
    conversation_key: &str,
    on_update: F,
    on_error: E,
) -> ClientSubscription
where
    F: FnMut(Vec<ChatMessage>) + Send + 'static,
    E: FnOnce(ClientError) + Send + 'static,
{
    let url = subscription_url(ws_base_url, conversation_key);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        if let Err(e) = run(&url, on_update, shutdown_rx).await {
            tracing::warn!(%url, error = %e, "chat subscription ended");
            on_error(e);
        }
    });

    ClientSubscription {
        shutdown: Some(shutdown_tx),
        task: Some(task),
    }
}

async fn run<F>(
    url: &str,
    mut on_update: F,
    mut shutdown: oneshot::Receiver<()>,
) -> Result<(), ClientError>
where
    F: FnMut(Vec<ChatMessage>),
{
    let (mut ws, _) = connect_async(url)
        .await
        .map_err(|e| ClientError::SubscriptionTerminated(format!("connect: {e}")))?;
    tracing::debug!(%url, "chat subscription connected");

    let mut delivered_len: Option<usize> = None;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                let _ = ws.close(None).await;
                return Ok(());
            }
            msg = ws.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(frame))) => {
                        return Err(ClientError::SubscriptionTerminated(format!(
                            "closed by server: {frame:?}"
                        )));
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        return Err(ClientError::SubscriptionTerminated(e.to_string()));
                    }
                    None => {
                        return Err(ClientError::SubscriptionTerminated(
                            "connection closed".into(),
                        ));
                    }
                };

                match SubscriptionFrame::from_json(text.as_str()) {
                    Ok(SubscriptionFrame::Snapshot { messages, .. }) => {
                        if delivered_len.map_or(true, |n| messages.len() > n) {
                            delivered_len = Some(messages.len());
                            on_update(messages);
                        }
                    }
                    Ok(SubscriptionFrame::Error { code, message }) => {
                        return Err(ClientError::SubscriptionTerminated(format!(
                            "{code}: {message}"
                        )));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "ignoring unreadable subscription frame");
                    }
                }
            }
        }
    }
}
