//! Drives a [`ChatView`] against a [`ChatTransport`].
//!
//! The view lives behind a mutex that is never held across an await, so
//! several sends can be in flight at once and subscription callbacks can
//! apply snapshots from another task.

use crate::error::{ClientError, ClientResult};
use crate::subscription::{subscribe, ClientSubscription};
use crate::transport::ChatTransport;
use crate::view::{ChatView, ViewAction};
use chat_core::{ChatMessage, NewMessage};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(15);

pub struct ChatSession<T: ChatTransport> {
    transport: Arc<T>,
    conversation_key: String,
    view: Arc<Mutex<ChatView>>,
    send_timeout: Duration,
}

impl<T: ChatTransport> Clone for ChatSession<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            conversation_key: self.conversation_key.clone(),
            view: self.view.clone(),
            send_timeout: self.send_timeout,
        }
    }
}

fn lock(view: &Mutex<ChatView>) -> MutexGuard<'_, ChatView> {
    // Reducer steps cannot leave the view half-updated, so a poisoned lock
    // still holds a consistent state.
    view.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn apply(view: &Mutex<ChatView>, action: ViewAction) {
    let mut guard = lock(view);
    let current = std::mem::take(&mut *guard);
    *guard = current.reduce(action);
}

impl<T: ChatTransport + 'static> ChatSession<T> {
    pub fn new(transport: T, conversation_key: impl Into<String>) -> Self {
        Self {
            transport: Arc::new(transport),
            conversation_key: conversation_key.into(),
            view: Arc::new(Mutex::new(ChatView::new())),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    pub fn conversation_key(&self) -> &str {
        &self.conversation_key
    }

    /// Copy of the current view state.
    pub fn view(&self) -> ChatView {
        lock(&self.view).clone()
    }

    pub fn rendered(&self) -> Vec<ChatMessage> {
        lock(&self.view).rendered()
    }

    pub fn compose(&self, text: impl Into<String>) {
        apply(&self.view, ViewAction::Compose(text.into()));
    }

    pub fn dismiss_notice(&self) {
        apply(&self.view, ViewAction::DismissNotice);
    }

    pub fn apply_snapshot(&self, messages: Vec<ChatMessage>) {
        apply(&self.view, ViewAction::Snapshot(messages));
    }

    /// One-shot history load into the view.
    pub async fn load(&self) -> ClientResult<()> {
        let messages = self.transport.fetch_once(&self.conversation_key).await?;
        self.apply_snapshot(messages);
        Ok(())
    }

    /// Send the current input as `sender`.
    ///
    /// The optimistic entry is visible before the request leaves. On success
    /// it is replaced by the stored message; on failure it is removed and the
    /// error becomes the view's notice.
    pub async fn send(&self, sender: &str) -> ClientResult<ChatMessage> {
        let (seq, request) = {
            let mut guard = lock(&self.view);
            let seq = guard.next_seq();
            let current = std::mem::take(&mut *guard);
            *guard = current.reduce(ViewAction::Submit {
                sender: sender.to_string(),
            });

            match guard.entry(seq) {
                Some(entry) => (
                    seq,
                    NewMessage::new(entry.message.text.clone(), entry.message.sender.clone()),
                ),
                None => {
                    let reason = guard.notice().unwrap_or("message rejected").to_string();
                    return Err(ClientError::InvalidArgument(reason));
                }
            }
        };

        let result = match tokio::time::timeout(
            self.send_timeout,
            self.transport.append(&self.conversation_key, &request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ClientError::Unavailable(format!(
                "send timed out after {}s",
                self.send_timeout.as_secs_f32()
            ))),
        };

        match &result {
            Ok(message) => apply(
                &self.view,
                ViewAction::Confirm {
                    seq,
                    message: message.clone(),
                },
            ),
            Err(e) => {
                tracing::warn!(
                    conversation_key = %self.conversation_key,
                    seq,
                    error = %e,
                    "send failed"
                );
                apply(
                    &self.view,
                    ViewAction::Fail {
                        seq,
                        error: e.clone(),
                    },
                );
            }
        }

        result
    }

    /// Keep the view in sync with the server's live snapshots.
    ///
    /// `on_error` runs once if the subscription ends; the session keeps its
    /// last state and a fresh `attach` resumes updates.
    pub fn attach<E>(&self, ws_base_url: &str, on_error: E) -> ClientSubscription
    where
        E: FnOnce(ClientError) + Send + 'static,
    {
        let view = self.view.clone();
        subscribe(
            ws_base_url,
            &self.conversation_key,
            move |messages| apply(&view, ViewAction::Snapshot(messages)),
            on_error,
        )
    }
}
