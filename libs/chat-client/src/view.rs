//! # Chat View
//!
//! State of one rendered conversation, updated only through
//! [`ChatView::reduce`].
//!
//! Sends are tracked in an outbox keyed by a local, monotonic sequence
//! number. A confirmation replaces its own entry in place whatever order
//! confirmations arrive in, so the rendered order is always submission order.
//!
//! ```text
//! Compose ──Submit──▶ Optimistic ──Confirm──▶ Confirmed ──Snapshot──▶ (history)
//!                         │
//!                         └──Fail──▶ removed, notice shown
//! ```

use crate::error::ClientError;
use chat_core::{ChatMessage, NewMessage};
use chrono::Utc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    /// Shown locally, not yet acknowledged by the store.
    Optimistic,
    /// Acknowledged; waiting to show up in a snapshot.
    Confirmed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEntry {
    pub seq: u64,
    pub state: SendState,
    pub message: ChatMessage,
    /// History length when the send was submitted; the stored copy can only
    /// appear past this index.
    pub history_mark: usize,
}

#[derive(Debug, Clone)]
pub enum ViewAction {
    /// Replace the input box content.
    Compose(String),
    /// Send the current input as `sender`.
    Submit { sender: String },
    Confirm { seq: u64, message: ChatMessage },
    Fail { seq: u64, error: ClientError },
    /// Authoritative ordered list from the store.
    Snapshot(Vec<ChatMessage>),
    DismissNotice,
}

#[derive(Debug, Clone, Default)]
pub struct ChatView {
    input: String,
    history: Vec<ChatMessage>,
    outbox: Vec<OutboxEntry>,
    next_seq: u64,
    notice: Option<String>,
    /// History ids already paired with a local send by content.
    settled_ids: Vec<String>,
}

pub fn local_id(seq: u64) -> String {
    format!("local-{seq}")
}

impl ChatView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Transient user-facing message from the last failed action.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn outbox(&self) -> &[OutboxEntry] {
        &self.outbox
    }

    /// Sequence number the next successful `Submit` will use.
    pub fn next_seq(&self) -> u64 {
        self.next_seq + 1
    }

    pub fn entry(&self, seq: u64) -> Option<&OutboxEntry> {
        self.outbox.iter().find(|e| e.seq == seq)
    }

    pub fn is_pending(&self, seq: u64) -> bool {
        self.entry(seq)
            .is_some_and(|e| e.state == SendState::Optimistic)
    }

    /// Store history followed by sends the history does not contain yet, in
    /// submission order.
    pub fn rendered(&self) -> Vec<ChatMessage> {
        let mut list = self.history.clone();
        list.extend(
            self.outbox
                .iter()
                .filter(|e| !self.in_history(&e.message.id))
                .map(|e| e.message.clone()),
        );
        list
    }

    /// Optimistic entries whose stored copy already arrived in a snapshot.
    ///
    /// A snapshot can overtake the append response, and the local id never
    /// matches the stored one. Each unconfirmed entry, in submission order,
    /// claims the first unclaimed history message past its mark with the same
    /// sender and text.
    fn settled_optimistic(&self) -> Vec<(u64, String)> {
        let mut claimed: Vec<bool> = self
            .history
            .iter()
            .map(|m| {
                self.settled_ids.contains(&m.id)
                    || self
                        .outbox
                        .iter()
                        .any(|e| e.state == SendState::Confirmed && e.message.id == m.id)
            })
            .collect();

        let mut settled = Vec::new();
        for entry in self
            .outbox
            .iter()
            .filter(|e| e.state == SendState::Optimistic)
        {
            let found = (entry.history_mark..self.history.len()).find(|&i| {
                !claimed[i]
                    && self.history[i].sender == entry.message.sender
                    && self.history[i].text == entry.message.text
            });
            if let Some(i) = found {
                claimed[i] = true;
                settled.push((entry.seq, self.history[i].id.clone()));
            }
        }
        settled
    }

    fn in_history(&self, id: &str) -> bool {
        self.history.iter().any(|m| m.id == id)
    }

    pub fn reduce(self, action: ViewAction) -> Self {
        match action {
            ViewAction::Compose(text) => Self {
                input: text,
                ..self
            },
            ViewAction::Submit { sender } => self.submit(sender),
            ViewAction::Confirm { seq, message } => self.confirm(seq, message),
            ViewAction::Fail { seq, error } => self.fail(seq, error),
            ViewAction::Snapshot(list) => self.snapshot(list),
            ViewAction::DismissNotice => Self {
                notice: None,
                ..self
            },
        }
    }

    fn submit(mut self, sender: String) -> Self {
        let request = NewMessage::new(self.input.clone(), sender);
        let validated = match request.validate() {
            Ok(v) => v,
            Err(e) => {
                self.notice = Some(ClientError::from(e).to_string());
                return self;
            }
        };

        self.next_seq += 1;
        let seq = self.next_seq;
        self.outbox.push(OutboxEntry {
            seq,
            state: SendState::Optimistic,
            message: ChatMessage {
                id: local_id(seq),
                text: validated.text().to_string(),
                sender: validated.sender().to_string(),
                timestamp: Utc::now(),
            },
            history_mark: self.history.len(),
        });
        self.input.clear();
        self.notice = None;
        self
    }

    fn confirm(mut self, seq: u64, message: ChatMessage) -> Self {
        if self.in_history(&message.id) {
            self.outbox.retain(|e| e.seq != seq);
            return self;
        }
        if let Some(entry) = self.outbox.iter_mut().find(|e| e.seq == seq) {
            entry.state = SendState::Confirmed;
            entry.message = message;
        }
        self
    }

    fn fail(mut self, seq: u64, error: ClientError) -> Self {
        let Some(pos) = self.outbox.iter().position(|e| e.seq == seq) else {
            return self;
        };
        let entry = self.outbox.remove(pos);
        if self.input.is_empty() {
            self.input = entry.message.text;
        }
        self.notice = Some(error.to_string());
        self
    }

    fn snapshot(mut self, list: Vec<ChatMessage>) -> Self {
        // Append-only history: a shorter list is an older one.
        if list.len() < self.history.len() {
            return self;
        }
        self.history = list;
        let settled = self.settled_optimistic();
        let history = &self.history;
        self.outbox.retain(|e| match e.state {
            SendState::Optimistic => !settled.iter().any(|(seq, _)| *seq == e.seq),
            SendState::Confirmed => !history.iter().any(|m| m.id == e.message.id),
        });
        self.settled_ids.extend(settled.into_iter().map(|(_, id)| id));
        self
    }
}
