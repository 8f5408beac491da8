// Live message list for one conversation, read from the signed-in user's
// own namespace.

use std::collections::VecDeque;

use futures::StreamExt;
use log::{debug, warn};

use crate::backend::{EventKind, RealtimeStore, StoreEvent, Subscription};
use crate::error::BackendResult;
use crate::models::{Message, MessageRecord};
use crate::session::AuthSession;

use super::conversation_path;

/// Messages as the chat screen shows them, newest first.
#[derive(Debug, Default, Clone)]
pub struct ConversationView {
    messages: VecDeque<Message>,
}

impl ConversationView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a newly observed message in front of everything seen so far.
    pub fn apply(&mut self, message: Message) {
        self.messages.push_front(message);
    }

    pub fn newest_first(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn oldest_first(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().rev()
    }

    pub fn latest(&self) -> Option<&Message> {
        self.messages.front()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Child-added listener on `messages/{me}/{peer}`.
#[derive(Debug)]
pub struct MessageStream {
    subscription: Subscription,
}

impl MessageStream {
    pub fn attach(store: &dyn RealtimeStore, session: &AuthSession, peer_uid: &str) -> BackendResult<Self> {
        let path = conversation_path(session.uid(), peer_uid);
        let subscription = store.subscribe(&path, EventKind::ChildAdded)?;
        debug!("Listening for messages on {}", path);
        Ok(MessageStream { subscription })
    }

    /// Wait for the next message. `None` once the listener is gone.
    pub async fn next_message(&mut self) -> Option<Message> {
        while let Some(event) = self.subscription.next().await {
            if let Some(message) = decode(event) {
                return Some(message);
            }
        }
        None
    }

    /// Next queued message, without waiting.
    pub fn try_next_message(&mut self) -> Option<Message> {
        while let Some(event) = self.subscription.try_next_event() {
            if let Some(message) = decode(event) {
                return Some(message);
            }
        }
        None
    }

    pub fn release(self) {
        self.subscription.release();
    }
}

fn decode(event: StoreEvent) -> Option<Message> {
    let key = event.key?;
    let record: MessageRecord = match serde_json::from_value(event.value) {
        Ok(record) => record,
        Err(e) => {
            warn!("Skipping malformed message {}: {}", key, e);
            return None;
        }
    };
    let message = record.into_message(&key);
    if message.is_none() {
        warn!("Skipping message {} without a resolved timestamp", key);
    }
    message
}
