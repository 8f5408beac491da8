// One-to-one chat: live message list, compose/send, peer presence.

use std::fmt::Display;
use std::sync::Arc;

use chrono::{DateTime, TimeZone};
use log::{error, info};

use crate::backend::{path, RealtimeStore};
use crate::error::ChatResult;
use crate::models::{Message, UserStatus, UserSummary};
use crate::session::AuthSession;

pub mod compose;
pub mod format;
pub mod presence;
pub mod stream;

pub use compose::append_message;
pub use presence::PresenceWatch;
pub use stream::{ConversationView, MessageStream};

/// Where `owner` keeps its copy of the conversation with `peer`.
pub fn conversation_path(owner: &str, peer: &str) -> String {
    path::join(&["messages", owner, peer])
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatUpdate {
    Message(Message),
    Presence(UserStatus),
    Closed,
}

/// State behind the chat screen. Listeners are attached on open and
/// released when the screen is closed or dropped.
pub struct ChatScreen {
    store: Arc<dyn RealtimeStore>,
    session: AuthSession,
    peer: UserSummary,
    view: ConversationView,
    text: String,
    stream: MessageStream,
    presence: PresenceWatch,
}

impl ChatScreen {
    pub fn open(store: Arc<dyn RealtimeStore>, session: AuthSession, peer: UserSummary) -> ChatResult<Self> {
        let stream = MessageStream::attach(store.as_ref(), &session, &peer.uid)?;
        let presence = PresenceWatch::attach(store.as_ref(), &peer)?;
        info!("Opened chat between {} and {}", session.uid(), peer.uid);

        Ok(ChatScreen {
            store,
            session,
            peer,
            view: ConversationView::new(),
            text: String::new(),
            stream,
            presence,
        })
    }

    pub fn peer(&self) -> &UserSummary {
        &self.peer
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn view(&self) -> &ConversationView {
        &self.view
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    pub fn is_own(&self, message: &Message) -> bool {
        message.sender_id == self.session.uid()
    }

    pub fn header_name(&self) -> String {
        format::header_name(&self.peer.name)
    }

    pub fn header_status<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> String
    where
        Tz::Offset: Display,
    {
        self.presence.label(now)
    }

    /// Send the compose text. Empty input is ignored and leaves the field as
    /// it was; a successful send clears it. The list updates when the
    /// listener reports the stored copy, not here.
    pub async fn send(&mut self) -> ChatResult<Option<String>> {
        match append_message(self.store.as_ref(), &self.session, &self.peer.uid, &self.text).await {
            Ok(Some(id)) => {
                self.text.clear();
                Ok(Some(id))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                error!("Failed to send message to {}: {}", self.peer.uid, e);
                Err(e.into())
            }
        }
    }

    /// Apply everything already queued; returns how many updates landed.
    pub fn poll_updates(&mut self) -> usize {
        let mut count = 0;
        while let Some(message) = self.stream.try_next_message() {
            self.view.apply(message);
            count += 1;
        }
        if self.presence.poll() {
            count += 1;
        }
        count
    }

    /// Wait for the next message or presence change.
    pub async fn next_update(&mut self) -> ChatUpdate {
        tokio::select! {
            Some(message) = self.stream.next_message() => {
                self.view.apply(message.clone());
                ChatUpdate::Message(message)
            }
            Some(status) = self.presence.next_status() => ChatUpdate::Presence(status),
            else => ChatUpdate::Closed,
        }
    }

    /// Tear the screen down, detaching both listeners.
    pub fn close(self) {
        info!("Closing chat with {}", self.peer.uid);
        self.stream.release();
        self.presence.release();
    }
}
