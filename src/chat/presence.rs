// Peer presence: read side for the chat header, plus the one-way status
// writes made on sign-in and sign-out.

use std::fmt::Display;

use chrono::{DateTime, TimeZone};
use futures::StreamExt;
use log::{debug, info};
use serde_json::Value;

use crate::backend::{path, EventKind, RealtimeStore, ServerValue, StoreEvent, Subscription};
use crate::error::BackendResult;
use crate::models::{UserStatus, UserSummary, STATUS_ONLINE};
use crate::session::AuthSession;

use super::format;

pub fn status_path(uid: &str) -> String {
    path::join(&["users", uid, "status"])
}

/// Value listener on a peer's status.
#[derive(Debug)]
pub struct PresenceWatch {
    subscription: Subscription,
    status: Option<UserStatus>,
    seen_initial: bool,
}

impl PresenceWatch {
    /// Start from the status the peer summary was opened with; stored values
    /// take over as they arrive.
    pub fn attach(store: &dyn RealtimeStore, peer: &UserSummary) -> BackendResult<Self> {
        let subscription = store.subscribe(&status_path(&peer.uid), EventKind::Value)?;
        Ok(PresenceWatch {
            subscription,
            status: peer.status.clone(),
            seen_initial: false,
        })
    }

    pub fn status(&self) -> Option<&UserStatus> {
        self.status.as_ref()
    }

    /// Header text for the current status, empty while unknown.
    pub fn label<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> String
    where
        Tz::Offset: Display,
    {
        self.status
            .as_ref()
            .map(|s| format::status_label(s, now))
            .unwrap_or_default()
    }

    /// Wait for the status to change. `None` once the listener is gone.
    pub async fn next_status(&mut self) -> Option<UserStatus> {
        while let Some(event) = self.subscription.next().await {
            if let Some(status) = self.apply(event) {
                return Some(status);
            }
        }
        None
    }

    /// Apply queued updates without waiting; true if the status changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Some(event) = self.subscription.try_next_event() {
            changed |= self.apply(event).is_some();
        }
        changed
    }

    pub fn release(self) {
        self.subscription.release();
    }

    fn apply(&mut self, event: StoreEvent) -> Option<UserStatus> {
        // Only the first event may fall back to the summary's status
        let initial = !std::mem::replace(&mut self.seen_initial, true);
        if initial && event.value.is_null() {
            return None;
        }
        let status = UserStatus::from_value(&event.value);
        if self.status.as_ref() == Some(&status) {
            return None;
        }
        debug!("Presence on {} is now {:?}", self.subscription.path(), status);
        self.status = Some(status.clone());
        Some(status)
    }
}

/// Mark the signed-in user online.
pub async fn mark_online(store: &dyn RealtimeStore, session: &AuthSession) -> BackendResult<()> {
    info!("Marking {} online", session.uid());
    store
        .set(&status_path(session.uid()), Value::from(STATUS_ONLINE))
        .await
}

/// Record the signed-in user's last-seen time as the server's clock.
pub async fn mark_last_seen(store: &dyn RealtimeStore, session: &AuthSession) -> BackendResult<()> {
    info!("Recording last seen for {}", session.uid());
    store
        .set(&status_path(session.uid()), ServerValue::timestamp())
        .await
}
