// Backend collaborator interfaces
// The app never talks to a concrete service directly: auth, the real-time
// store, blob storage and push messaging are reached through these traits.

use std::collections::BTreeMap;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use log::debug;
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::BackendResult;
use crate::models::{AuthProfileUpdate, AuthUser};

pub mod memory;
pub mod path;
pub mod push_id;

pub use memory::MemoryBackend;

/// Path → value writes applied together by [`RealtimeStore::update`].
pub type Updates = BTreeMap<String, Value>;

/// Placeholders the store replaces at commit time.
pub struct ServerValue;

impl ServerValue {
    pub fn timestamp() -> Value {
        json!({ ".sv": "timestamp" })
    }

    pub fn is_timestamp(value: &Value) -> bool {
        value
            .as_object()
            .map(|o| o.len() == 1 && o.get(".sv").and_then(Value::as_str) == Some("timestamp"))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ChildAdded,
    ChildChanged,
    ChildRemoved,
    Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreEvent {
    pub kind: EventKind,
    /// Child key for child events, `None` for value events.
    pub key: Option<String>,
    /// New value for added/changed/value events, old value for removed.
    pub value: Value,
}

/// A live listener on one store path.
///
/// Events arrive in commit order. Dropping the handle (or calling
/// [`Subscription::release`]) detaches the listener exactly once.
pub struct Subscription {
    path: String,
    kind: EventKind,
    events: UnboundedReceiverStream<StoreEvent>,
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        path: String,
        kind: EventKind,
        rx: mpsc::UnboundedReceiver<StoreEvent>,
        detach: Box<dyn FnOnce() + Send>,
    ) -> Self {
        Subscription {
            path,
            kind,
            events: UnboundedReceiverStream::new(rx),
            detach: Some(detach),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Next event without waiting, if one is queued.
    pub fn try_next_event(&mut self) -> Option<StoreEvent> {
        self.events.as_mut().try_recv().ok()
    }

    /// Detach the listener now. Equivalent to dropping the handle.
    pub fn release(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            debug!("Detaching {:?} listener on '{}'", self.kind, self.path);
            detach();
        }
    }
}

impl Stream for Subscription {
    type Item = StoreEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StoreEvent>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

/// Hierarchical real-time data store.
#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// Read the value at `path` once.
    async fn get(&self, path: &str) -> BackendResult<Option<Value>>;

    /// Replace the value at `path`. `Value::Null` deletes it.
    async fn set(&self, path: &str, value: Value) -> BackendResult<()>;

    /// Apply several writes atomically: all of them or none.
    async fn update(&self, updates: Updates) -> BackendResult<()>;

    /// Generate a fresh, chronologically sortable child key under `path`.
    fn push_key(&self, path: &str) -> BackendResult<String>;

    /// Attach a listener. Child-added listeners first receive one event per
    /// existing child; value listeners first receive the current value.
    fn subscribe(&self, path: &str, kind: EventKind) -> BackendResult<Subscription>;
}

/// A phone challenge waiting for the code the user received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingVerification {
    pub verification_id: String,
    pub phone_number: String,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    fn current_user(&self) -> Option<AuthUser>;

    /// Auth state changes: `Some` on sign-in/profile change, `None` on sign-out.
    fn watch(&self) -> watch::Receiver<Option<AuthUser>>;

    async fn sign_in_with_phone_number(&self, phone_number: &str) -> BackendResult<PendingVerification>;

    async fn confirm_code(&self, pending: &PendingVerification, code: &str) -> BackendResult<AuthUser>;

    async fn update_profile(&self, update: AuthProfileUpdate) -> BackendResult<AuthUser>;

    async fn sign_out(&self) -> BackendResult<()>;
}

#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> BackendResult<()>;

    async fn download_url(&self, path: &str) -> BackendResult<String>;
}

#[async_trait]
pub trait PushMessaging: Send + Sync {
    /// This device's notification token.
    async fn token(&self) -> BackendResult<String>;
}

/// Handles to every collaborator, cloned into each screen.
#[derive(Clone)]
pub struct Services {
    pub auth: Arc<dyn AuthProvider>,
    pub store: Arc<dyn RealtimeStore>,
    pub storage: Arc<dyn BlobStorage>,
    pub messaging: Arc<dyn PushMessaging>,
}
