// Shared helpers for the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::LevelFilter;
use tokio::sync::watch;
use tokio::time::timeout;

use serde_json::Value;

use sochat::backend::memory::{Clock, MemoryStore};
use sochat::backend::{
    AuthProvider, EventKind, MemoryBackend, PendingVerification, RealtimeStore, Subscription, Updates,
};
use sochat::chat::{ChatScreen, ChatUpdate};
use sochat::error::{BackendError, BackendResult};
use sochat::models::{AuthProfileUpdate, AuthUser};
use sochat::AuthSession;

/// Server clock used by every test backend.
pub const NOW_MS: i64 = 1_700_000_000_000;

static INIT_LOGGER: Once = Once::new();

/// Set up the logger for the tests
pub fn setup_logging() {
    INIT_LOGGER.call_once(|| {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .init();
    });
}

pub fn fixed_clock(ms: i64) -> Clock {
    Arc::new(move || ms)
}

pub fn test_backend() -> MemoryBackend {
    MemoryBackend::with_clock("test-bucket", fixed_clock(NOW_MS))
}

pub fn user(uid: &str, name: Option<&str>, phone: &str) -> AuthUser {
    AuthUser {
        uid: uid.to_string(),
        phone_number: Some(phone.to_string()),
        display_name: name.map(str::to_string),
        photo_url: None,
        email: None,
    }
}

/// Sign in through the phone flow, reading the code the backend "texted".
pub async fn sign_in(backend: &MemoryBackend, phone: &str) -> Result<AuthSession> {
    let pending = backend.auth.sign_in_with_phone_number(phone).await?;
    let code = backend
        .auth
        .sent_code(&pending.verification_id)
        .ok_or_else(|| anyhow!("no code issued for {}", phone))?;
    let user = backend.auth.confirm_code(&pending, &code).await?;
    Ok(AuthSession::new(user))
}

/// Seed and sign in an account that already has a display name.
pub async fn sign_in_named(backend: &MemoryBackend, uid: &str, name: &str, phone: &str) -> Result<AuthSession> {
    backend.auth.seed_account(user(uid, Some(name), phone));
    sign_in(backend, phone).await
}

/// Apply updates until `ready` holds or two seconds pass.
pub async fn wait_for<F>(chat: &mut ChatScreen, mut ready: F) -> Result<()>
where
    F: FnMut(&ChatScreen) -> bool,
{
    timeout(Duration::from_secs(2), async {
        while !ready(chat) {
            if chat.next_update().await == ChatUpdate::Closed {
                return Err(anyhow!("chat listeners closed"));
            }
        }
        Ok(())
    })
    .await
    .map_err(|_| anyhow!("timed out waiting for chat updates"))?
}

/// Auth provider that only counts how often it is asked to confirm a code.
#[derive(Default)]
pub struct CountingAuth {
    confirms: AtomicUsize,
    current: Option<AuthUser>,
}

impl CountingAuth {
    pub fn signed_in(user: AuthUser) -> Self {
        CountingAuth {
            confirms: AtomicUsize::new(0),
            current: Some(user),
        }
    }

    pub fn confirm_calls(&self) -> usize {
        self.confirms.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthProvider for CountingAuth {
    fn current_user(&self) -> Option<AuthUser> {
        self.current.clone()
    }

    fn watch(&self) -> watch::Receiver<Option<AuthUser>> {
        watch::channel(self.current.clone()).1
    }

    async fn sign_in_with_phone_number(&self, phone_number: &str) -> BackendResult<PendingVerification> {
        Ok(PendingVerification {
            verification_id: "counting".to_string(),
            phone_number: phone_number.to_string(),
        })
    }

    async fn confirm_code(&self, _pending: &PendingVerification, _code: &str) -> BackendResult<AuthUser> {
        self.confirms.fetch_add(1, Ordering::SeqCst);
        Ok(user("counted", None, "+10000000000"))
    }

    async fn update_profile(&self, _update: AuthProfileUpdate) -> BackendResult<AuthUser> {
        Err(BackendError::NotSignedIn)
    }

    async fn sign_out(&self) -> BackendResult<()> {
        Ok(())
    }
}

/// Store that reads and listens like the wrapped one but refuses every write.
pub struct ReadOnlyStore {
    pub inner: Arc<MemoryStore>,
}

#[async_trait]
impl RealtimeStore for ReadOnlyStore {
    async fn get(&self, path: &str) -> BackendResult<Option<Value>> {
        self.inner.get(path).await
    }

    async fn set(&self, path: &str, _value: Value) -> BackendResult<()> {
        Err(BackendError::Unavailable(format!("write to {} refused", path)))
    }

    async fn update(&self, updates: Updates) -> BackendResult<()> {
        Err(BackendError::Unavailable(format!("update of {} paths refused", updates.len())))
    }

    fn push_key(&self, path: &str) -> BackendResult<String> {
        self.inner.push_key(path)
    }

    fn subscribe(&self, path: &str, kind: EventKind) -> BackendResult<Subscription> {
        self.inner.subscribe(path, kind)
    }
}
