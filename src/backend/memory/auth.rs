use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use log::{info, warn};
use rand::Rng;
use tokio::sync::watch;
use uuid::Uuid;

use crate::backend::{AuthProvider, PendingVerification};
use crate::error::{BackendError, BackendResult};
use crate::models::{AuthProfileUpdate, AuthUser};

#[derive(Default)]
struct AuthState {
    accounts: HashMap<String, AuthUser>, // phone number -> account
    pending: HashMap<String, (String, String)>, // verification id -> (phone, code)
}

/// Phone-number auth kept in memory. Codes are "delivered" by logging them
/// and can be read back with [`MemoryAuth::sent_code`].
pub struct MemoryAuth {
    state: Mutex<AuthState>,
    current: watch::Sender<Option<AuthUser>>,
}

impl MemoryAuth {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        MemoryAuth {
            state: Mutex::new(AuthState::default()),
            current,
        }
    }

    /// Register an account up front so it exists before anyone signs in.
    pub fn seed_account(&self, user: AuthUser) {
        if let Some(phone) = user.phone_number.clone() {
            self.lock().accounts.insert(phone, user);
        } else {
            warn!("Not seeding account {} without a phone number", user.uid);
        }
    }

    /// The code issued for a pending verification, as an SMS would carry it.
    pub fn sent_code(&self, verification_id: &str) -> Option<String> {
        self.lock()
            .pending
            .get(verification_id)
            .map(|(_, code)| code.clone())
    }

    fn lock(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, user: Option<AuthUser>) {
        self.current.send_replace(user);
    }
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    fn current_user(&self) -> Option<AuthUser> {
        self.current.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<AuthUser>> {
        self.current.subscribe()
    }

    async fn sign_in_with_phone_number(&self, phone_number: &str) -> BackendResult<PendingVerification> {
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        let verification_id = Uuid::new_v4().simple().to_string();

        self.lock()
            .pending
            .insert(verification_id.clone(), (phone_number.to_string(), code.clone()));
        info!("Verification code for {}: {}", phone_number, code);

        Ok(PendingVerification {
            verification_id,
            phone_number: phone_number.to_string(),
        })
    }

    async fn confirm_code(&self, pending: &PendingVerification, code: &str) -> BackendResult<AuthUser> {
        let user = {
            let mut state = self.lock();
            let (phone, expected) = state
                .pending
                .get(&pending.verification_id)
                .cloned()
                .ok_or_else(|| BackendError::UnknownVerification(pending.verification_id.clone()))?;

            if expected != code {
                return Err(BackendError::VerificationRejected);
            }
            state.pending.remove(&pending.verification_id);

            state
                .accounts
                .entry(phone.clone())
                .or_insert_with(|| AuthUser {
                    uid: Uuid::new_v4().simple().to_string(),
                    phone_number: Some(phone),
                    display_name: None,
                    photo_url: None,
                    email: None,
                })
                .clone()
        };

        info!("Signed in as {}", user.uid);
        self.publish(Some(user.clone()));
        Ok(user)
    }

    async fn update_profile(&self, update: AuthProfileUpdate) -> BackendResult<AuthUser> {
        let mut user = self.current_user().ok_or(BackendError::NotSignedIn)?;
        if let Some(name) = update.display_name {
            user.display_name = Some(name);
        }
        if let Some(url) = update.photo_url {
            user.photo_url = Some(url);
        }

        if let Some(phone) = user.phone_number.clone() {
            self.lock().accounts.insert(phone, user.clone());
        }
        self.publish(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> BackendResult<()> {
        if let Some(user) = self.current_user() {
            info!("Signing out {}", user.uid);
        }
        self.publish(None);
        Ok(())
    }
}
