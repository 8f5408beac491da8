use crate::backend::AuthProvider;
use crate::error::{BackendError, BackendResult};
use crate::models::AuthUser;

/// The signed-in account, handed to every screen that acts on its behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    user: AuthUser,
}

impl AuthSession {
    pub fn new(user: AuthUser) -> Self {
        AuthSession { user }
    }

    /// Session for whoever the provider currently has signed in.
    pub fn current(auth: &dyn AuthProvider) -> BackendResult<Self> {
        auth.current_user()
            .map(AuthSession::new)
            .ok_or(BackendError::NotSignedIn)
    }

    pub fn uid(&self) -> &str {
        &self.user.uid
    }

    pub fn user(&self) -> &AuthUser {
        &self.user
    }

    pub fn has_display_name(&self) -> bool {
        self.user
            .display_name
            .as_deref()
            .map_or(false, |name| !name.trim().is_empty())
    }

    /// Replace the cached account after the provider reported a change.
    pub fn refresh(&mut self, user: AuthUser) {
        if user.uid == self.user.uid {
            self.user = user;
        }
    }
}
