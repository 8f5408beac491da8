// Account flows: phone verification, account information, profile.

use crate::backend::{path, AuthProvider, RealtimeStore};
use crate::error::BackendResult;
use crate::models::Profile;
use crate::session::AuthSession;

pub mod information;
pub mod profile;
pub mod verification;

pub use information::{AccountForm, PickedImage, SaveMode, SaveOutcome};
pub use verification::{NextStep, VerificationForm};

pub fn user_path(uid: &str) -> String {
    path::join(&["users", uid])
}

pub fn avatar_path(uid: &str) -> String {
    path::join(&["images", uid])
}

/// Read the profile record for `uid`, if one was ever saved.
pub async fn load_profile(store: &dyn RealtimeStore, uid: &str) -> BackendResult<Option<Profile>> {
    match store.get(&user_path(uid)).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Which screen the app starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    SignIn,
    AccountInformation(AuthSession),
    Home(AuthSession),
}

pub fn initial_route(auth: &dyn AuthProvider) -> Route {
    match AuthSession::current(auth) {
        Ok(session) if session.has_display_name() => Route::Home(session),
        Ok(session) => Route::AccountInformation(session),
        Err(_) => Route::SignIn,
    }
}
