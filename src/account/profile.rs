// Profile tab: show the stored profile, change the photo, sign out.

use log::info;
use serde_json::Value;

use crate::backend::{path, Services};
use crate::chat::presence;
use crate::error::ChatResult;
use crate::models::Profile;
use crate::session::AuthSession;

use super::{avatar_path, load_profile, user_path, PickedImage};

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileDetails {
    pub uid: String,
    pub email: Option<String>,
    pub profile: Profile,
}

pub async fn load_details(services: &Services, session: &AuthSession) -> ChatResult<ProfileDetails> {
    let profile = load_profile(services.store.as_ref(), session.uid())
        .await?
        .unwrap_or_default();
    Ok(ProfileDetails {
        uid: session.uid().to_string(),
        email: session.user().email.clone(),
        profile,
    })
}

/// Upload a new photo and point the profile at it. Returns the photo URL.
pub async fn change_photo(services: &Services, session: &AuthSession, image: PickedImage) -> ChatResult<String> {
    let target = avatar_path(session.uid());
    services.storage.put(&target, image.bytes, &image.mime).await?;
    let url = services.storage.download_url(&target).await?;

    services
        .store
        .set(&path::join(&[&user_path(session.uid()), "photo"]), Value::from(url.clone()))
        .await?;
    info!("Updated photo for {}", session.uid());
    Ok(url)
}

/// Record last-seen and sign out. The status is written while the session
/// is still signed in.
pub async fn sign_out(services: &Services, session: AuthSession) -> ChatResult<()> {
    presence::mark_last_seen(services.store.as_ref(), &session).await?;
    services.auth.sign_out().await?;
    Ok(())
}
