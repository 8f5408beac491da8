use log::{error, info};
use serde_json::Value;

use crate::backend::{path, Services, Updates};
use crate::error::{ChatResult, ValidationError};
use crate::models::{AuthProfileUpdate, Location, Profile, STATUS_ONLINE};
use crate::session::AuthSession;

use super::{avatar_path, load_profile, user_path};

/// First sign-in replaces the profile record; the profile tab merges into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    Setup,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    SignedIn,
    Updated,
}

/// An image the user picked, ready to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// Account information screen state.
pub struct AccountForm {
    services: Services,
    session: AuthSession,
    mode: SaveMode,
    name: Option<String>,
    about: Option<String>,
    phone_number: Option<String>,
    location: Option<Location>,
    avatar: Option<PickedImage>,
    default_avatar: Option<String>,
    error: Option<String>,
    loading: bool,
}

impl AccountForm {
    pub fn new(services: Services, session: AuthSession, mode: SaveMode) -> Self {
        let phone_number = session.user().phone_number.clone();
        AccountForm {
            services,
            session,
            mode,
            name: None,
            about: None,
            phone_number,
            location: None,
            avatar: None,
            default_avatar: None,
            error: None,
            loading: false,
        }
    }

    /// Prefill from the stored profile.
    pub async fn load(&mut self) -> ChatResult<()> {
        let Some(profile) = load_profile(self.services.store.as_ref(), self.session.uid()).await? else {
            return Ok(());
        };
        self.default_avatar = profile.photo;
        self.name = profile.name;
        self.about = profile.about;
        if profile.phone_number.is_some() {
            self.phone_number = profile.phone_number;
        }
        Ok(())
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
        self.error = None;
    }

    pub fn set_about(&mut self, about: &str) {
        self.about = Some(about.to_string());
    }

    pub fn set_location(&mut self, location: Option<Location>) {
        self.location = location;
    }

    pub fn set_avatar(&mut self, image: PickedImage) {
        self.avatar = Some(image);
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn about(&self) -> Option<&str> {
        self.about.as_deref()
    }

    /// Phone number in local notation (`+62` shown as a leading `0`).
    pub fn display_phone_number(&self) -> Option<String> {
        self.phone_number.as_ref().map(|p| p.replacen("+62", "0", 1))
    }

    pub fn default_avatar(&self) -> Option<&str> {
        self.default_avatar.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    /// Validate and save. An empty name is reported without touching the
    /// backend.
    pub async fn save(&mut self) -> ChatResult<SaveOutcome> {
        let name = match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                let err = ValidationError::EmptyName;
                self.error = Some(err.to_string());
                return Err(err.into());
            }
        };

        self.loading = true;
        let result = self.write(name).await;
        self.loading = false;

        match &result {
            Ok(outcome) => info!("Saved account information for {} ({:?})", self.session.uid(), outcome),
            Err(e) => error!("Failed to save account information for {}: {}", self.session.uid(), e),
        }
        result
    }

    fn payload(&self, name: String, image_url: Option<String>) -> (AuthProfileUpdate, Profile) {
        let photo = image_url
            .clone()
            .or_else(|| self.session.user().photo_url.clone());

        let profile = Profile {
            name: Some(name.clone()),
            about: self.about.clone(),
            location: self.location,
            status: Some(Value::from(STATUS_ONLINE)),
            phone_number: self.phone_number.clone(),
            photo,
            token_notification: None,
        };
        let auth = AuthProfileUpdate {
            display_name: Some(name),
            photo_url: image_url,
        };
        (auth, profile)
    }

    // Auth profile first, then the record. No transaction spans the two.
    async fn write(&mut self, name: String) -> ChatResult<SaveOutcome> {
        let uid = self.session.uid().to_string();

        let image_url = match &self.avatar {
            Some(image) => {
                let target = avatar_path(&uid);
                self.services
                    .storage
                    .put(&target, image.bytes.clone(), &image.mime)
                    .await?;
                Some(self.services.storage.download_url(&target).await?)
            }
            None => None,
        };

        let (auth_update, profile) = self.payload(name, image_url);
        let user = self.services.auth.update_profile(auth_update).await?;
        self.session.refresh(user);

        let record = serde_json::to_value(&profile)?;
        match self.mode {
            SaveMode::Setup => {
                self.services.store.set(&user_path(&uid), record).await?;
                Ok(SaveOutcome::SignedIn)
            }
            SaveMode::Edit => {
                let mut updates = Updates::new();
                if let Value::Object(fields) = record {
                    for (field, value) in fields {
                        updates.insert(path::join(&[&user_path(&uid), &field]), value);
                    }
                }
                self.services.store.update(updates).await?;
                Ok(SaveOutcome::Updated)
            }
        }
    }
}
