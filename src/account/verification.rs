use log::{info, warn};
use serde_json::Value;

use crate::backend::{path, AuthProvider, PendingVerification, Services, Updates};
use crate::chat::presence::status_path;
use crate::error::{ChatResult, ValidationError};
use crate::models::STATUS_ONLINE;
use crate::session::AuthSession;

use super::user_path;

pub const CODE_LENGTH: usize = 6;

/// Keystrokes the code field refuses.
const REJECTED_KEYS: [char; 4] = ['.', ',', ' ', '-'];

/// Where to go after a successful verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    SignedIn,
    AccountInformation,
}

/// Ask the auth provider to text a code to `phone_number`.
pub async fn start_phone_sign_in(auth: &dyn AuthProvider, phone_number: &str) -> ChatResult<PendingVerification> {
    let pending = auth.sign_in_with_phone_number(phone_number.trim()).await?;
    info!("Verification requested for {}", pending.phone_number);
    Ok(pending)
}

/// Phone verification screen state.
#[derive(Debug, Clone)]
pub struct VerificationForm {
    pending: PendingVerification,
    code: String,
    error: Option<String>,
    loading: bool,
}

impl VerificationForm {
    pub fn new(pending: PendingVerification) -> Self {
        VerificationForm {
            pending,
            code: String::new(),
            error: None,
            loading: false,
        }
    }

    /// Take the field's new contents. Input ending in a rejected key is
    /// ignored; anything past six characters is cut.
    pub fn set_code(&mut self, input: &str) {
        if input.chars().last().map_or(false, |c| REJECTED_KEYS.contains(&c)) {
            return;
        }
        let code: String = input.chars().take(CODE_LENGTH).collect();
        if code != self.code {
            self.error = None;
        }
        self.code = code;
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn pending(&self) -> &PendingVerification {
        &self.pending
    }

    /// Confirm the code. Anything but six digits is refused locally.
    pub async fn verify(&mut self, auth: &dyn AuthProvider) -> ChatResult<AuthSession> {
        let digits = self.code.chars().filter(char::is_ascii_digit).count();
        if digits < CODE_LENGTH || digits != self.code.chars().count() {
            return Err(self.fail(ValidationError::CodeTooShort));
        }

        self.loading = true;
        let result = auth.confirm_code(&self.pending, &self.code).await;
        self.loading = false;

        match result {
            Ok(user) => {
                self.error = None;
                Ok(AuthSession::new(user))
            }
            Err(e) => {
                warn!("Verification for {} failed: {}", self.pending.phone_number, e);
                Err(self.fail(ValidationError::CodeRejected))
            }
        }
    }

    fn fail(&mut self, err: ValidationError) -> crate::error::ChatError {
        self.error = Some(err.to_string());
        err.into()
    }
}

/// Finish signing in. Accounts that already have a name go online and
/// register this device's notification token; new ones go to account setup.
pub async fn complete_sign_in(services: &Services, session: &AuthSession) -> ChatResult<NextStep> {
    if !session.has_display_name() {
        info!("{} has no display name yet", session.uid());
        return Ok(NextStep::AccountInformation);
    }

    let token = services.messaging.token().await?;
    let mut updates = Updates::new();
    updates.insert(status_path(session.uid()), Value::from(STATUS_ONLINE));
    updates.insert(
        path::join(&[&user_path(session.uid()), "tokenNotification"]),
        Value::from(token),
    );
    services.store.update(updates).await?;

    info!("{} signed in", session.uid());
    Ok(NextStep::SignedIn)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> VerificationForm {
        VerificationForm::new(PendingVerification {
            verification_id: "v1".to_string(),
            phone_number: "+62811".to_string(),
        })
    }

    #[test]
    fn test_code_input_filtering() {
        let mut form = form();
        form.set_code("12");
        form.set_code("12.");
        assert_eq!(form.code(), "12");
        form.set_code("12 ");
        form.set_code("12-");
        form.set_code("12,");
        assert_eq!(form.code(), "12");
        form.set_code("12345678");
        assert_eq!(form.code(), "123456");
    }

    #[test]
    fn test_editing_clears_error() {
        let mut form = form();
        form.error = Some("Verification code not valid!".to_string());
        form.set_code("1");
        assert!(form.error().is_none());
    }
}
