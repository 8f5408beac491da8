use thiserror::Error;

/// Input problems caught before any remote call. The display strings are
/// shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Name cannot be null!")]
    EmptyName,

    #[error("Verification code not valid!")]
    CodeTooShort,

    #[error("Invalid verification code!")]
    CodeRejected,
}

/// Failures reported by the backend collaborators.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid path: '{0}'")]
    InvalidPath(String),

    #[error("update paths overlap: '{0}' and '{1}'")]
    OverlappingPaths(String, String),

    #[error("no user is signed in")]
    NotSignedIn,

    #[error("unknown verification id: {0}")]
    UnknownVerification(String),

    #[error("verification code rejected")]
    VerificationRejected,

    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Backend(BackendError::Serialization(err))
    }
}

impl ChatError {
    /// The message a screen should show, if the error is one the user can fix.
    pub fn user_message(&self) -> Option<String> {
        match self {
            ChatError::Validation(err) => Some(err.to_string()),
            ChatError::Backend(_) => None,
        }
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
pub type BackendResult<T> = Result<T, BackendError>;
