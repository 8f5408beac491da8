use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single chat message as seen by the local view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub text: String,
    /// Server-assigned epoch milliseconds.
    pub timestamp: i64,
}

/// Stored shape of a message under `messages/{owner}/{peer}/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message: String,
    pub time: Value,
    pub from: String,
}

impl MessageRecord {
    pub fn into_message(self, id: &str) -> Option<Message> {
        let timestamp = self.time.as_i64()?;
        Some(Message {
            id: id.to_string(),
            sender_id: self.from,
            text: self.message,
            timestamp,
        })
    }
}

pub const STATUS_ONLINE: &str = "Online";

/// Value stored at `users/{uid}/status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserStatus {
    Online,
    /// Last seen, epoch milliseconds.
    LastSeen(i64),
    /// Anything else, including a deleted status (`null`).
    Other(String),
}

impl UserStatus {
    /// Every stored value maps to a status; values that are neither the
    /// online literal nor a time become `Other`.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) if s == STATUS_ONLINE => UserStatus::Online,
            Value::String(s) => match s.trim().parse::<i64>() {
                Ok(ms) => UserStatus::LastSeen(ms),
                Err(_) => UserStatus::Other(s.clone()),
            },
            Value::Number(n) => match n.as_i64() {
                Some(ms) => UserStatus::LastSeen(ms),
                None => n
                    .as_f64()
                    .map(|ms| UserStatus::LastSeen(ms as i64))
                    .unwrap_or_else(|| UserStatus::Other(n.to_string())),
            },
            other => UserStatus::Other(other.to_string()),
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, UserStatus::Online)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Profile record stored at `users/{uid}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_notification: Option<String>,
}

impl Profile {
    pub fn status(&self) -> Option<UserStatus> {
        self.status.as_ref().map(UserStatus::from_value)
    }
}

/// The authenticated account as the auth provider knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub phone_number: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub email: Option<String>,
}

/// Fields of the auth profile a client may change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthProfileUpdate {
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

/// What the chat screen is opened with.
#[derive(Debug, Clone, PartialEq)]
pub struct UserSummary {
    pub uid: String,
    pub name: String,
    pub photo: Option<String>,
    pub status: Option<UserStatus>,
}

impl UserSummary {
    pub fn from_profile(uid: &str, profile: &Profile) -> Self {
        UserSummary {
            uid: uid.to_string(),
            name: profile.name.clone().unwrap_or_else(|| uid.to_string()),
            photo: profile.photo.clone(),
            status: profile.status(),
        }
    }
}
