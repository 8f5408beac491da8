pub mod account;
pub mod backend;
pub mod chat;
pub mod error;
pub mod models;
pub mod session;

pub use error::{BackendError, ChatError, ChatResult, ValidationError};
pub use models::*;
pub use session::AuthSession;
