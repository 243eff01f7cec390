use thiserror::Error;

use medicare_types::validate::ValidationError;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Your session has expired. Please sign in again.")]
    Unauthorized,

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Local storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed data: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("You are not signed in.")]
    NotSignedIn,

    #[error("No patient is assigned to this caretaker yet.")]
    NoPatient,

    #[error("Another change is still being saved.")]
    Busy,

    #[error("No medication is being edited.")]
    NotEditing,
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Unauthorized => Some(401),
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
