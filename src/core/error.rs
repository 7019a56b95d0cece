//! User-facing failure classes

use super::rates::FetchError;

pub const CONNECTION_ERROR_MESSAGE: &str =
    "connection error, please check your internet connection.";
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Every failure the conversion service can hit. The `Display` form is the
/// message shown to the user.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error("{}", CONNECTION_ERROR_MESSAGE)]
    Connectivity,

    #[error("error: exchange rate not found.")]
    RateNotFound { from: String, to: String },

    #[error("error: {}", .0.as_deref().unwrap_or(UNKNOWN_ERROR))]
    Unknown(Option<String>),
}

impl ServiceError {
    pub fn unknown(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            ServiceError::Unknown(None)
        } else {
            ServiceError::Unknown(Some(message))
        }
    }
}

impl From<FetchError> for ServiceError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Network(_) => ServiceError::Connectivity,
            FetchError::Provider(None) => ServiceError::Unknown(None),
            other => ServiceError::unknown(other.to_string()),
        }
    }
}
