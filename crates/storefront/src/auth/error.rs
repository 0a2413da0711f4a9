//! Authentication error types.

use thiserror::Error;

use crate::api::ApiError;

/// Fallback message when the backend rejects a login without explaining why.
pub const INVALID_LOGIN_MESSAGE: &str = "Invalid email or password. Please try again.";

/// Fallback message when the backend rejects a registration without explaining why.
pub const INVALID_REGISTRATION_MESSAGE: &str = "Registration failed. Please check your details.";

/// Message shown for failures that a retry may fix.
pub const NETWORK_MESSAGE: &str = "Network error. Please try again.";

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The backend rejected the submitted credentials or registration fields.
    ///
    /// `message` is the backend's explanation when it gave one.
    #[error("invalid credentials: {message}")]
    InvalidCredentials { message: String },

    /// A required form field was empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The request did not complete or the backend failed.
    #[error("network error: {0}")]
    Network(#[source] ApiError),

    /// The action needs a session and none is stored.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Registration succeeded but the backend issued no tokens (e.g. email verification pending).
    #[error("account created without a session")]
    SessionNotIssued,
}

impl AuthError {
    /// Message suitable for an inline form error.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCredentials { message } => message.clone(),
            Self::MissingField(field) => format!("The {field} field is required."),
            Self::Network(_) => NETWORK_MESSAGE.to_string(),
            Self::NotAuthenticated => "Please sign in to continue.".to_string(),
            Self::SessionNotIssued => "Account created. Please sign in.".to_string(),
        }
    }

    /// Whether resubmitting the same form may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Classify a failed login or registration call.
    ///
    /// Client errors (4xx) are credential problems; everything else is a
    /// network failure. `fields` lists form fields whose first validation
    /// message should be preferred over the generic `detail`.
    pub(crate) fn from_submission(err: ApiError, fields: &[&str], fallback: &str) -> Self {
        if !err.is_client_error() {
            return Self::Network(err);
        }

        let message = fields
            .iter()
            .find_map(|field| err.field_error(field))
            .or_else(|| err.detail())
            .unwrap_or(fallback)
            .to_string();

        Self::InvalidCredentials { message }
    }
}
