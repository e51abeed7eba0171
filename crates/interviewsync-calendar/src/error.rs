//! Error types for calendar access and sync.

use interviewsync_auth::{AuthError, AuthErrorCode};
use thiserror::Error;

/// An error from the calendar API or the interview sink.
#[derive(Debug, Error)]
pub enum CalendarError {
    /// Authorization failed before or during the API call.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The API answered with a non-success status.
    #[error("calendar API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The API could not be reached.
    #[error("network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The API answered with something that does not parse.
    #[error("invalid calendar response: {message}")]
    InvalidResponse { message: String },

    /// The interview could not be stored.
    #[error("failed to store interview: {message}")]
    Sink { message: String },
}

impl CalendarError {
    /// Creates an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error from a transport failure.
    pub fn network(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timeout".to_string()
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            format!("request failed: {}", err)
        };
        Self::Network {
            message,
            source: Some(err),
        }
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Creates a sink error.
    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink {
            message: message.into(),
        }
    }

    /// Returns the auth error code when the failure was an authorization one.
    pub fn auth_code(&self) -> Option<AuthErrorCode> {
        match self {
            Self::Auth(err) => Some(err.code()),
            _ => None,
        }
    }
}

/// A specialized Result type for calendar operations.
pub type CalendarResult<T> = Result<T, CalendarError>;
