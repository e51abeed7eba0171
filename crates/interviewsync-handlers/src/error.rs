//! Error types for the handlers and the CLI.

use interviewsync_auth::{AuthError, AuthErrorCode};
use interviewsync_calendar::CalendarError;
use thiserror::Error;

/// Result type for CLI operations.
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Errors that end a CLI command.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed request or response JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Authorization error.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Calendar or sink error.
    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

/// HTTP status for an auth failure.
pub fn auth_status(code: AuthErrorCode) -> u16 {
    match code {
        AuthErrorCode::MissingCredential | AuthErrorCode::InvalidCredential => 401,
        AuthErrorCode::NoTokenForUser => 403,
        AuthErrorCode::NotFound => 404,
        AuthErrorCode::RefreshFailed => 502,
        AuthErrorCode::AuthRequired => 503,
        AuthErrorCode::Access
        | AuthErrorCode::ExchangeFailed
        | AuthErrorCode::Configuration
        | AuthErrorCode::Internal => 500,
    }
}

/// HTTP status for a calendar sync failure.
pub fn calendar_status(err: &CalendarError) -> u16 {
    err.auth_code().map_or(500, auth_status)
}
