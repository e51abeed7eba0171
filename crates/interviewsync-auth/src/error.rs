//! Error types for token lifecycle and identity operations.
//!
//! Every failure the auth layer surfaces maps to one [`AuthErrorCode`], which
//! the request handlers translate into a user-facing status. Nothing in this
//! crate retries.

use std::fmt;

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The category of an auth error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorCode {
    /// A store or provider could not be reached, or access was denied.
    Access,
    /// A requested record or parameter does not exist.
    NotFound,
    /// The user has no stored calendar token.
    NoTokenForUser,
    /// The shared account has no token; an operator must re-authorize.
    AuthRequired,
    /// The OAuth provider rejected the refresh.
    RefreshFailed,
    /// The authorization code exchange failed.
    ExchangeFailed,
    /// The bearer credential is malformed, expired, or for another audience.
    InvalidCredential,
    /// No bearer credential was presented.
    MissingCredential,
    /// Missing or invalid configuration.
    Configuration,
    /// Unexpected internal state.
    Internal,
}

impl AuthErrorCode {
    /// Returns a stable name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access_error",
            Self::NotFound => "not_found",
            Self::NoTokenForUser => "no_token_for_user",
            Self::AuthRequired => "auth_required",
            Self::RefreshFailed => "refresh_failed",
            Self::ExchangeFailed => "exchange_failed",
            Self::InvalidCredential => "invalid_credential",
            Self::MissingCredential => "missing_credential",
            Self::Configuration => "configuration_error",
            Self::Internal => "internal_error",
        }
    }

    /// Returns true if the condition needs a registration or re-authorization
    /// rather than being a plain failure.
    pub fn needs_authorization(&self) -> bool {
        matches!(self, Self::NoTokenForUser | Self::AuthRequired)
    }
}

impl fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error from the auth layer.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Store unreachable or denied.
    #[error("access error: {message}")]
    Access {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Missing record or parameter.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// No stored token for the given user.
    #[error("no calendar token stored for {email}")]
    NoTokenForUser { email: String },

    /// The shared account token is missing.
    #[error("calendar authorization required, an operator must visit {authorization_url}")]
    AuthRequired { authorization_url: String },

    /// Refresh was rejected or could not be performed.
    #[error("token refresh failed: {message}")]
    RefreshFailed {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Authorization code exchange failed.
    #[error("token exchange failed: {message}")]
    ExchangeFailed { message: String },

    /// Bad bearer credential.
    #[error("invalid credential: {message}")]
    InvalidCredential { message: String },

    /// No bearer credential presented.
    #[error("bearer credential is required")]
    MissingCredential,

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Internal error.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl AuthError {
    /// Creates an access error.
    pub fn access(message: impl Into<String>) -> Self {
        Self::Access {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an access error with its underlying cause.
    pub fn access_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Access {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates a no-token-for-user error.
    pub fn no_token_for_user(email: impl Into<String>) -> Self {
        Self::NoTokenForUser {
            email: email.into(),
        }
    }

    /// Creates an auth-required error carrying the URL an operator must visit.
    pub fn auth_required(authorization_url: impl Into<String>) -> Self {
        Self::AuthRequired {
            authorization_url: authorization_url.into(),
        }
    }

    /// Creates a refresh failure.
    pub fn refresh_failed(message: impl Into<String>) -> Self {
        Self::RefreshFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a refresh failure with its underlying cause.
    pub fn refresh_failed_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::RefreshFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an exchange failure.
    pub fn exchange_failed(message: impl Into<String>) -> Self {
        Self::ExchangeFailed {
            message: message.into(),
        }
    }

    /// Creates an invalid credential error.
    pub fn invalid_credential(message: impl Into<String>) -> Self {
        Self::InvalidCredential {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the error code.
    pub fn code(&self) -> AuthErrorCode {
        match self {
            Self::Access { .. } => AuthErrorCode::Access,
            Self::NotFound { .. } => AuthErrorCode::NotFound,
            Self::NoTokenForUser { .. } => AuthErrorCode::NoTokenForUser,
            Self::AuthRequired { .. } => AuthErrorCode::AuthRequired,
            Self::RefreshFailed { .. } => AuthErrorCode::RefreshFailed,
            Self::ExchangeFailed { .. } => AuthErrorCode::ExchangeFailed,
            Self::InvalidCredential { .. } => AuthErrorCode::InvalidCredential,
            Self::MissingCredential => AuthErrorCode::MissingCredential,
            Self::Config { .. } => AuthErrorCode::Configuration,
            Self::Internal { .. } => AuthErrorCode::Internal,
        }
    }
}

/// A specialized Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;
