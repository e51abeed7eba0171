//! Secret store client.
//!
//! Named secret blobs (OAuth client credentials, the shared account token)
//! live in an external encrypted parameter store. Implementations report a
//! missing parameter as [`AuthError::NotFound`] and any other failure as
//! [`AuthError::Access`]; they never retry.
//!
//! [`AuthError::NotFound`]: crate::AuthError::NotFound
//! [`AuthError::Access`]: crate::AuthError::Access

use interviewsync_core::BoxFuture;

use crate::error::AuthResult;

/// Read/write access to named secret parameters.
pub trait SecretStore: Send + Sync {
    /// Reads the parameter `name`, decrypted.
    fn get<'a>(&'a self, name: &'a str) -> BoxFuture<'a, AuthResult<String>>;

    /// Writes `value` to the parameter `name`, replacing any previous value.
    ///
    /// `secure` requests encryption at rest.
    fn put<'a>(
        &'a self,
        name: &'a str,
        value: &'a str,
        secure: bool,
    ) -> BoxFuture<'a, AuthResult<()>>;
}
