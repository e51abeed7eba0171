//! OAuth token lifecycle and identity verification for the calendar
//! integration.
//!
//! - [`secret_store`] and [`user_store`]: where credentials and tokens live
//! - [`oauth`]: the provider's token endpoint (refresh, code exchange, PKCE)
//! - [`lifecycle`]: load, validate, refresh and persist tokens
//! - [`authorizer`]: single-account and per-user entry points
//! - [`identity`]: bearer extraction and ID token verification
//!
//! AWS backends are available behind the `aws` feature.

pub mod authorizer;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod oauth;
pub mod secret_store;
pub mod user_store;

#[cfg(feature = "aws")]
pub mod aws;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use authorizer::{AuthStrategy, Authorizer};
pub use error::{AuthError, AuthErrorCode, AuthResult};
pub use identity::{GoogleIdentityVerifier, IdentityVerifier, extract_bearer};
pub use lifecycle::{
    AuthMode, AuthorizedClient, LifecycleConfig, TokenLifecycleManager, TokenState,
};
pub use oauth::{GoogleOAuthClient, OAuthProvider, PkceFlow};
pub use secret_store::SecretStore;
pub use user_store::UserStore;
