//! Authorization entry points used by the handlers.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use interviewsync_core::Identity;
use serde::{Deserialize, Serialize};

use crate::error::AuthResult;
use crate::lifecycle::{AuthMode, AuthorizedClient, TokenLifecycleManager};

/// Which token a request handler authorizes calendar calls with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthStrategy {
    /// One shared account for every caller.
    #[default]
    SingleAccount,
    /// The caller's own stored token.
    PerUser,
}

impl AuthStrategy {
    /// Returns the configuration name of the strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleAccount => "single-account",
            Self::PerUser => "per-user",
        }
    }
}

impl fmt::Display for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AuthStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single-account" | "single" => Ok(Self::SingleAccount),
            "per-user" | "user" => Ok(Self::PerUser),
            other => Err(format!(
                "unknown auth mode '{}', expected 'single-account' or 'per-user'",
                other
            )),
        }
    }
}

/// Hands out authorized calendar clients in either mode.
#[derive(Clone)]
pub struct Authorizer {
    lifecycle: Arc<TokenLifecycleManager>,
}

impl Authorizer {
    /// Creates an authorizer over a lifecycle manager.
    pub fn new(lifecycle: Arc<TokenLifecycleManager>) -> Self {
        Self { lifecycle }
    }

    /// Returns the underlying lifecycle manager.
    pub fn lifecycle(&self) -> &Arc<TokenLifecycleManager> {
        &self.lifecycle
    }

    /// Authorizes with the shared account token.
    pub async fn single_account(&self) -> AuthResult<AuthorizedClient> {
        self.lifecycle.ensure_authorized(AuthMode::SingleAccount).await
    }

    /// Authorizes with the token stored for `identity`.
    pub async fn for_user(&self, identity: &Identity) -> AuthResult<AuthorizedClient> {
        self.lifecycle
            .ensure_authorized(AuthMode::PerUser(identity))
            .await
    }

    /// Authorizes a request made by `identity` according to `strategy`.
    pub async fn authorize(
        &self,
        strategy: AuthStrategy,
        identity: &Identity,
    ) -> AuthResult<AuthorizedClient> {
        match strategy {
            AuthStrategy::SingleAccount => self.single_account().await,
            AuthStrategy::PerUser => self.for_user(identity).await,
        }
    }
}
