//! Token lifecycle manager.
//!
//! Loads the OAuth client credentials and a stored token, refreshes the
//! token when it is inside the expiry skew window, writes the refreshed token
//! back to the store it came from and hands out an [`AuthorizedClient`].
//!
//! Two storage modes exist:
//!
//! - **single account**: one shared token in the secret store, written by
//!   the operator bootstrap.
//! - **per user**: each user's token in the `googleToken` attribute of their
//!   user record, written by the out-of-band registration flow.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use interviewsync_core::{Credentials, Identity, Token, UserRecord};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{AuthError, AuthResult};
use crate::oauth::{CALENDAR_READONLY_SCOPE, OAuthProvider, PkceFlow};
use crate::secret_store::SecretStore;
use crate::user_store::UserStore;

/// Default secret parameter holding the OAuth client credentials.
pub const DEFAULT_CREDENTIALS_PARAM: &str = "/serverless-framework/deployment/google/credentials";
/// Default secret parameter holding the shared account token.
pub const DEFAULT_TOKEN_PARAM: &str = "/serverless-framework/deployment/google/token";

/// Where the lifecycle manager finds its secrets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Secret parameter with the client credentials JSON.
    pub credentials_param: String,
    /// Secret parameter with the shared account token JSON.
    pub token_param: String,
    /// Scopes requested by the consent URL.
    pub scopes: Vec<String>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            credentials_param: DEFAULT_CREDENTIALS_PARAM.to_string(),
            token_param: DEFAULT_TOKEN_PARAM.to_string(),
            scopes: vec![CALENDAR_READONLY_SCOPE.to_string()],
        }
    }
}

/// Observed state of a token during one authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Not loaded yet.
    Unknown,
    /// Loaded and outside the skew window.
    Valid,
    /// Loaded but inside the skew window (or without an expiry).
    Expiring,
    /// Replaced by a successful refresh and persisted.
    Refreshed,
    /// Nothing usable is stored.
    Missing,
}

impl TokenState {
    /// Classifies a loaded token at `now`.
    pub fn of(token: &Token, now: DateTime<Utc>) -> Self {
        if token.is_usable_at(now) {
            Self::Valid
        } else {
            Self::Expiring
        }
    }

    /// Returns the lowercase name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Valid => "valid",
            Self::Expiring => "expiring",
            Self::Refreshed => "refreshed",
            Self::Missing => "missing",
        }
    }
}

impl fmt::Display for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which token an authorization uses.
#[derive(Debug, Clone, Copy)]
pub enum AuthMode<'a> {
    /// The shared account token from the secret store.
    SingleAccount,
    /// The token stored on this user's record.
    PerUser(&'a Identity),
}

/// A usable token, ready to authorize downstream calendar calls.
#[derive(Debug, Clone)]
pub struct AuthorizedClient {
    token: Token,
    state: TokenState,
    email: Option<String>,
}

impl AuthorizedClient {
    /// Returns the access token.
    pub fn access_token(&self) -> &str {
        &self.token.access_token
    }

    /// Returns the full token set.
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Returns the state the token ended in (`Valid` or `Refreshed`).
    pub fn state(&self) -> TokenState {
        self.state
    }

    /// Returns the user this client acts for, or `None` for the shared account.
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns true if this authorization had to refresh the token.
    pub fn was_refreshed(&self) -> bool {
        self.state == TokenState::Refreshed
    }
}

/// Where a token was loaded from, so a refresh goes back to the same place.
#[derive(Debug, Clone, Copy)]
enum TokenSource<'a> {
    Secret(&'a str),
    User(&'a str),
}

impl fmt::Display for TokenSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Secret(name) => write!(f, "parameter {}", name),
            Self::User(email) => write!(f, "user {}", email),
        }
    }
}

/// Loads, validates, refreshes and persists OAuth tokens.
pub struct TokenLifecycleManager {
    secrets: Arc<dyn SecretStore>,
    users: Arc<dyn UserStore>,
    oauth: Arc<dyn OAuthProvider>,
    config: LifecycleConfig,
    credentials: OnceCell<Credentials>,
}

impl TokenLifecycleManager {
    /// Creates a manager over the given stores and provider.
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        users: Arc<dyn UserStore>,
        oauth: Arc<dyn OAuthProvider>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            secrets,
            users,
            oauth,
            config,
            credentials: OnceCell::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Returns the user store.
    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.users
    }

    /// Returns the OAuth client credentials, loading them on first use.
    ///
    /// A failed load is not cached; the next call tries again.
    pub async fn credentials(&self) -> AuthResult<&Credentials> {
        self.credentials
            .get_or_try_init(|| self.load_credentials())
            .await
    }

    async fn load_credentials(&self) -> AuthResult<Credentials> {
        let name = self.config.credentials_param.as_str();
        let blob = self.secrets.get(name).await.map_err(|e| match e {
            AuthError::NotFound { .. } => {
                AuthError::config(format!("OAuth client credentials parameter {} not found", name))
            }
            other => other,
        })?;

        let credentials = Credentials::from_json(&blob).map_err(AuthError::config)?;
        credentials.validate().map_err(AuthError::config)?;
        debug!(parameter = name, "loaded OAuth client credentials");
        Ok(credentials)
    }

    /// Builds the consent URL an operator visits to authorize the shared
    /// account.
    pub async fn authorization_url(&self, pkce: Option<&PkceFlow>) -> AuthResult<String> {
        let credentials = self.credentials().await?;
        Ok(self
            .oauth
            .authorization_url(credentials, &self.config.scopes, pkce))
    }

    /// Returns a usable client for `mode`, refreshing and persisting the
    /// stored token first if it is inside the skew window.
    ///
    /// # Errors
    ///
    /// - [`AuthError::AuthRequired`] if no shared token is stored.
    /// - [`AuthError::NoTokenForUser`] if the user has no stored token.
    /// - [`AuthError::RefreshFailed`] if the token needed a refresh and it
    ///   failed; the stored token is left as it was.
    /// - Store errors are passed through.
    pub async fn ensure_authorized(&self, mode: AuthMode<'_>) -> AuthResult<AuthorizedClient> {
        let credentials = self.credentials().await?;

        let (source, email) = match mode {
            AuthMode::SingleAccount => (TokenSource::Secret(&self.config.token_param), None),
            AuthMode::PerUser(identity) => (
                TokenSource::User(&identity.email),
                Some(identity.email.clone()),
            ),
        };

        let Some(token) = self.load_token(source).await? else {
            debug!(%source, state = %TokenState::Missing, "no usable token stored");
            return Err(match mode {
                AuthMode::SingleAccount => AuthError::auth_required(self.oauth.authorization_url(
                    credentials,
                    &self.config.scopes,
                    None,
                )),
                AuthMode::PerUser(identity) => AuthError::no_token_for_user(&identity.email),
            });
        };

        let state = TokenState::of(&token, Utc::now());
        debug!(%source, %state, expires_at = ?token.expires_at(), "loaded token");

        if state == TokenState::Valid {
            return Ok(AuthorizedClient {
                token,
                state,
                email,
            });
        }

        let refreshed = self.refresh(credentials, &token).await?;
        self.persist(source, &refreshed).await?;
        info!(%source, expires_at = ?refreshed.expires_at(), "refreshed and stored token");

        Ok(AuthorizedClient {
            token: refreshed,
            state: TokenState::Refreshed,
            email,
        })
    }

    /// Stores the shared account token, replacing any previous one.
    pub async fn store_single_account_token(&self, token: &Token) -> AuthResult<()> {
        self.persist(TokenSource::Secret(&self.config.token_param), token)
            .await
    }

    /// Exchanges an authorization code and stores the result as the shared
    /// account token.
    pub async fn exchange_and_store(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> AuthResult<Token> {
        let credentials = self.credentials().await?;
        let token = self
            .oauth
            .exchange_code(credentials, code, code_verifier)
            .await?;
        if token.refresh_token.is_none() {
            warn!("provider issued no refresh token, the stored token cannot be refreshed");
        }
        self.store_single_account_token(&token).await?;
        Ok(token)
    }

    async fn refresh(&self, credentials: &Credentials, token: &Token) -> AuthResult<Token> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthError::refresh_failed("stored token has no refresh token"))?;

        let response = self.oauth.refresh(credentials, refresh_token).await?;
        Ok(token.merge_refreshed(response))
    }

    async fn load_token(&self, source: TokenSource<'_>) -> AuthResult<Option<Token>> {
        let blob = match source {
            TokenSource::Secret(name) => match self.secrets.get(name).await {
                Ok(blob) => Some(blob),
                Err(AuthError::NotFound { .. }) => None,
                Err(e) => return Err(e),
            },
            TokenSource::User(email) => self
                .users
                .get(email)
                .await?
                .and_then(|record| record.token_blob().map(String::from)),
        };

        Ok(blob.and_then(|blob| match Token::from_json(&blob) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(%source, error = %e, "stored token does not parse, treating it as absent");
                None
            }
        }))
    }

    async fn persist(&self, source: TokenSource<'_>, token: &Token) -> AuthResult<()> {
        let json = token
            .to_json()
            .map_err(|e| AuthError::internal(format!("failed to serialize token: {}", e)))?;

        match source {
            TokenSource::Secret(name) => self.secrets.put(name, &json, true).await,
            TokenSource::User(email) => {
                let mut updates = BTreeMap::new();
                updates.insert(UserRecord::GOOGLE_TOKEN.to_string(), json);
                self.users.update(email, updates).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemorySecretStore, MemoryUserStore, StaticOAuthProvider};

    const CREDENTIALS: &str = r#"{"installed": {"client_id": "client-id",
        "client_secret": "secret", "redirect_uris": ["urn:ietf:wg:oauth:2.0:oob"]}}"#;

    struct Fixture {
        secrets: Arc<MemorySecretStore>,
        users: Arc<MemoryUserStore>,
        oauth: Arc<StaticOAuthProvider>,
        manager: TokenLifecycleManager,
    }

    fn fixture(secrets: MemorySecretStore, users: MemoryUserStore, oauth: StaticOAuthProvider) -> Fixture {
        let secrets = Arc::new(secrets.with_value(DEFAULT_CREDENTIALS_PARAM, CREDENTIALS));
        let users = Arc::new(users);
        let oauth = Arc::new(oauth);
        let manager = TokenLifecycleManager::new(
            secrets.clone(),
            users.clone(),
            oauth.clone(),
            LifecycleConfig::default(),
        );
        Fixture {
            secrets,
            users,
            oauth,
            manager,
        }
    }

    fn token_json(access: &str, expiry_offset_ms: i64) -> String {
        Token::new(
            access,
            Some("refresh-1".to_string()),
            Some(Utc::now().timestamp_millis() + expiry_offset_ms),
            Some(CALENDAR_READONLY_SCOPE.to_string()),
        )
        .to_json()
        .unwrap()
    }

    fn user_with_token(email: &str, blob: String) -> UserRecord {
        UserRecord::new(email).with_attribute(UserRecord::GOOGLE_TOKEN, blob)
    }

    #[tokio::test]
    async fn fresh_shared_token_is_used_unchanged() {
        let blob = token_json("original", 600_000);
        let f = fixture(
            MemorySecretStore::new().with_value(DEFAULT_TOKEN_PARAM, blob.clone()),
            MemoryUserStore::new(),
            StaticOAuthProvider::issuing("fresh"),
        );

        let client = f.manager.ensure_authorized(AuthMode::SingleAccount).await.unwrap();

        assert_eq!(client.access_token(), "original");
        assert_eq!(client.state(), TokenState::Valid);
        assert!(client.email().is_none());
        assert_eq!(f.oauth.refresh_count(), 0);
        assert_eq!(f.secrets.put_count(), 0);
        assert_eq!(f.secrets.value(DEFAULT_TOKEN_PARAM), Some(blob));
    }

    #[tokio::test]
    async fn expired_shared_token_is_refreshed_and_stored() {
        let f = fixture(
            MemorySecretStore::new().with_value(DEFAULT_TOKEN_PARAM, token_json("stale", -1000)),
            MemoryUserStore::new(),
            StaticOAuthProvider::issuing("fresh"),
        );

        let before = Utc::now().timestamp_millis();
        let client = f.manager.ensure_authorized(AuthMode::SingleAccount).await.unwrap();

        assert!(client.was_refreshed());
        assert_eq!(client.access_token(), "fresh");
        assert_eq!(f.oauth.refresh_count(), 1);
        assert_eq!(f.secrets.put_count(), 1);

        let stored = Token::from_json(&f.secrets.value(DEFAULT_TOKEN_PARAM).unwrap()).unwrap();
        assert_eq!(stored, *client.token());
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(stored.scope.as_deref(), Some(CALENDAR_READONLY_SCOPE));
        let expiry = stored.expiry_date.unwrap();
        assert!(expiry >= before + 3_600_000 && expiry <= before + 3_610_000);
    }

    #[tokio::test]
    async fn token_inside_skew_window_is_refreshed() {
        let f = fixture(
            MemorySecretStore::new().with_value(DEFAULT_TOKEN_PARAM, token_json("soon", 120_000)),
            MemoryUserStore::new(),
            StaticOAuthProvider::issuing("fresh"),
        );

        let client = f.manager.ensure_authorized(AuthMode::SingleAccount).await.unwrap();
        assert_eq!(client.access_token(), "fresh");
        assert_eq!(f.oauth.refresh_count(), 1);
    }

    #[tokio::test]
    async fn second_call_after_refresh_does_not_refresh_again() {
        let identity = Identity::new("ada@example.com");
        let f = fixture(
            MemorySecretStore::new(),
            MemoryUserStore::new().with_record(user_with_token("ada@example.com", token_json("stale", -1000))),
            StaticOAuthProvider::issuing("fresh"),
        );

        let first = f.manager.ensure_authorized(AuthMode::PerUser(&identity)).await.unwrap();
        let second = f.manager.ensure_authorized(AuthMode::PerUser(&identity)).await.unwrap();

        assert!(first.was_refreshed());
        assert_eq!(second.state(), TokenState::Valid);
        assert_eq!(second.access_token(), "fresh");
        assert_eq!(f.oauth.refresh_count(), 1);
        assert_eq!(f.users.update_count(), 1);
    }

    #[tokio::test]
    async fn per_user_refresh_writes_back_to_the_record() {
        let identity = Identity::new("ada@example.com");
        let f = fixture(
            MemorySecretStore::new(),
            MemoryUserStore::new().with_record(
                user_with_token("ada@example.com", token_json("stale", -1000))
                    .with_attribute(UserRecord::NAME, "Ada"),
            ),
            StaticOAuthProvider::issuing("fresh"),
        );

        let client = f.manager.ensure_authorized(AuthMode::PerUser(&identity)).await.unwrap();
        assert_eq!(client.email(), Some("ada@example.com"));

        let record = f.users.record("ada@example.com").unwrap();
        let stored = Token::from_json(record.token_blob().unwrap()).unwrap();
        assert_eq!(stored.access_token, "fresh");
        assert_eq!(record.get(UserRecord::NAME), Some("Ada"));
        assert_eq!(f.secrets.put_count(), 0);
    }

    #[tokio::test]
    async fn missing_user_token_is_no_token_for_user() {
        let identity = Identity::new("bob@example.com");
        let f = fixture(
            MemorySecretStore::new(),
            MemoryUserStore::new().with_record(UserRecord::new("bob@example.com")),
            StaticOAuthProvider::issuing("fresh"),
        );

        let err = f
            .manager
            .ensure_authorized(AuthMode::PerUser(&identity))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::NoTokenForUser { ref email } if email == "bob@example.com"));
        assert_eq!(f.users.update_count(), 0);
        assert_eq!(f.oauth.refresh_count(), 0);
    }

    #[tokio::test]
    async fn unknown_user_is_no_token_for_user() {
        let identity = Identity::new("ghost@example.com");
        let f = fixture(
            MemorySecretStore::new(),
            MemoryUserStore::new(),
            StaticOAuthProvider::issuing("fresh"),
        );

        let err = f
            .manager
            .ensure_authorized(AuthMode::PerUser(&identity))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NoTokenForUser { .. }));
    }

    #[tokio::test]
    async fn missing_shared_token_requires_authorization() {
        let f = fixture(
            MemorySecretStore::new(),
            MemoryUserStore::new(),
            StaticOAuthProvider::issuing("fresh"),
        );

        let err = f
            .manager
            .ensure_authorized(AuthMode::SingleAccount)
            .await
            .unwrap_err();

        match err {
            AuthError::AuthRequired { authorization_url } => {
                assert!(authorization_url.contains("client_id=client-id"));
                assert!(authorization_url.contains("access_type=offline"));
                assert!(authorization_url.contains("prompt=consent"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(f.secrets.put_count(), 0);
    }

    #[tokio::test]
    async fn refresh_failure_leaves_stored_token_untouched() {
        let blob = token_json("stale", -1000);
        let f = fixture(
            MemorySecretStore::new(),
            MemoryUserStore::new().with_record(user_with_token("ada@example.com", blob.clone())),
            StaticOAuthProvider::failing(),
        );
        let identity = Identity::new("ada@example.com");

        let err = f
            .manager
            .ensure_authorized(AuthMode::PerUser(&identity))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::RefreshFailed { .. }));
        assert_eq!(f.users.update_count(), 0);
        assert_eq!(f.users.record("ada@example.com").unwrap().token_blob(), Some(blob.as_str()));
    }

    #[tokio::test]
    async fn expired_token_without_refresh_token_fails() {
        let blob = Token::new("stale", None, Some(0), None).to_json().unwrap();
        let f = fixture(
            MemorySecretStore::new().with_value(DEFAULT_TOKEN_PARAM, blob),
            MemoryUserStore::new(),
            StaticOAuthProvider::issuing("fresh"),
        );

        let err = f
            .manager
            .ensure_authorized(AuthMode::SingleAccount)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::RefreshFailed { .. }));
        assert_eq!(f.oauth.refresh_count(), 0);
    }

    #[tokio::test]
    async fn unparseable_blob_is_treated_as_absent() {
        let f = fixture(
            MemorySecretStore::new(),
            MemoryUserStore::new().with_record(user_with_token("ada@example.com", "not json".to_string())),
            StaticOAuthProvider::issuing("fresh"),
        );
        let identity = Identity::new("ada@example.com");

        let err = f
            .manager
            .ensure_authorized(AuthMode::PerUser(&identity))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NoTokenForUser { .. }));
    }

    #[tokio::test]
    async fn store_access_error_propagates() {
        let f = fixture(
            MemorySecretStore::new(),
            MemoryUserStore::new(),
            StaticOAuthProvider::issuing("fresh"),
        );
        f.users.fail_with_access("throttled");
        let identity = Identity::new("ada@example.com");

        let err = f
            .manager
            .ensure_authorized(AuthMode::PerUser(&identity))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Access { .. }));
    }

    #[tokio::test]
    async fn failed_write_back_after_refresh_is_an_error() {
        let blob = token_json("stale", -1000);
        let f = fixture(
            MemorySecretStore::new().with_value(DEFAULT_TOKEN_PARAM, blob.clone()),
            MemoryUserStore::new(),
            StaticOAuthProvider::issuing("fresh"),
        );
        f.secrets.fail_writes_with_access("parameter store unavailable");

        let err = f
            .manager
            .ensure_authorized(AuthMode::SingleAccount)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Access { .. }));
        assert_eq!(f.oauth.refresh_count(), 1);
        assert_eq!(f.secrets.put_count(), 0);
        assert_eq!(f.secrets.value(DEFAULT_TOKEN_PARAM), Some(blob));
    }

    #[tokio::test]
    async fn failed_user_write_back_after_refresh_is_an_error() {
        let blob = token_json("stale", -1000);
        let f = fixture(
            MemorySecretStore::new(),
            MemoryUserStore::new().with_record(user_with_token("ada@example.com", blob.clone())),
            StaticOAuthProvider::issuing("fresh"),
        );
        f.users.fail_writes_with_access("throttled");
        let identity = Identity::new("ada@example.com");

        let err = f
            .manager
            .ensure_authorized(AuthMode::PerUser(&identity))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Access { .. }));
        assert_eq!(f.oauth.refresh_count(), 1);
        assert_eq!(f.users.update_count(), 0);
        assert_eq!(f.users.record("ada@example.com").unwrap().token_blob(), Some(blob.as_str()));
    }

    #[tokio::test]
    async fn missing_credentials_is_a_config_error() {
        let manager = TokenLifecycleManager::new(
            Arc::new(MemorySecretStore::new()),
            Arc::new(MemoryUserStore::new()),
            Arc::new(StaticOAuthProvider::issuing("fresh")),
            LifecycleConfig::default(),
        );

        let err = manager.credentials().await.unwrap_err();
        assert!(matches!(err, AuthError::Config { .. }));
        assert!(err.to_string().contains(DEFAULT_CREDENTIALS_PARAM));
    }

    #[tokio::test]
    async fn exchange_and_store_writes_shared_token() {
        let f = fixture(
            MemorySecretStore::new(),
            MemoryUserStore::new(),
            StaticOAuthProvider::issuing("first"),
        );

        let token = f.manager.exchange_and_store("4/code", Some("verifier")).await.unwrap();

        assert_eq!(token.refresh_token.as_deref(), Some("refresh-for-4/code"));
        assert_eq!(f.oauth.exchange_count(), 1);
        let stored = Token::from_json(&f.secrets.value(DEFAULT_TOKEN_PARAM).unwrap()).unwrap();
        assert_eq!(stored, token);

        let client = f.manager.ensure_authorized(AuthMode::SingleAccount).await.unwrap();
        assert_eq!(client.access_token(), "first");
    }
}
