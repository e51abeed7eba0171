//! Process-wide dependencies shared by every handler.

use std::sync::Arc;

use interviewsync_auth::{
    AuthStrategy, Authorizer, IdentityVerifier, OAuthProvider, SecretStore, TokenLifecycleManager,
    UserStore,
};
use interviewsync_calendar::{EventSync, InterviewSink};

use crate::config::AppConfig;
use crate::envelope::CorsPolicy;
use crate::error::{HandlerError, HandlerResult};

/// The external collaborators a deployment is wired to.
pub struct Backends {
    /// Secret parameter store.
    pub secrets: Arc<dyn SecretStore>,
    /// User record store.
    pub users: Arc<dyn UserStore>,
    /// OAuth token endpoint.
    pub oauth: Arc<dyn OAuthProvider>,
    /// ID token verifier.
    pub verifier: Arc<dyn IdentityVerifier>,
    /// Where synced interviews go.
    pub sink: Arc<dyn InterviewSink>,
    /// Client for calendar API calls.
    pub http_client: reqwest::Client,
}

/// Dependencies built once per process and shared by every request.
pub struct AppState {
    pub(crate) verifier: Arc<dyn IdentityVerifier>,
    pub(crate) users: Arc<dyn UserStore>,
    pub(crate) authorizer: Authorizer,
    pub(crate) sync: EventSync,
    pub(crate) cors: CorsPolicy,
    pub(crate) auth_mode: AuthStrategy,
}

impl AppState {
    /// Wires the handlers to `backends`.
    pub fn new(config: &AppConfig, backends: Backends) -> Self {
        let lifecycle = TokenLifecycleManager::new(
            backends.secrets,
            backends.users.clone(),
            backends.oauth,
            config.lifecycle(),
        );
        Self {
            verifier: backends.verifier,
            users: backends.users,
            authorizer: Authorizer::new(Arc::new(lifecycle)),
            sync: EventSync::new(backends.http_client, backends.sink),
            cors: CorsPolicy::new(&config.cors_allow_origin),
            auth_mode: config.auth_mode,
        }
    }

    /// Builder method to redirect calendar calls, for tests and local runs.
    pub fn with_calendar_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.sync = self.sync.with_calendar_base_url(base_url);
        self
    }

    /// Returns the token lifecycle manager.
    pub fn lifecycle(&self) -> &TokenLifecycleManager {
        self.authorizer.lifecycle()
    }

    /// Wires the handlers to SSM, DynamoDB and Google.
    #[cfg(feature = "aws")]
    pub async fn from_aws(config: &AppConfig) -> HandlerResult<Self> {
        use interviewsync_auth::aws::{DynamoUserStore, SsmSecretStore, load_sdk_config};
        use interviewsync_auth::{GoogleIdentityVerifier, GoogleOAuthClient};
        use interviewsync_calendar::aws::DynamoInterviewSink;

        config.validate().map_err(HandlerError::Config)?;
        let http_client = http_client(config)?;
        let sdk = load_sdk_config().await;

        let backends = Backends {
            secrets: Arc::new(SsmSecretStore::from_conf(&sdk)),
            users: Arc::new(DynamoUserStore::from_conf(&sdk, &config.users_table)),
            oauth: Arc::new(GoogleOAuthClient::new(http_client.clone())),
            verifier: Arc::new(GoogleIdentityVerifier::new(
                http_client.clone(),
                &config.google_client_id,
            )),
            sink: Arc::new(DynamoInterviewSink::from_conf(&sdk, &config.interviews_table)),
            http_client,
        };
        Ok(Self::new(config, backends))
    }

    /// Always fails: this build has no store backends.
    #[cfg(not(feature = "aws"))]
    pub async fn from_aws(_config: &AppConfig) -> HandlerResult<Self> {
        Err(HandlerError::Config(
            "interviewsync was built without the aws feature".to_string(),
        ))
    }
}

/// Builds the shared outbound HTTP client.
pub fn http_client(config: &AppConfig) -> HandlerResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.http_timeout())
        .build()
        .map_err(|e| HandlerError::Config(format!("failed to create HTTP client: {}", e)))
}
