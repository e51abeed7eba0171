//! OAuth provider client for the calendar integration.
//!
//! Two grants are used:
//!
//! - **refresh_token**: programmatic, called by the token lifecycle manager
//!   whenever a stored token is inside the expiry skew window.
//! - **authorization_code**: interactive, used once by an operator (or by the
//!   out-of-band registration flow) to obtain the first token. The consent
//!   URL always asks for offline access so a refresh token is issued.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use interviewsync_core::{BoxFuture, Credentials, Token};
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{AuthError, AuthResult};

/// Google OAuth endpoints.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Read-only calendar scope.
pub const CALENDAR_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// Operations against the OAuth provider.
pub trait OAuthProvider: Send + Sync {
    /// Exchanges a refresh token for a new access token.
    ///
    /// Any failure, including transport errors, is reported as
    /// [`AuthError::RefreshFailed`].
    fn refresh<'a>(
        &'a self,
        credentials: &'a Credentials,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, AuthResult<Token>>;

    /// Exchanges an authorization code for a token set.
    fn exchange_code<'a>(
        &'a self,
        credentials: &'a Credentials,
        code: &'a str,
        code_verifier: Option<&'a str>,
    ) -> BoxFuture<'a, AuthResult<Token>>;

    /// Builds the consent URL for an interactive authorization.
    fn authorization_url(
        &self,
        credentials: &Credentials,
        scopes: &[String],
        pkce: Option<&PkceFlow>,
    ) -> String;
}

/// OAuth client for Google's token endpoint.
#[derive(Debug, Clone)]
pub struct GoogleOAuthClient {
    http_client: reqwest::Client,
    auth_url: String,
    token_url: String,
}

impl GoogleOAuthClient {
    /// Creates a client using Google's production endpoints.
    pub fn new(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
        }
    }

    /// Overrides the endpoints.
    pub fn with_endpoints(mut self, auth_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into();
        self.token_url = token_url.into();
        self
    }

    /// Posts a grant to the token endpoint and returns the raw status and body.
    async fn post_grant(&self, params: &[(&str, &str)]) -> Result<(reqwest::StatusCode, String), reqwest::Error> {
        let response = self
            .http_client
            .post(&self.token_url)
            .form(params)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    async fn do_refresh(&self, credentials: &Credentials, refresh_token: &str) -> AuthResult<Token> {
        let params = [
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let (status, body) = self
            .post_grant(&params)
            .await
            .map_err(|e| AuthError::refresh_failed_with("token refresh request failed", e))?;

        if !status.is_success() {
            return Err(AuthError::refresh_failed(format!(
                "provider rejected refresh ({}): {}",
                status, body
            )));
        }

        let response: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::refresh_failed_with("invalid token response", e))?;

        info!("refreshed access token");
        Ok(response.into_token())
    }

    async fn do_exchange(
        &self,
        credentials: &Credentials,
        code: &str,
        code_verifier: Option<&str>,
    ) -> AuthResult<Token> {
        let mut params = vec![
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", credentials.redirect_uri.as_str()),
        ];
        if let Some(verifier) = code_verifier {
            params.push(("code_verifier", verifier));
        }

        let (status, body) = self
            .post_grant(&params)
            .await
            .map_err(|e| AuthError::exchange_failed(format!("token exchange request failed: {}", e)))?;

        if !status.is_success() {
            return Err(AuthError::exchange_failed(format!(
                "provider rejected code ({}): {}",
                status, body
            )));
        }

        let response: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::exchange_failed(format!("invalid token response: {}", e)))?;

        if response.refresh_token.is_none() {
            debug!("code exchange returned no refresh token");
        }
        info!("obtained tokens from authorization code");
        Ok(response.into_token())
    }
}

impl OAuthProvider for GoogleOAuthClient {
    fn refresh<'a>(
        &'a self,
        credentials: &'a Credentials,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, AuthResult<Token>> {
        Box::pin(self.do_refresh(credentials, refresh_token))
    }

    fn exchange_code<'a>(
        &'a self,
        credentials: &'a Credentials,
        code: &'a str,
        code_verifier: Option<&'a str>,
    ) -> BoxFuture<'a, AuthResult<Token>> {
        Box::pin(self.do_exchange(credentials, code, code_verifier))
    }

    fn authorization_url(
        &self,
        credentials: &Credentials,
        scopes: &[String],
        pkce: Option<&PkceFlow>,
    ) -> String {
        build_authorization_url(&self.auth_url, credentials, scopes, pkce)
    }
}

/// Builds a consent URL requesting offline access.
///
/// `prompt=consent` forces Google to issue a refresh token even when the
/// account already granted access.
pub fn build_authorization_url(
    auth_url: &str,
    credentials: &Credentials,
    scopes: &[String],
    pkce: Option<&PkceFlow>,
) -> String {
    let scope = scopes.join(" ");
    let mut url = format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
        access_type=offline&prompt=consent",
        auth_url,
        urlencoding::encode(&credentials.client_id),
        urlencoding::encode(&credentials.redirect_uri),
        urlencoding::encode(&scope),
    );
    if let Some(pkce) = pkce {
        url.push_str(&format!(
            "&code_challenge={}&code_challenge_method=S256&state={}",
            urlencoding::encode(&pkce.challenge),
            urlencoding::encode(&pkce.state),
        ));
    }
    url
}

/// PKCE flow state (RFC 7636) for the interactive bootstrap.
#[derive(Debug)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 hash of verifier, base64url encoded).
    pub challenge: String,
    /// Random state for CSRF protection.
    pub state: String,
}

impl PkceFlow {
    /// Creates a new PKCE flow with random verifier and state.
    pub fn new() -> Self {
        let verifier = random_urlsafe(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
            state: random_urlsafe(16),
        }
    }

    /// Computes the SHA-256 challenge for a code verifier.
    fn compute_challenge(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_urlsafe(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

impl TokenResponse {
    fn into_token(self) -> Token {
        let mut token = Token::from_expires_in(
            self.access_token,
            self.refresh_token,
            self.expires_in,
            self.scope,
            Utc::now(),
        );
        token.token_type = self.token_type;
        token.id_token = self.id_token;
        token
    }
}
