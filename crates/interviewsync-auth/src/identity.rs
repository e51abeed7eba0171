//! Bearer credential extraction and identity verification.
//!
//! The signature check is delegated to Google's `tokeninfo` endpoint. The
//! verifier then checks the claims itself: audience, expiry, issuer and the
//! presence of an email.

use chrono::Utc;
use interviewsync_core::{BoxFuture, Identity};
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::{AuthError, AuthResult};

/// Google's ID token introspection endpoint.
pub const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Verifies a bearer credential and returns the caller's identity.
pub trait IdentityVerifier: Send + Sync {
    /// Fails with [`AuthError::InvalidCredential`] if the credential is
    /// malformed, expired, or issued for another audience.
    fn verify<'a>(&'a self, bearer: &'a str) -> BoxFuture<'a, AuthResult<Identity>>;
}

/// Picks the bearer credential out of a request.
///
/// A `token` field in the JSON body wins over the `Authorization` header.
/// The header value may carry a `Bearer ` prefix (any case). Empty values
/// count as absent.
pub fn extract_bearer(body: Option<&str>, authorization: Option<&str>) -> Option<String> {
    let from_body = body
        .and_then(|body| serde_json::from_str::<serde_json::Value>(body).ok())
        .and_then(|value| value.get("token")?.as_str().map(str::to_string))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    from_body.or_else(|| {
        let value = authorization?.trim();
        let token = match value.get(..7) {
            Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => &value[7..],
            _ => value,
        };
        let token = token.trim();
        (!token.is_empty()).then(|| token.to_string())
    })
}

/// Verifies Google ID tokens through the `tokeninfo` endpoint.
#[derive(Debug, Clone)]
pub struct GoogleIdentityVerifier {
    http_client: reqwest::Client,
    client_id: String,
    tokeninfo_url: String,
}

impl GoogleIdentityVerifier {
    /// Creates a verifier accepting tokens issued for `client_id`.
    pub fn new(http_client: reqwest::Client, client_id: impl Into<String>) -> Self {
        Self {
            http_client,
            client_id: client_id.into(),
            tokeninfo_url: GOOGLE_TOKENINFO_URL.to_string(),
        }
    }

    /// Overrides the tokeninfo endpoint.
    pub fn with_tokeninfo_url(mut self, url: impl Into<String>) -> Self {
        self.tokeninfo_url = url.into();
        self
    }

    async fn do_verify(&self, bearer: &str) -> AuthResult<Identity> {
        if bearer.is_empty() {
            return Err(AuthError::MissingCredential);
        }

        let response = self
            .http_client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", bearer)])
            .send()
            .await
            .map_err(|e| AuthError::access_with("identity provider unreachable", e))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AuthError::access(format!(
                "identity provider returned {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(AuthError::invalid_credential("token rejected by identity provider"));
        }

        let claims: TokenInfo = response
            .json()
            .await
            .map_err(|e| AuthError::invalid_credential(format!("unreadable token claims: {}", e)))?;

        let identity = claims.validate(&self.client_id, Utc::now().timestamp())?;
        debug!(email = %identity.email, "verified identity");
        Ok(identity)
    }
}

impl IdentityVerifier for GoogleIdentityVerifier {
    fn verify<'a>(&'a self, bearer: &'a str) -> BoxFuture<'a, AuthResult<Identity>> {
        Box::pin(self.do_verify(bearer))
    }
}

/// Claims returned by `tokeninfo`. Numeric claims arrive as strings.
#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: Option<String>,
    iss: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    exp: Option<i64>,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl TokenInfo {
    fn validate(self, client_id: &str, now_secs: i64) -> AuthResult<Identity> {
        if self.aud.as_deref() != Some(client_id) {
            return Err(AuthError::invalid_credential("audience mismatch"));
        }
        if !self
            .iss
            .as_deref()
            .is_some_and(|iss| GOOGLE_ISSUERS.contains(&iss))
        {
            return Err(AuthError::invalid_credential("unexpected issuer"));
        }
        if !self.exp.is_some_and(|exp| exp > now_secs) {
            return Err(AuthError::invalid_credential("token expired"));
        }
        let email = self
            .email
            .filter(|email| !email.is_empty())
            .ok_or_else(|| AuthError::invalid_credential("token carries no email"))?;

        Ok(Identity {
            email,
            name: self.name,
            picture: self.picture,
        })
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(s)) => s.parse().ok(),
        None => None,
    })
}
