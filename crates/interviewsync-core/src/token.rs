//! OAuth token model and expiry rules.
//!
//! Tokens are persisted as JSON using the field names written by Google's
//! client libraries (`expiry_date` in epoch milliseconds), so a token
//! bootstrapped by either side can be read by the other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Safety margin before the declared expiry during which a token is
/// treated as already expired (5 minutes).
pub const EXPIRY_SKEW_MS: i64 = 5 * 60 * 1000;

/// An OAuth token set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The access token for API requests.
    pub access_token: String,

    /// The refresh token for obtaining new access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Expiry of the access token, in milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,

    /// Space separated scopes granted to the token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Token type reported by the provider (usually `Bearer`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// OpenID Connect ID token, when the provider issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl Token {
    /// Creates a token with an absolute expiry.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expiry_date: Option<i64>,
        scope: Option<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expiry_date,
            scope,
            token_type: None,
            id_token: None,
        }
    }

    /// Creates a token from a provider response carrying a relative
    /// `expires_in` (seconds), anchored at `now`.
    pub fn from_expires_in(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scope: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let expiry_date = expires_in_secs.map(|secs| now.timestamp_millis() + secs * 1000);
        Self::new(access_token, refresh_token, expiry_date, scope)
    }

    /// Returns true if the token can be used at `now`.
    ///
    /// A token is usable only while its expiry is strictly later than
    /// `now + EXPIRY_SKEW_MS`. A token with no recorded expiry is not usable.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date
            .is_some_and(|expiry| expiry > now.timestamp_millis() + EXPIRY_SKEW_MS)
    }

    /// Returns true if the token can be used right now.
    pub fn is_usable(&self) -> bool {
        self.is_usable_at(Utc::now())
    }

    /// Returns the expiry as a timestamp, if known.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expiry_date.and_then(DateTime::from_timestamp_millis)
    }

    /// Combines a refresh response with the token it replaces.
    ///
    /// Providers usually omit the refresh token and sometimes the scope on
    /// refresh; those are carried over from `self`.
    pub fn merge_refreshed(&self, refreshed: Token) -> Token {
        Token {
            refresh_token: refreshed.refresh_token.or_else(|| self.refresh_token.clone()),
            scope: refreshed.scope.or_else(|| self.scope.clone()),
            ..refreshed
        }
    }

    /// Parses a token from its stored JSON form.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Serializes the token to its stored JSON form.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
