//! OAuth client credentials.

use serde::Deserialize;

/// OAuth 2.0 client configuration for the calendar integration.
///
/// Loaded once from the secret store and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// The OAuth 2.0 client ID from Google Cloud Console.
    pub client_id: String,
    /// The OAuth 2.0 client secret from Google Cloud Console.
    pub client_secret: String,
    /// The redirect URI registered for the client.
    pub redirect_uri: String,
}

/// Structure of Google's OAuth credentials JSON document.
///
/// Supports the console download (`installed` or `web` section with a list
/// of redirect URIs) and a flat document with a single `redirect_uri`.
#[derive(Debug, Deserialize)]
struct CredentialsDocument {
    installed: Option<NestedCredentials>,
    web: Option<NestedCredentials>,
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedCredentials {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl Credentials {
    /// Creates new credentials.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
        }
    }

    /// Parses credentials from a Google credentials JSON string.
    ///
    /// The first entry of `redirect_uris` is used as the redirect URI.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let doc: CredentialsDocument = serde_json::from_str(json)
            .map_err(|e| format!("failed to parse credentials JSON: {}", e))?;

        if let Some(nested) = doc.installed.or(doc.web) {
            let redirect_uri = nested
                .redirect_uris
                .into_iter()
                .next()
                .ok_or_else(|| "credentials contain no redirect_uris".to_string())?;
            return Ok(Self::new(nested.client_id, nested.client_secret, redirect_uri));
        }

        match (doc.client_id, doc.client_secret, doc.redirect_uri) {
            (Some(id), Some(secret), Some(redirect)) => Ok(Self::new(id, secret, redirect)),
            _ => Err("credentials must contain an 'installed'/'web' section or \
                 'client_id'/'client_secret'/'redirect_uri' at root level"
                .to_string()),
        }
    }

    /// Checks that every field is present.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.is_empty() {
            return Err("client_id is required");
        }
        if self.client_secret.is_empty() {
            return Err("client_secret is required");
        }
        if self.redirect_uri.is_empty() {
            return Err("redirect_uri is required");
        }
        Ok(())
    }
}
