//! Application configuration.
//!
//! Settings come from an optional `config.toml`, then environment variables
//! override individual keys. The deployed functions are configured from the
//! environment only.

use std::path::Path;
use std::time::Duration;

use interviewsync_auth::lifecycle::{DEFAULT_CREDENTIALS_PARAM, DEFAULT_TOKEN_PARAM};
use interviewsync_auth::{AuthStrategy, LifecycleConfig};
use serde::{Deserialize, Serialize};

/// Environment variables read by [`AppConfig::apply_env`].
pub const ENV_USERS_TABLE: &str = "USERS_TABLE";
pub const ENV_TABLE_NAME: &str = "TABLE_NAME";
pub const ENV_GOOGLE_CLIENT_ID: &str = "GOOGLE_CLIENT_ID";
pub const ENV_CREDENTIALS_PARAM: &str = "GOOGLE_CREDENTIALS_PARAM";
pub const ENV_TOKEN_PARAM: &str = "GOOGLE_TOKEN_PARAM";
pub const ENV_CORS_ALLOW_ORIGIN: &str = "CORS_ALLOW_ORIGIN";
pub const ENV_AUTH_MODE: &str = "AUTH_MODE";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";

/// Configuration for the handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Table holding user records.
    pub users_table: String,

    /// Table holding interviews.
    pub interviews_table: String,

    /// OAuth client id that ID tokens must be issued for.
    pub google_client_id: String,

    /// Secret parameter with the OAuth client credentials.
    pub credentials_param: String,

    /// Secret parameter with the shared account token.
    pub token_param: String,

    /// Value of `Access-Control-Allow-Origin`.
    pub cors_allow_origin: String,

    /// Which token the sync handler uses.
    pub auth_mode: AuthStrategy,

    /// Timeout for outbound HTTP requests, in seconds.
    pub http_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            users_table: String::new(),
            interviews_table: String::new(),
            google_client_id: String::new(),
            credentials_param: DEFAULT_CREDENTIALS_PARAM.to_string(),
            token_param: DEFAULT_TOKEN_PARAM.to_string(),
            cors_allow_origin: "http://localhost:5173".to_string(),
            auth_mode: AuthStrategy::default(),
            http_timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Loads the file at `path` (if any), then applies the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, String> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("failed to read config: {}", e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Overrides settings from environment variables found by `lookup`.
    /// Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_USERS_TABLE) {
            self.users_table = v;
        }
        if let Some(v) = get(ENV_TABLE_NAME) {
            self.interviews_table = v;
        }
        if let Some(v) = get(ENV_GOOGLE_CLIENT_ID) {
            self.google_client_id = v;
        }
        if let Some(v) = get(ENV_CREDENTIALS_PARAM) {
            self.credentials_param = v;
        }
        if let Some(v) = get(ENV_TOKEN_PARAM) {
            self.token_param = v;
        }
        if let Some(v) = get(ENV_CORS_ALLOW_ORIGIN) {
            self.cors_allow_origin = v;
        }
        if let Some(v) = get(ENV_AUTH_MODE) {
            self.auth_mode = v.parse()?;
        }
        if let Some(v) = get(ENV_HTTP_TIMEOUT_SECS) {
            self.http_timeout_secs = v
                .trim()
                .parse()
                .map_err(|_| format!("{} must be a number of seconds, got '{}'", ENV_HTTP_TIMEOUT_SECS, v))?;
        }
        Ok(())
    }

    /// Checks the settings every handler needs.
    pub fn validate(&self) -> Result<(), String> {
        if self.users_table.is_empty() {
            return Err(format!("users table is required (set {})", ENV_USERS_TABLE));
        }
        if self.interviews_table.is_empty() {
            return Err(format!("interviews table is required (set {})", ENV_TABLE_NAME));
        }
        if self.google_client_id.is_empty() {
            return Err(format!("Google client id is required (set {})", ENV_GOOGLE_CLIENT_ID));
        }
        if self.http_timeout_secs == 0 {
            return Err("http_timeout_secs must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Returns the outbound HTTP timeout.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Returns the token lifecycle settings.
    pub fn lifecycle(&self) -> LifecycleConfig {
        LifecycleConfig {
            credentials_param: self.credentials_param.clone(),
            token_param: self.token_param.clone(),
            ..LifecycleConfig::default()
        }
    }
}
