//! Verified caller identity.

use serde::{Deserialize, Serialize};

/// Identity claims extracted from a verified bearer credential.
///
/// The email is the lookup key into the user record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// The caller's email address.
    pub email: String,
    /// Display name, when the provider supplied one.
    #[serde(default)]
    pub name: Option<String>,
    /// Profile picture URL, when the provider supplied one.
    #[serde(default)]
    pub picture: Option<String>,
}

impl Identity {
    /// Creates an identity with only an email.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            picture: None,
        }
    }

    /// Builder method to set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder method to set the picture URL.
    pub fn with_picture(mut self, picture: impl Into<String>) -> Self {
        self.picture = Some(picture.into());
        self
    }
}
