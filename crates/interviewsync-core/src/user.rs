//! User records as stored in the user table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::identity::Identity;

/// A user record: the email key plus flat string attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// The record key.
    pub email: String,
    /// Scalar attributes stored alongside the key.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl UserRecord {
    /// Attribute holding the display name.
    pub const NAME: &'static str = "name";
    /// Attribute holding the profile picture URL.
    pub const PICTURE: &'static str = "picture";
    /// Attribute holding the last login timestamp (RFC 3339).
    pub const LAST_LOGIN: &'static str = "lastLogin";
    /// Attribute holding the user's serialized calendar OAuth token.
    pub const GOOGLE_TOKEN: &'static str = "googleToken";

    /// Creates an empty record for the given email.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder method to set an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Returns an attribute value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Merges scalar field updates into the record, overwriting existing keys.
    pub fn merge(&mut self, updates: &BTreeMap<String, String>) {
        for (key, value) in updates {
            self.attributes.insert(key.clone(), value.clone());
        }
    }

    /// Returns the stored token blob, if any.
    pub fn token_blob(&self) -> Option<&str> {
        self.get(Self::GOOGLE_TOKEN)
    }

    /// Returns the public profile view of this record.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            email: self.email.clone(),
            name: self.get(Self::NAME).map(String::from),
            picture: self.get(Self::PICTURE).map(String::from),
            last_login: self.get(Self::LAST_LOGIN).map(String::from),
        }
    }

    /// Field updates written by a login.
    pub fn profile_updates(identity: &Identity, last_login: &str) -> BTreeMap<String, String> {
        let mut updates = BTreeMap::new();
        if let Some(ref name) = identity.name {
            updates.insert(Self::NAME.to_string(), name.clone());
        }
        if let Some(ref picture) = identity.picture {
            updates.insert(Self::PICTURE.to_string(), picture.clone());
        }
        updates.insert(Self::LAST_LOGIN.to_string(), last_login.to_string());
        updates
    }
}

/// The user fields returned to clients. Never includes the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: Option<String>,
    /// Profile picture URL.
    pub picture: Option<String>,
    /// Last login timestamp.
    pub last_login: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overwrites_and_adds() {
        let mut record = UserRecord::new("a@example.com")
            .with_attribute(UserRecord::NAME, "Old")
            .with_attribute(UserRecord::GOOGLE_TOKEN, "{}");
        let mut updates = BTreeMap::new();
        updates.insert(UserRecord::NAME.to_string(), "New".to_string());
        updates.insert(UserRecord::LAST_LOGIN.to_string(), "2024-01-01T00:00:00Z".to_string());
        record.merge(&updates);

        assert_eq!(record.get(UserRecord::NAME), Some("New"));
        assert_eq!(record.get(UserRecord::LAST_LOGIN), Some("2024-01-01T00:00:00Z"));
        assert_eq!(record.token_blob(), Some("{}"));
    }

    #[test]
    fn profile_hides_token() {
        let record = UserRecord::new("a@example.com")
            .with_attribute(UserRecord::PICTURE, "https://pic")
            .with_attribute(UserRecord::GOOGLE_TOKEN, "secret");
        let json = serde_json::to_value(record.profile()).unwrap();
        assert_eq!(json["email"], "a@example.com");
        assert_eq!(json["picture"], "https://pic");
        assert!(json["lastLogin"].is_null());
        assert!(!json.to_string().contains("secret"));
    }

    #[test]
    fn profile_updates_skip_missing_claims() {
        let identity = Identity::new("a@example.com").with_name("Ada");
        let updates = UserRecord::profile_updates(&identity, "now");
        assert_eq!(updates.get(UserRecord::NAME).map(String::as_str), Some("Ada"));
        assert!(!updates.contains_key(UserRecord::PICTURE));
        assert!(!updates.contains_key(UserRecord::GOOGLE_TOKEN));
        assert_eq!(updates.get(UserRecord::LAST_LOGIN).map(String::as_str), Some("now"));
    }
}
