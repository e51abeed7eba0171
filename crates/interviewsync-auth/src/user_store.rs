//! User credential store.
//!
//! User records are keyed by email. The token lifecycle manager reads the
//! per-user token blob from a record and writes refreshed tokens back with
//! [`UserStore::update`]. Concurrent updates to one user are not coordinated;
//! the last write wins.

use std::collections::BTreeMap;

use interviewsync_core::{BoxFuture, Identity, UserRecord};

use crate::error::AuthResult;

/// Point reads, field-merge updates and scans over user records.
pub trait UserStore: Send + Sync {
    /// Reads the record for `email`, or `None` if there is no such user.
    fn get<'a>(&'a self, email: &'a str) -> BoxFuture<'a, AuthResult<Option<UserRecord>>>;

    /// Merges `updates` into the existing record for `email`.
    ///
    /// Fails with `NotFound` if the record does not exist.
    fn update<'a>(
        &'a self,
        email: &'a str,
        updates: BTreeMap<String, String>,
    ) -> BoxFuture<'a, AuthResult<()>>;

    /// Records a login: writes the profile claims and `last_login`, creating
    /// the record if needed. Never touches the stored token.
    fn upsert_profile<'a>(
        &'a self,
        identity: &'a Identity,
        last_login: &'a str,
    ) -> BoxFuture<'a, AuthResult<()>>;

    /// Lists every registered user.
    fn scan(&self) -> BoxFuture<'_, AuthResult<Vec<UserRecord>>>;
}
