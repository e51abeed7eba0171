//! In-memory stores and a scripted OAuth provider.
//!
//! Test doubles for the unit tests of this workspace, compiled under `cfg(test)`
//! or the `test-util` feature. Every store counts its writes so tests can
//! assert that an operation did (or did not) persist anything, and can be
//! told to fail writes while reads keep working.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use interviewsync_core::{BoxFuture, Credentials, Identity, Token, UserRecord};

use crate::error::{AuthError, AuthResult};
use crate::oauth::{GOOGLE_AUTH_URL, OAuthProvider, PkceFlow, build_authorization_url};
use crate::secret_store::SecretStore;
use crate::user_store::UserStore;

/// A secret store backed by a hash map.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    values: RwLock<HashMap<String, String>>,
    puts: AtomicUsize,
    fail_puts: Mutex<Option<String>>,
}

impl MemorySecretStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to seed a parameter without counting it as a write.
    pub fn with_value(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.into(), value.into());
        self
    }

    /// Returns the current value of a parameter.
    pub fn value(&self, name: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    /// Number of successful `put` calls so far.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Makes every subsequent `put` fail with an access error. Reads still work.
    pub fn fail_writes_with_access(&self, message: impl Into<String>) {
        *self.fail_puts.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.into());
    }
}

impl SecretStore for MemorySecretStore {
    fn get<'a>(&'a self, name: &'a str) -> BoxFuture<'a, AuthResult<String>> {
        Box::pin(async move {
            self.value(name)
                .ok_or_else(|| AuthError::not_found(format!("parameter {}", name)))
        })
    }

    fn put<'a>(
        &'a self,
        name: &'a str,
        value: &'a str,
        _secure: bool,
    ) -> BoxFuture<'a, AuthResult<()>> {
        Box::pin(async move {
            check(&self.fail_puts)?;
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.values
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .insert(name.to_string(), value.to_string());
            Ok(())
        })
    }
}

/// A user store backed by a hash map keyed by email.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    records: RwLock<HashMap<String, UserRecord>>,
    updates: AtomicUsize,
    fail_with_access: Mutex<Option<String>>,
    fail_writes: Mutex<Option<String>>,
}

impl MemoryUserStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to seed a record without counting it as a write.
    pub fn with_record(self, record: UserRecord) -> Self {
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(record.email.clone(), record);
        self
    }

    /// Makes every subsequent call fail with an access error.
    pub fn fail_with_access(&self, message: impl Into<String>) {
        *self.fail_with_access.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.into());
    }

    /// Makes every subsequent write fail with an access error. Reads still work.
    pub fn fail_writes_with_access(&self, message: impl Into<String>) {
        *self.fail_writes.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.into());
    }

    /// Returns a copy of the record for `email`.
    pub fn record(&self, email: &str) -> Option<UserRecord> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(email)
            .cloned()
    }

    /// Number of writes (`update` and `upsert_profile`) so far.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    fn check_access(&self) -> AuthResult<()> {
        check(&self.fail_with_access)
    }

    fn check_write(&self) -> AuthResult<()> {
        self.check_access()?;
        check(&self.fail_writes)
    }
}

fn check(failure: &Mutex<Option<String>>) -> AuthResult<()> {
    match failure.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
        Some(message) => Err(AuthError::access(message.clone())),
        None => Ok(()),
    }
}

impl UserStore for MemoryUserStore {
    fn get<'a>(&'a self, email: &'a str) -> BoxFuture<'a, AuthResult<Option<UserRecord>>> {
        Box::pin(async move {
            self.check_access()?;
            Ok(self.record(email))
        })
    }

    fn update<'a>(
        &'a self,
        email: &'a str,
        updates: BTreeMap<String, String>,
    ) -> BoxFuture<'a, AuthResult<()>> {
        Box::pin(async move {
            self.check_write()?;
            let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
            let record = records
                .get_mut(email)
                .ok_or_else(|| AuthError::not_found(format!("user {}", email)))?;
            record.merge(&updates);
            self.updates.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn upsert_profile<'a>(
        &'a self,
        identity: &'a Identity,
        last_login: &'a str,
    ) -> BoxFuture<'a, AuthResult<()>> {
        Box::pin(async move {
            self.check_write()?;
            let updates = UserRecord::profile_updates(identity, last_login);
            let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
            records
                .entry(identity.email.clone())
                .or_insert_with(|| UserRecord::new(identity.email.clone()))
                .merge(&updates);
            self.updates.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn scan(&self) -> BoxFuture<'_, AuthResult<Vec<UserRecord>>> {
        Box::pin(async move {
            self.check_access()?;
            let mut records: Vec<UserRecord> = self
                .records
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .values()
                .cloned()
                .collect();
            records.sort_by(|a, b| a.email.cmp(&b.email));
            Ok(records)
        })
    }
}

/// An OAuth provider that answers refreshes from a script.
///
/// Each refresh returns a token valid for one hour and counts the call.
/// [`StaticOAuthProvider::failing`] rejects every refresh instead.
#[derive(Debug, Default)]
pub struct StaticOAuthProvider {
    refreshes: AtomicUsize,
    exchanges: AtomicUsize,
    fail: bool,
    access_token: String,
}

impl StaticOAuthProvider {
    /// A provider whose refreshes succeed with `access_token`.
    pub fn issuing(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Self::default()
        }
    }

    /// A provider whose refreshes are always rejected.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Number of refresh calls so far.
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Number of code exchanges so far.
    pub fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    fn issue(&self, refresh_token: Option<String>) -> Token {
        Token::from_expires_in(
            self.access_token.clone(),
            refresh_token,
            Some(3600),
            None,
            chrono::Utc::now(),
        )
    }
}

impl OAuthProvider for StaticOAuthProvider {
    fn refresh<'a>(
        &'a self,
        _credentials: &'a Credentials,
        _refresh_token: &'a str,
    ) -> BoxFuture<'a, AuthResult<Token>> {
        Box::pin(async move {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AuthError::refresh_failed("invalid_grant"));
            }
            Ok(self.issue(None))
        })
    }

    fn exchange_code<'a>(
        &'a self,
        _credentials: &'a Credentials,
        code: &'a str,
        _code_verifier: Option<&'a str>,
    ) -> BoxFuture<'a, AuthResult<Token>> {
        Box::pin(async move {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AuthError::exchange_failed("invalid_grant"));
            }
            Ok(self.issue(Some(format!("refresh-for-{}", code))))
        })
    }

    fn authorization_url(
        &self,
        credentials: &Credentials,
        scopes: &[String],
        pkce: Option<&PkceFlow>,
    ) -> String {
        build_authorization_url(GOOGLE_AUTH_URL, credentials, scopes, pkce)
    }
}
