//! Calendar to interview sync.
//!
//! Reads the next day of calendar events matching a free-text query and
//! creates one interview per event through an [`InterviewSink`].

use std::sync::Arc;

use chrono::{Duration, Utc};
use interviewsync_auth::{AuthorizedClient, Authorizer};
use interviewsync_core::Identity;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::client::{CALENDAR_API_BASE, CalendarClient};
use crate::error::{CalendarError, CalendarResult};
use crate::mapping::interview_from_event;
use crate::sink::InterviewSink;

/// Free-text query selecting interview events.
pub const SYNC_QUERY: &str = "interview";
/// Calendar read by the sync.
pub const PRIMARY_CALENDAR: &str = "primary";

/// What to read from the calendar.
#[derive(Debug, Clone)]
struct SyncOptions {
    calendar_id: String,
    query: String,
    window: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            calendar_id: PRIMARY_CALENDAR.to_string(),
            query: SYNC_QUERY.to_string(),
            window: Duration::days(1),
        }
    }
}

/// Result of syncing one user's calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// The owner of the created interviews.
    pub owner: String,
    /// Ids of the created interviews.
    pub created: Vec<String>,
}

impl SyncReport {
    /// Number of interviews created.
    pub fn count(&self) -> usize {
        self.created.len()
    }
}

/// Outcome message for a user whose token could not be loaded or refreshed.
pub const NO_VALID_TOKEN_MESSAGE: &str = "No valid Google token for user";
/// Outcome message for a user whose events could not be read or stored.
pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch events";

/// Per-user result of a sync over all users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSyncOutcome {
    /// The user.
    pub email: String,
    /// Number of interviews created, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synced: Option<usize>,
    /// What went wrong, on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Syncs calendar events into interviews.
pub struct EventSync {
    http_client: reqwest::Client,
    sink: Arc<dyn InterviewSink>,
    options: SyncOptions,
    calendar_base_url: String,
}

impl EventSync {
    /// Creates a sync writing to `sink`.
    pub fn new(http_client: reqwest::Client, sink: Arc<dyn InterviewSink>) -> Self {
        Self {
            http_client,
            sink,
            options: SyncOptions::default(),
            calendar_base_url: CALENDAR_API_BASE.to_string(),
        }
    }

    /// Overrides the calendar API base URL.
    pub fn with_calendar_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.calendar_base_url = base_url.into();
        self
    }

    /// Reads upcoming interview events with `authorized` and creates an
    /// interview for each one, owned by `owner_email`.
    ///
    /// All or nothing: when a create fails, the interviews already created
    /// in this call are deleted again before the error is returned.
    #[instrument(skip(self, authorized), fields(refreshed = authorized.was_refreshed()))]
    pub async fn sync_user(
        &self,
        authorized: &AuthorizedClient,
        owner_email: &str,
    ) -> CalendarResult<SyncReport> {
        let client = CalendarClient::new(self.http_client.clone(), authorized)
            .with_base_url(&self.calendar_base_url);

        let now = Utc::now();
        let events = client
            .list_events(
                &self.options.calendar_id,
                now,
                now + self.options.window,
                Some(&self.options.query),
            )
            .await?;

        let drafts: Vec<_> = events
            .iter()
            .filter_map(|event| interview_from_event(event, owner_email))
            .collect();

        let mut created = Vec::with_capacity(drafts.len());
        for draft in &drafts {
            match self.sink.create(draft).await {
                Ok(id) => created.push(id),
                Err(e) => {
                    self.roll_back(&created).await;
                    return Err(e);
                }
            }
        }

        info!(count = created.len(), "synced calendar events");
        Ok(SyncReport {
            owner: owner_email.to_string(),
            created,
        })
    }

    async fn roll_back(&self, created: &[String]) {
        for id in created.iter().rev() {
            if let Err(e) = self.sink.delete(id).await {
                error!(id = %id, error = %e, "failed to roll back interview");
            }
        }
        if !created.is_empty() {
            warn!(count = created.len(), "rolled back partially synced interviews");
        }
    }

    /// Syncs every registered user with their own stored token.
    ///
    /// A failure for one user is recorded in its outcome as a fixed message
    /// and does not stop the others; the detail only goes to the log. Only a
    /// failure to list the users fails the whole call.
    pub async fn sync_all_users(
        &self,
        authorizer: &Authorizer,
    ) -> CalendarResult<Vec<UserSyncOutcome>> {
        let users = authorizer.lifecycle().users().scan().await?;
        let mut outcomes = Vec::with_capacity(users.len());

        for user in users {
            let identity = Identity::new(user.email.clone());
            let result = match authorizer.for_user(&identity).await {
                Ok(authorized) => self
                    .sync_user(&authorized, &identity.email)
                    .await
                    .map_err(|e| (outcome_message(&e), e)),
                Err(e) => Err((NO_VALID_TOKEN_MESSAGE, e.into())),
            };

            outcomes.push(match result {
                Ok(report) => UserSyncOutcome {
                    email: user.email,
                    synced: Some(report.count()),
                    error: None,
                },
                Err((message, e)) => {
                    error!(email = %user.email, error = %e, "calendar sync failed");
                    UserSyncOutcome {
                        email: user.email,
                        synced: None,
                        error: Some(message.to_string()),
                    }
                }
            });
        }

        Ok(outcomes)
    }
}

fn outcome_message(err: &CalendarError) -> &'static str {
    match err {
        CalendarError::Auth(_) => NO_VALID_TOKEN_MESSAGE,
        _ => FETCH_FAILED_MESSAGE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemoryInterviewSink;
    use interviewsync_auth::testing::{MemorySecretStore, MemoryUserStore, StaticOAuthProvider};
    use interviewsync_auth::{AuthMode, LifecycleConfig, TokenLifecycleManager};
    use interviewsync_core::{Token, UserRecord};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CREDENTIALS: &str =
        r#"{"client_id": "id", "client_secret": "s", "redirect_uri": "http://localhost"}"#;

    fn token(access: &str, expiry_offset_ms: i64) -> String {
        Token::new(
            access,
            Some("r".to_string()),
            Some(Utc::now().timestamp_millis() + expiry_offset_ms),
            None,
        )
        .to_json()
        .unwrap()
    }

    fn authorizer(users: MemoryUserStore) -> Authorizer {
        let config = LifecycleConfig::default();
        let secrets = MemorySecretStore::new()
            .with_value(&config.credentials_param, CREDENTIALS)
            .with_value(&config.token_param, token("shared", 3_600_000));
        Authorizer::new(Arc::new(TokenLifecycleManager::new(
            Arc::new(secrets),
            Arc::new(users),
            Arc::new(StaticOAuthProvider::issuing("refreshed")),
            config,
        )))
    }

    async fn calendar_with_one_interview() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .and(query_param("q", "interview"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{
                    "id": "e1",
                    "summary": "Interview",
                    "start": {"dateTime": "2024-03-15T10:00:00Z"},
                    "organizer": {"displayName": "Acme"},
                    "attendees": [{"email": "bob@acme.com", "displayName": "Bob"}]
                }]
            })))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn sync_user_creates_owned_interviews() {
        let server = calendar_with_one_interview().await;
        let sink = Arc::new(MemoryInterviewSink::new());
        let sync = EventSync::new(reqwest::Client::new(), sink.clone())
            .with_calendar_base_url(server.uri());
        let authorized = authorizer(MemoryUserStore::new())
            .single_account()
            .await
            .unwrap();

        let report = sync.sync_user(&authorized, "ada@example.com").await.unwrap();

        assert_eq!(report.count(), 1);
        let drafts = sink.created_for("ada@example.com");
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].company, "Acme");
        assert_eq!(drafts[0].interviewers[0].email, "bob@acme.com");
    }

    #[tokio::test]
    async fn sync_all_users_records_each_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer refreshed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"id": "1", "start": {"date": "2024-03-15"}},
                    {"id": "2", "start": {"date": "2024-03-16"}}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer ada-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"id": "3", "start": {"date": "2024-03-15"}}]
            })))
            .mount(&server)
            .await;

        let users = MemoryUserStore::new()
            .with_record(
                UserRecord::new("ada@example.com")
                    .with_attribute(UserRecord::GOOGLE_TOKEN, token("ada-token", 3_600_000)),
            )
            .with_record(UserRecord::new("bob@example.com"))
            .with_record(
                UserRecord::new("carol@example.com")
                    .with_attribute(UserRecord::GOOGLE_TOKEN, token("stale", -1000)),
            );
        let authorizer = authorizer(users);
        let sink = Arc::new(MemoryInterviewSink::new());
        let sync = EventSync::new(reqwest::Client::new(), sink.clone())
            .with_calendar_base_url(server.uri());

        let outcomes = sync.sync_all_users(&authorizer).await.unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].email, "ada@example.com");
        assert_eq!(outcomes[0].synced, Some(1));
        assert_eq!(outcomes[1].email, "bob@example.com");
        assert_eq!(outcomes[1].synced, None);
        assert_eq!(outcomes[1].error.as_deref(), Some(NO_VALID_TOKEN_MESSAGE));
        assert_eq!(outcomes[2].synced, Some(2));
        assert_eq!(sink.created_for("carol@example.com").len(), 2);

        let json = serde_json::to_value(&outcomes[0]).unwrap();
        assert_eq!(json, serde_json::json!({"email": "ada@example.com", "synced": 1}));

        // carol's refreshed token was written back
        let carol = Identity::new("carol@example.com");
        let again = authorizer
            .lifecycle()
            .ensure_authorized(AuthMode::PerUser(&carol))
            .await
            .unwrap();
        assert!(!again.was_refreshed());
        assert_eq!(again.access_token(), "refreshed");
    }

    #[tokio::test]
    async fn failed_create_rolls_back_the_user_sync() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"id": "1", "summary": "Interview A", "start": {"date": "2024-03-15"}},
                    {"id": "2", "summary": "Interview B", "start": {"date": "2024-03-16"}}
                ]
            })))
            .mount(&server)
            .await;
        let sink = Arc::new(MemoryInterviewSink::failing_after(1));
        let sync = EventSync::new(reqwest::Client::new(), sink.clone())
            .with_calendar_base_url(server.uri());
        let authorized = authorizer(MemoryUserStore::new())
            .single_account()
            .await
            .unwrap();

        let err = sync
            .sync_user(&authorized, "ada@example.com")
            .await
            .unwrap_err();

        assert!(matches!(err, CalendarError::Sink { .. }));
        assert!(sink.created().is_empty());
    }

    #[tokio::test]
    async fn outcome_errors_hide_provider_detail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend-detail-xyz"))
            .mount(&server)
            .await;

        let config = LifecycleConfig::default();
        let secrets = MemorySecretStore::new().with_value(&config.credentials_param, CREDENTIALS);
        let users = MemoryUserStore::new()
            .with_record(
                UserRecord::new("ada@example.com")
                    .with_attribute(UserRecord::GOOGLE_TOKEN, token("stale", -1000)),
            )
            .with_record(
                UserRecord::new("bob@example.com")
                    .with_attribute(UserRecord::GOOGLE_TOKEN, token("bob-token", 3_600_000)),
            );
        let authorizer = Authorizer::new(Arc::new(TokenLifecycleManager::new(
            Arc::new(secrets),
            Arc::new(users),
            Arc::new(StaticOAuthProvider::failing()),
            config,
        )));
        let sync = EventSync::new(reqwest::Client::new(), Arc::new(MemoryInterviewSink::new()))
            .with_calendar_base_url(server.uri());

        let outcomes = sync.sync_all_users(&authorizer).await.unwrap();

        let json = serde_json::to_value(&outcomes).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"email": "ada@example.com", "error": "No valid Google token for user"},
                {"email": "bob@example.com", "error": "Failed to fetch events"}
            ])
        );
        assert!(!json.to_string().contains("xyz"));
        assert!(!json.to_string().contains("invalid_grant"));
    }
}
