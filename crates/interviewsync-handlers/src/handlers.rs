//! Request handlers.
//!
//! Every handler returns a [`Response`]; failures become JSON error bodies
//! with a status derived from the error code. Nothing here retries.

use chrono::{SecondsFormat, Utc};
use interviewsync_auth::{AuthError, extract_bearer};
use interviewsync_calendar::CalendarError;
use interviewsync_core::Identity;
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::envelope::{Request, Response};
use crate::error::{auth_status, calendar_status};
use crate::state::AppState;

/// The handlers that can be invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Route {
    /// Verify the ID token and record the login.
    Login,
    /// Return the caller's profile.
    User,
    /// Sync the caller's upcoming interviews.
    Sync,
    /// Sync every registered user with their own token.
    SyncAll,
    /// CORS preflight.
    Preflight,
}

/// Runs the handler for `route`.
pub async fn dispatch(state: &AppState, route: Route, request: &Request) -> Response {
    match route {
        Route::Login => login(state, request).await,
        Route::User => get_user(state, request).await,
        Route::Sync => sync_events(state, request).await,
        Route::SyncAll => sync_all_users(state).await,
        Route::Preflight => preflight(state),
    }
}

/// Verifies the caller's ID token and records the login.
///
/// A missing credential is a 400 here rather than a 401.
#[instrument(skip_all)]
pub async fn login(state: &AppState, request: &Request) -> Response {
    let Some(bearer) = bearer(request) else {
        return Response::error(400, "Token is required", &state.cors);
    };

    let identity = match state.verifier.verify(&bearer).await {
        Ok(identity) => identity,
        Err(e) => return auth_error(state, &e),
    };

    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    if let Err(e) = state.users.upsert_profile(&identity, &now).await {
        error!(email = %identity.email, error = %e, "failed to record login");
        return auth_error(state, &e);
    }

    info!(email = %identity.email, "user logged in");
    Response::json(
        200,
        &json!({
            "message": "Successfully authenticated",
            "user": {
                "email": identity.email,
                "name": identity.name,
                "picture": identity.picture,
            },
            "token": bearer,
        }),
        &state.cors,
    )
}

/// Returns the stored profile of the caller.
///
/// Like login, a missing credential is a 400.
#[instrument(skip_all)]
pub async fn get_user(state: &AppState, request: &Request) -> Response {
    let Some(bearer) = bearer(request) else {
        return Response::error(400, "Token is required", &state.cors);
    };

    let identity = match state.verifier.verify(&bearer).await {
        Ok(identity) => identity,
        Err(e) => return auth_error(state, &e),
    };

    match state.users.get(&identity.email).await {
        Ok(Some(record)) => Response::json(200, &json!({ "user": record.profile() }), &state.cors),
        Ok(None) => Response::error(404, "User not found", &state.cors),
        Err(e) => auth_error(state, &e),
    }
}

/// Syncs the caller's upcoming interview events into interviews.
#[instrument(skip_all, fields(mode = %state.auth_mode))]
pub async fn sync_events(state: &AppState, request: &Request) -> Response {
    let identity = match verified_identity(state, request).await {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let authorized = match state.authorizer.authorize(state.auth_mode, &identity).await {
        Ok(authorized) => authorized,
        Err(e) => return auth_error(state, &e),
    };

    match state.sync.sync_user(&authorized, &identity.email).await {
        Ok(report) => Response::json(
            200,
            &json!({
                "message": "Calendar events synced successfully",
                "synced": report.count(),
            }),
            &state.cors,
        ),
        Err(CalendarError::Auth(e)) => auth_error(state, &e),
        Err(e) => {
            error!(email = %identity.email, error = %e, "calendar sync failed");
            Response::error(calendar_status(&e), "Failed to sync calendar events", &state.cors)
        }
    }
}

/// Syncs every registered user with their own stored token.
#[instrument(skip_all)]
pub async fn sync_all_users(state: &AppState) -> Response {
    match state.sync.sync_all_users(&state.authorizer).await {
        Ok(results) => {
            let failed = results.iter().filter(|r| r.error.is_some()).count();
            info!(users = results.len(), failed, "synced all users");
            Response::json(200, &json!({ "results": results }), &state.cors)
        }
        Err(e) => {
            error!(error = %e, "failed to sync all users");
            Response::error(
                calendar_status(&e),
                "Failed to sync calendar events for all users",
                &state.cors,
            )
        }
    }
}

/// Answers a CORS preflight.
pub fn preflight(state: &AppState) -> Response {
    Response::empty(200, &state.cors)
}

fn bearer(request: &Request) -> Option<String> {
    extract_bearer(request.body.as_deref(), request.header_value("Authorization"))
}

async fn verified_identity(state: &AppState, request: &Request) -> Result<Identity, Response> {
    let bearer = bearer(request).ok_or_else(|| auth_error(state, &AuthError::MissingCredential))?;
    state
        .verifier
        .verify(&bearer)
        .await
        .map_err(|e| auth_error(state, &e))
}

fn auth_error(state: &AppState, err: &AuthError) -> Response {
    let status = auth_status(err.code());
    let message = match err {
        AuthError::MissingCredential => "Authorization required".to_string(),
        AuthError::InvalidCredential { .. } => "Invalid token".to_string(),
        AuthError::NoTokenForUser { .. } => "No calendar authorization stored for this user".to_string(),
        AuthError::AuthRequired { .. } => err.to_string(),
        AuthError::RefreshFailed { .. } => "Calendar token refresh failed".to_string(),
        AuthError::NotFound { .. } => "Not found".to_string(),
        _ => "Internal server error".to_string(),
    };

    if status >= 500 {
        error!(code = %err.code(), error = %err, "request failed");
    } else {
        warn!(code = %err.code(), error = %err, "request rejected");
    }
    Response::error(status, message, &state.cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::state::Backends;
    use interviewsync_auth::testing::{MemorySecretStore, MemoryUserStore, StaticOAuthProvider};
    use interviewsync_auth::{AuthResult, IdentityVerifier};
    use interviewsync_calendar::MemoryInterviewSink;
    use interviewsync_core::{BoxFuture, Token, UserRecord};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Accepts `good-<name>` as the ID token of `<name>@example.com`.
    #[derive(Default)]
    struct FakeVerifier {
        calls: AtomicUsize,
    }

    impl IdentityVerifier for FakeVerifier {
        fn verify<'a>(&'a self, bearer: &'a str) -> BoxFuture<'a, AuthResult<Identity>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                match bearer.strip_prefix("good-") {
                    Some(name) => Ok(Identity::new(format!("{}@example.com", name))
                        .with_name(name.to_uppercase())
                        .with_picture("https://pic")),
                    None => Err(AuthError::invalid_credential("audience mismatch")),
                }
            })
        }
    }

    struct Harness {
        state: AppState,
        users: Arc<MemoryUserStore>,
        sink: Arc<MemoryInterviewSink>,
        verifier: Arc<FakeVerifier>,
        secrets: Arc<MemorySecretStore>,
        _calendar: MockServer,
    }

    fn token(access: &str, offset_ms: i64) -> String {
        Token::new(
            access,
            Some("r".to_string()),
            Some(Utc::now().timestamp_millis() + offset_ms),
            None,
        )
        .to_json()
        .unwrap()
    }

    async fn harness(config: AppConfig, secrets: MemorySecretStore, users: MemoryUserStore) -> Harness {
        let calendar = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": "e1", "summary": "Interview", "start": {"date": "2024-03-15"}}]
            })))
            .mount(&calendar)
            .await;

        let secrets = Arc::new(secrets.with_value(
            &config.credentials_param,
            r#"{"client_id": "id", "client_secret": "s", "redirect_uri": "http://localhost"}"#,
        ));
        let users = Arc::new(users);
        let sink = Arc::new(MemoryInterviewSink::new());
        let verifier = Arc::new(FakeVerifier::default());

        let state = AppState::new(
            &config,
            Backends {
                secrets: secrets.clone(),
                users: users.clone(),
                oauth: Arc::new(StaticOAuthProvider::issuing("refreshed")),
                verifier: verifier.clone(),
                sink: sink.clone(),
                http_client: reqwest::Client::new(),
            },
        )
        .with_calendar_base_url(calendar.uri());

        Harness {
            state,
            users,
            sink,
            verifier,
            secrets,
            _calendar: calendar,
        }
    }

    #[tokio::test]
    async fn login_records_profile_and_echoes_token() {
        let h = harness(
            AppConfig::default(),
            MemorySecretStore::new(),
            MemoryUserStore::new().with_record(
                UserRecord::new("ada@example.com").with_attribute(UserRecord::GOOGLE_TOKEN, "kept"),
            ),
        )
        .await;

        let request = Request::with_body(r#"{"token": "good-ada"}"#).header("Authorization", "Bearer good-bob");
        let response = dispatch(&h.state, Route::Login, &request).await;

        assert_eq!(response.status_code, 200);
        let body = response.body_json().unwrap();
        assert_eq!(body["user"]["email"], "ada@example.com");
        assert_eq!(body["token"], "good-ada");
        assert_eq!(response.headers["Access-Control-Allow-Origin"], "http://localhost:5173");

        let record = h.users.record("ada@example.com").unwrap();
        assert_eq!(record.get(UserRecord::NAME), Some("ADA"));
        assert!(record.get(UserRecord::LAST_LOGIN).is_some());
        assert_eq!(record.token_blob(), Some("kept"));
    }

    #[tokio::test]
    async fn login_without_token_is_bad_request() {
        let h = harness(AppConfig::default(), MemorySecretStore::new(), MemoryUserStore::new()).await;
        let response = login(&h.state, &Request::default()).await;
        assert_eq!(response.status_code, 400);
        assert_eq!(response.body_json().unwrap()["error"], "Token is required");
    }

    #[tokio::test]
    async fn invalid_token_is_unauthorized_without_side_effects() {
        let h = harness(AppConfig::default(), MemorySecretStore::new(), MemoryUserStore::new()).await;
        let request = Request::default().header("authorization", "Bearer forged");

        let response = login(&h.state, &request).await;
        assert_eq!(response.status_code, 401);
        assert_eq!(h.users.update_count(), 0);

        let response = sync_events(&h.state, &request).await;
        assert_eq!(response.status_code, 401);
        assert!(h.sink.created().is_empty());
    }

    #[tokio::test]
    async fn get_user_returns_profile_or_404() {
        let h = harness(
            AppConfig::default(),
            MemorySecretStore::new(),
            MemoryUserStore::new().with_record(
                UserRecord::new("ada@example.com")
                    .with_attribute(UserRecord::NAME, "Ada")
                    .with_attribute(UserRecord::GOOGLE_TOKEN, "secret"),
            ),
        )
        .await;

        let response = get_user(&h.state, &Request::default().header("Authorization", "Bearer good-ada")).await;
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body_json().unwrap()["user"]["name"], "Ada");
        assert!(!response.body.contains("secret"));

        let response = get_user(&h.state, &Request::default().header("Authorization", "good-bob")).await;
        assert_eq!(response.status_code, 404);

        let response = get_user(&h.state, &Request::default()).await;
        assert_eq!(response.status_code, 400);
        assert_eq!(response.body_json().unwrap()["error"], "Token is required");
        assert_eq!(h.verifier.calls.load(Ordering::SeqCst), 2);

        let response = sync_events(&h.state, &Request::default()).await;
        assert_eq!(response.status_code, 401);
    }

    #[tokio::test]
    async fn sync_in_single_account_mode() {
        let config = AppConfig::default();
        let secrets = MemorySecretStore::new().with_value(&config.token_param, token("shared", -1000));
        let h = harness(config.clone(), secrets, MemoryUserStore::new()).await;

        let request = Request::default().header("Authorization", "Bearer good-ada");
        let response = sync_events(&h.state, &request).await;

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body_json().unwrap()["synced"], 1);
        assert_eq!(h.sink.created_for("ada@example.com").len(), 1);
        let stored = Token::from_json(&h.secrets.value(&config.token_param).unwrap()).unwrap();
        assert_eq!(stored.access_token, "refreshed");
    }

    #[tokio::test]
    async fn sync_without_shared_token_needs_operator() {
        let h = harness(AppConfig::default(), MemorySecretStore::new(), MemoryUserStore::new()).await;
        let request = Request::default().header("Authorization", "Bearer good-ada");

        let response = sync_events(&h.state, &request).await;
        assert_eq!(response.status_code, 503);
        let error = response.body_json().unwrap()["error"].as_str().unwrap().to_string();
        assert!(error.contains("access_type=offline"));
    }

    #[tokio::test]
    async fn sync_in_per_user_mode_without_token_is_forbidden() {
        let config = AppConfig {
            auth_mode: interviewsync_auth::AuthStrategy::PerUser,
            ..AppConfig::default()
        };
        let h = harness(
            config,
            MemorySecretStore::new(),
            MemoryUserStore::new().with_record(UserRecord::new("ada@example.com")),
        )
        .await;

        let request = Request::with_body(r#"{"token": "good-ada"}"#);
        let response = sync_events(&h.state, &request).await;
        assert_eq!(response.status_code, 403);
        assert_eq!(h.users.update_count(), 0);
    }

    #[tokio::test]
    async fn sync_all_reports_per_user() {
        let h = harness(
            AppConfig::default(),
            MemorySecretStore::new(),
            MemoryUserStore::new()
                .with_record(
                    UserRecord::new("ada@example.com")
                        .with_attribute(UserRecord::GOOGLE_TOKEN, token("ada", 3_600_000)),
                )
                .with_record(UserRecord::new("bob@example.com")),
        )
        .await;

        let response = dispatch(&h.state, Route::SyncAll, &Request::default()).await;
        assert_eq!(response.status_code, 200);
        let body = response.body_json().unwrap();
        assert_eq!(body["results"][0], json!({"email": "ada@example.com", "synced": 1}));
        assert_eq!(body["results"][1]["email"], "bob@example.com");
        assert!(body["results"][1]["error"].is_string());
    }

    #[tokio::test]
    async fn preflight_is_empty_with_cors() {
        let config = AppConfig {
            cors_allow_origin: "https://app.example.com".to_string(),
            ..AppConfig::default()
        };
        let h = harness(config, MemorySecretStore::new(), MemoryUserStore::new()).await;
        let response = dispatch(&h.state, Route::Preflight, &Request::default()).await;
        assert_eq!(response.status_code, 200);
        assert!(response.body.is_empty());
        assert_eq!(response.headers["Access-Control-Allow-Origin"], "https://app.example.com");
    }
}
