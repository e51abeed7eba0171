//! Google Calendar API client.
//!
//! A thin HTTP client bound to one authorized token. It only reads events;
//! the token lifecycle manager has already made sure the token is usable.

use chrono::{DateTime, SecondsFormat, Utc};
use interviewsync_auth::{AuthError, AuthorizedClient};
use serde::Deserialize;
use tracing::debug;

use crate::error::{CalendarError, CalendarResult};

/// Base URL for Google Calendar API v3.
pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Google Calendar API client.
#[derive(Debug, Clone)]
pub struct CalendarClient {
    http_client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl CalendarClient {
    /// Creates a client acting with the given authorization.
    pub fn new(http_client: reqwest::Client, authorized: &AuthorizedClient) -> Self {
        Self {
            http_client,
            access_token: authorized.access_token().to_string(),
            base_url: CALENDAR_API_BASE.to_string(),
        }
    }

    /// Overrides the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Lists the events of `calendar_id` starting in `[time_min, time_max)`
    /// that match the free-text `query`.
    ///
    /// Recurring events are expanded and results are ordered by start time.
    /// Cancelled events are dropped. All pages are fetched.
    pub async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        query: Option<&str>,
    ) -> CalendarResult<Vec<CalendarEvent>> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .list_events_page(calendar_id, time_min, time_max, query, page_token.as_deref())
                .await?;

            events.extend(
                page.items
                    .into_iter()
                    .filter(|event| event.status.as_deref() != Some("cancelled")),
            );

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("fetched {} events from calendar {}", events.len(), calendar_id);
        Ok(events)
    }

    /// Fetches a single page of events.
    async fn list_events_page(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        query: Option<&str>,
        page_token: Option<&str>,
    ) -> CalendarResult<EventListResponse> {
        let url = format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        );

        let mut request = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("timeMin", time_min.to_rfc3339_opts(SecondsFormat::Millis, true)),
                ("timeMax", time_max.to_rfc3339_opts(SecondsFormat::Millis, true)),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ]);

        if let Some(query) = query {
            request = request.query(&[("q", query)]);
        }

        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request.send().await.map_err(CalendarError::network)?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AuthError::access("calendar rejected the access token").into());
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CalendarError::api(status.as_u16(), body));
        }

        let body = response.text().await.map_err(CalendarError::network)?;

        serde_json::from_str(&body)
            .map_err(|e| CalendarError::invalid_response(format!("failed to parse response: {}", e)))
    }
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<CalendarEvent>,
    next_page_token: Option<String>,
}

/// A single event from the Google Calendar API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    /// Event identifier.
    pub id: Option<String>,
    /// Event title.
    pub summary: Option<String>,
    /// `confirmed`, `tentative` or `cancelled`.
    pub status: Option<String>,
    /// Start time.
    #[serde(default)]
    pub start: EventTime,
    /// Organizer of the event.
    pub organizer: Option<EventPerson>,
    /// Attendees, including the calendar owner.
    #[serde(default)]
    pub attendees: Vec<Attendee>,
}

/// Event time: either a datetime or an all-day date.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    /// `YYYY-MM-DD` for all-day events.
    pub date: Option<String>,
    /// RFC 3339 datetime for timed events.
    pub date_time: Option<String>,
}

/// Organizer of an event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPerson {
    /// Email address.
    pub email: Option<String>,
    /// Display name.
    pub display_name: Option<String>,
}

/// Attendee of an event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    /// Email address.
    pub email: Option<String>,
    /// Display name.
    pub display_name: Option<String>,
    /// True for the calendar owner.
    #[serde(default, rename = "self")]
    pub is_self: bool,
}
