//! Interview drafts produced by calendar sync.

use serde::{Deserialize, Serialize};

/// An interviewer attached to an interview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interviewer {
    /// Display name, `"Unknown"` when the calendar has none.
    pub name: String,
    /// Email address, `"Unknown"` when the calendar has none.
    pub email: String,
}

/// A new interview record, ready to hand to the interview store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewDraft {
    /// Company name (the event organizer).
    pub company: String,
    /// Role (the event summary).
    pub role: String,
    /// Start as RFC 3339 datetime, or `YYYY-MM-DD` for all-day events.
    pub date: String,
    /// Record type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Record status.
    pub status: String,
    /// Interviewers (non-self attendees).
    #[serde(default)]
    pub interviewers: Vec<Interviewer>,
    /// The verified email of the interview's owner. Reminders go here.
    #[serde(rename = "userEmail")]
    pub user_email: String,
}

impl InterviewDraft {
    /// Record type for synced interviews.
    pub const KIND: &'static str = "interview";
    /// Status of a freshly synced interview.
    pub const STATUS_SCHEDULED: &'static str = "scheduled";
    /// Placeholder for missing organizer/attendee data.
    pub const UNKNOWN: &'static str = "Unknown";
}
