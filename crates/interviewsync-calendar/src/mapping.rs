//! Calendar event to interview draft mapping.

use interviewsync_core::{InterviewDraft, Interviewer};

use crate::client::CalendarEvent;

/// Builds the interview draft for `event`, owned by `owner_email`.
///
/// Returns `None` for events without any start time.
pub fn interview_from_event(event: &CalendarEvent, owner_email: &str) -> Option<InterviewDraft> {
    let date = event
        .start
        .date_time
        .as_ref()
        .or(event.start.date.as_ref())?
        .clone();

    let company = event
        .organizer
        .as_ref()
        .and_then(|o| o.display_name.as_deref())
        .filter(|name| !name.is_empty())
        .unwrap_or(InterviewDraft::UNKNOWN)
        .to_string();

    let interviewers = event
        .attendees
        .iter()
        .filter(|a| !a.is_self)
        .map(|a| Interviewer {
            name: non_empty_or_unknown(a.display_name.as_deref()),
            email: non_empty_or_unknown(a.email.as_deref()),
        })
        .collect();

    Some(InterviewDraft {
        company,
        role: event.summary.clone().unwrap_or_default(),
        date,
        kind: InterviewDraft::KIND.to_string(),
        status: InterviewDraft::STATUS_SCHEDULED.to_string(),
        interviewers,
        user_email: owner_email.to_string(),
    })
}

fn non_empty_or_unknown(value: Option<&str>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or(InterviewDraft::UNKNOWN)
        .to_string()
}
