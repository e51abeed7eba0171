//! Destination for synced interviews.

use std::sync::Mutex;

use interviewsync_core::{BoxFuture, InterviewDraft};
use uuid::Uuid;

use crate::error::{CalendarError, CalendarResult};

/// Creates interview records from drafts.
pub trait InterviewSink: Send + Sync {
    /// Stores `draft` as a new interview and returns its id.
    fn create<'a>(&'a self, draft: &'a InterviewDraft) -> BoxFuture<'a, CalendarResult<String>>;

    /// Removes an interview created by [`InterviewSink::create`].
    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, CalendarResult<()>>;
}

/// An interview sink that keeps drafts in memory.
#[derive(Debug, Default)]
pub struct MemoryInterviewSink {
    created: Mutex<Vec<(String, InterviewDraft)>>,
    fail_after: Option<usize>,
    attempts: Mutex<usize>,
}

impl MemoryInterviewSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink whose creates fail once `successes` have gone through.
    pub fn failing_after(successes: usize) -> Self {
        Self {
            fail_after: Some(successes),
            ..Self::default()
        }
    }

    /// Returns every stored draft with its id, in creation order.
    pub fn created(&self) -> Vec<(String, InterviewDraft)> {
        self.created
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Returns the drafts owned by `email`.
    pub fn created_for(&self, email: &str) -> Vec<InterviewDraft> {
        self.created()
            .into_iter()
            .map(|(_, draft)| draft)
            .filter(|draft| draft.user_email == email)
            .collect()
    }
}

impl InterviewSink for MemoryInterviewSink {
    fn create<'a>(&'a self, draft: &'a InterviewDraft) -> BoxFuture<'a, CalendarResult<String>> {
        Box::pin(async move {
            {
                let mut attempts = self.attempts.lock().unwrap_or_else(|e| e.into_inner());
                *attempts += 1;
                if self.fail_after.is_some_and(|limit| *attempts > limit) {
                    return Err(CalendarError::sink("injected write failure"));
                }
            }
            let id = Uuid::new_v4().to_string();
            self.created
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push((id.clone(), draft.clone()));
            Ok(id)
        })
    }

    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, CalendarResult<()>> {
        Box::pin(async move {
            self.created
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .retain(|(created, _)| created != id);
            Ok(())
        })
    }
}
