//! Calendar access and interview sync for an authorized account.

pub mod client;
pub mod error;
pub mod mapping;
pub mod sink;
pub mod sync;

#[cfg(feature = "aws")]
pub mod aws;

pub use client::{CalendarClient, CalendarEvent};
pub use error::{CalendarError, CalendarResult};
pub use mapping::interview_from_event;
pub use sink::{InterviewSink, MemoryInterviewSink};
pub use sync::{EventSync, SyncReport, UserSyncOutcome};
