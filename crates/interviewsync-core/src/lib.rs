//! Core types: credentials, tokens, identities, user records, interview drafts

pub mod credentials;
pub mod future;
pub mod identity;
pub mod interview;
pub mod token;
pub mod tracing;
pub mod user;

pub use credentials::Credentials;
pub use future::BoxFuture;
pub use identity::Identity;
pub use interview::{InterviewDraft, Interviewer};
pub use token::{EXPIRY_SKEW_MS, Token};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
pub use user::{UserProfile, UserRecord};
