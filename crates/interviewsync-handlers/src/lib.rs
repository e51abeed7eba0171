//! Request handlers, configuration and the `interviewsync` CLI.

pub mod cli;
pub mod commands;
pub mod config;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod state;

pub use cli::Cli;
pub use config::AppConfig;
pub use envelope::{CorsPolicy, Request, Response};
pub use error::{HandlerError, HandlerResult};
pub use handlers::{Route, dispatch};
pub use state::{AppState, Backends};
