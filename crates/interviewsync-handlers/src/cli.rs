//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::handlers::Route;

/// interviewsync - interview tracking handlers and calendar authorization
#[derive(Debug, Parser)]
#[command(name = "interviewsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "INTERVIEWSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Log JSON lines instead of human-readable output
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one handler on a request read from a file or stdin
    Invoke {
        /// Handler to run
        #[arg(value_enum)]
        route: Route,

        /// File with the JSON request (`{"body": ..., "headers": {...}}`);
        /// stdin when omitted
        #[arg(long, short)]
        event: Option<PathBuf>,
    },

    /// Authorize the shared calendar account and store its token
    Bootstrap {
        /// Print the authorization URL without opening a browser
        #[arg(long)]
        no_browser: bool,

        /// Re-authorize even if a usable token is already stored
        #[arg(long, short)]
        force: bool,
    },
}
