//! Runs a single handler locally.

use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::envelope::{Request, Response};
use crate::error::HandlerResult;
use crate::handlers::{Route, dispatch};
use crate::state::AppState;

/// Reads a request from `event` (or stdin), runs the handler for `route`
/// and prints the response as JSON.
pub async fn run(state: &AppState, route: Route, event: Option<&Path>) -> HandlerResult<()> {
    let raw = match event {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            input
        }
    };

    let response = invoke(state, route, &raw).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Parses `raw` as a request and runs the handler for `route`.
///
/// Blank input is an empty request.
pub async fn invoke(state: &AppState, route: Route, raw: &str) -> HandlerResult<Response> {
    let request: Request = if raw.trim().is_empty() {
        Request::default()
    } else {
        serde_json::from_str(raw)?
    };
    debug!(?route, has_body = request.body.is_some(), "invoking handler");
    Ok(dispatch(state, route, &request).await)
}
