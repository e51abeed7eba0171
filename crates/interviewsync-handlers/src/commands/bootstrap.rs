//! Interactive authorization of the shared calendar account.
//!
//! Prints (and optionally opens) the consent URL, reads the code the operator
//! pastes back, exchanges it with PKCE and stores the resulting token in the
//! secret store as an encrypted parameter.

use std::io::{BufRead, Write};

use interviewsync_auth::{AuthMode, PkceFlow, TokenLifecycleManager};
use tracing::{info, warn};

use crate::error::{HandlerError, HandlerResult};
use crate::state::AppState;

/// Runs the bootstrap against stdin/stdout.
pub async fn run(state: &AppState, no_browser: bool, force: bool) -> HandlerResult<()> {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut output = std::io::stdout();
    authorize(state.lifecycle(), &mut input, &mut output, !no_browser, force).await
}

/// Runs the bootstrap with explicit input and output.
pub async fn authorize<R, W>(
    lifecycle: &TokenLifecycleManager,
    input: &mut R,
    output: &mut W,
    open_browser: bool,
    force: bool,
) -> HandlerResult<()>
where
    R: BufRead,
    W: Write,
{
    if !force && lifecycle.ensure_authorized(AuthMode::SingleAccount).await.is_ok() {
        writeln!(output, "A usable calendar token is already stored.")?;
        writeln!(output, "Use --force to authorize again.")?;
        return Ok(());
    }

    let pkce = PkceFlow::new();
    let url = lifecycle.authorization_url(Some(&pkce)).await?;

    writeln!(output, "Authorize this app by visiting this url:")?;
    writeln!(output)?;
    writeln!(output, "  {}", url)?;
    writeln!(output)?;
    if open_browser && let Err(e) = open::that(&url) {
        warn!("failed to open browser: {}", e);
    }

    write!(output, "Enter the code from that page here: ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let code = parse_code(&line, &pkce.state)?;

    lifecycle
        .exchange_and_store(&code, Some(&pkce.verifier))
        .await?;

    info!(parameter = %lifecycle.config().token_param, "stored shared account token");
    writeln!(output)?;
    writeln!(output, "Token stored to {}", lifecycle.config().token_param)?;
    Ok(())
}

/// Accepts either the bare code or the full redirect URL it was delivered on.
///
/// A redirect URL must carry the `state` sent with the consent URL.
fn parse_code(input: &str, expected_state: &str) -> HandlerResult<String> {
    let no_code = || HandlerError::Config("no authorization code entered".to_string());
    let input = input.trim();
    if input.is_empty() {
        return Err(no_code());
    }

    let Some((_, query)) = input.split_once('?') else {
        return Ok(input.to_string());
    };

    let param = |name: &str| {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == name)
            .and_then(|(_, value)| urlencoding::decode(value).ok())
            .map(|value| value.into_owned())
    };

    if param("state").as_deref() != Some(expected_state) {
        return Err(HandlerError::Config(
            "redirect state does not match this authorization request".to_string(),
        ));
    }

    param("code")
        .filter(|code| !code.is_empty())
        .ok_or_else(no_code)
}
