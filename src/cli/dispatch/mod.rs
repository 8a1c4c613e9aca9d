//! Map parsed command-line arguments to the action the binary runs.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{session, ARG_DSN, ARG_PORT};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let media_root = matches
        .get_one::<String>(session::ARG_MEDIA_ROOT)
        .map(PathBuf::from)
        .context("missing required argument: --media-root")?;
    let session_ttl_seconds = matches
        .get_one::<i64>(session::ARG_SESSION_TTL_SECONDS)
        .copied()
        .context("missing required argument: --session-ttl-seconds")?;
    let session_cookie_secure = matches.get_flag(session::ARG_SESSION_COOKIE_SECURE);

    Ok(Action::Server(Args {
        port,
        dsn,
        media_root,
        session_ttl_seconds,
        session_cookie_secure,
    }))
}
