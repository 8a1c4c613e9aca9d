use crate::api::{self, AuthConfig};
use anyhow::Result;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub media_root: PathBuf,
    pub session_ttl_seconds: i64,
    pub session_cookie_secure: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database cannot be opened or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let auth_config = AuthConfig::new(args.media_root)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_session_cookie_secure(args.session_cookie_secure);

    api::new(args.port, &args.dsn, auth_config).await
}
