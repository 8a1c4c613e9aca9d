use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap},
    response::{IntoResponse, Redirect, Response},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{error, info};

use crate::api::{
    session::{clear_session_cookie, CurrentUser},
    state::AuthState,
    storage::delete_session,
};

/// Delete the caller's session, clear the cookie and go back to `/`.
pub async fn logout(
    user: CurrentUser,
    pool: Extension<SqlitePool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    if let Err(err) = delete_session(&pool, &user.session_hash).await {
        error!("Failed to delete session: {err:#}");
    }

    info!("User {} logged out", user.user_id);

    // Always clear the cookie, even if the session record could not be removed.
    let mut headers = HeaderMap::new();
    match clear_session_cookie(auth_state.config()) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build logout cookie: {err}"),
    }

    (headers, Redirect::to("/")).into_response()
}
