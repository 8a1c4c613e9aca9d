//! Login flow.
//!
//! 1) Look up the account by username.
//! 2) Verify the password (a dummy verification runs for unknown usernames).
//! 3) Inactive accounts and bad credentials get plain-text answers.
//! 4) Otherwise store a session, set the cookie and redirect to `/`.

use axum::{
    extract::Extension,
    http::header::SET_COOKIE,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use secrecy::SecretString;
use sqlx::SqlitePool;
use std::sync::{Arc, OnceLock};
use tracing::{error, info, instrument, warn};

use super::internal_error;
use crate::api::{
    forms::LoginForm,
    pages,
    password::{hash_password, verify_password},
    session::session_cookie,
    state::AuthState,
    storage::{insert_session, lookup_login_record, record_login},
};

pub(crate) const INACTIVE_ACCOUNT_MESSAGE: &str = "Your account was inactive.";
pub(crate) const INVALID_LOGIN_MESSAGE: &str = "Invalid login details given";

static DUMMY_HASH: OnceLock<String> = OnceLock::new();

pub async fn login_form() -> Html<String> {
    pages::login()
}

#[utoipa::path(
    post,
    path= "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses (
        (status = 303, description = "Logged in; session cookie set and redirected to /"),
        (status = 200, description = "Inactive account or invalid credentials", body = String, content_type = "text/plain"),
    ),
    tag= "auth"
)]
#[instrument(skip(pool, auth_state, form), fields(username = %form.username))]
pub async fn login(
    pool: Extension<SqlitePool>,
    auth_state: Extension<Arc<AuthState>>,
    form: Form<LoginForm>,
) -> Response {
    let LoginForm { username, password } = form.0;
    let password = SecretString::from(password);

    let record = match lookup_login_record(&pool, &username).await {
        Ok(record) => record,
        Err(err) => {
            error!("Failed to lookup login record: {err:#}");
            return internal_error();
        }
    };

    let Some(record) = record else {
        // Keep the unknown-user path as slow as a real verification.
        if let Some(hash) = dummy_hash().await {
            let _ = verify_password(password, hash).await;
        }
        warn!("Invalid login details given for username {username:?}");
        return INVALID_LOGIN_MESSAGE.into_response();
    };

    match verify_password(password, record.password_hash).await {
        Ok(true) => {}
        Ok(false) => {
            warn!("Invalid login details given for username {username:?}");
            return INVALID_LOGIN_MESSAGE.into_response();
        }
        Err(err) => {
            error!("Failed to verify password: {err:#}");
            return internal_error();
        }
    }

    if !record.is_active {
        info!("Login refused for inactive account {username:?}");
        return INACTIVE_ACCOUNT_MESSAGE.into_response();
    }

    let token = match insert_session(
        &pool,
        record.user_id,
        auth_state.config().session_ttl_seconds(),
    )
    .await
    {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to create session: {err:#}");
            return internal_error();
        }
    };

    if let Err(err) = record_login(&pool, record.user_id).await {
        error!("Failed to record last login: {err:#}");
    }

    let cookie = match session_cookie(auth_state.config(), &token) {
        Ok(cookie) => cookie,
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return internal_error();
        }
    };

    info!("User {} logged in", record.user_id);

    ([(SET_COOKIE, cookie)], Redirect::to("/")).into_response()
}

/// Hash used to verify against when the username does not exist.
async fn dummy_hash() -> Option<String> {
    if let Some(hash) = DUMMY_HASH.get() {
        return Some(hash.clone());
    }
    match hash_password(SecretString::from("authly-dummy-password".to_string())).await {
        Ok(hash) => Some(DUMMY_HASH.get_or_init(|| hash).clone()),
        Err(err) => {
            error!("Failed to prepare dummy password hash: {err:#}");
            None
        }
    }
}
