//! Session cookies and the extractor that gates logged-in routes.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{
        header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
        request::Parts,
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Redirect, Response},
};
use sqlx::SqlitePool;
use tracing::error;
use url::form_urlencoded;

use super::{
    state::AuthConfig,
    storage::{lookup_session, SessionRecord},
    utils::hash_session_token,
};

pub(crate) const SESSION_COOKIE_NAME: &str = "authly_session";

const LOGIN_PATH: &str = "/login";

/// The user behind a valid session.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub user_id: i64,
    pub username: String,
    pub(crate) session_hash: Vec<u8>,
}

impl CurrentUser {
    /// Resolve the session presented in `headers`, if any.
    pub(crate) async fn resolve(
        headers: &HeaderMap,
        pool: &SqlitePool,
    ) -> Result<Option<Self>, Response> {
        let Some(token) = extract_session_token(headers) else {
            return Ok(None);
        };
        let token_hash = hash_session_token(&token);
        match lookup_session(pool, &token_hash).await {
            Ok(Some(SessionRecord { user_id, username })) => Ok(Some(Self {
                user_id,
                username,
                session_hash: token_hash,
            })),
            Ok(None) => Ok(None),
            Err(err) => {
                error!("Failed to lookup session: {err}");
                Err(StatusCode::INTERNAL_SERVER_ERROR.into_response())
            }
        }
    }
}

fn session_pool(parts: &Parts) -> Result<SqlitePool, Response> {
    parts.extensions.get::<SqlitePool>().cloned().ok_or_else(|| {
        error!("Database pool missing from request extensions");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}

/// Rejects anonymous requests with a redirect to the login page.
#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let pool = session_pool(parts)?;
        match Self::resolve(&parts.headers, &pool).await? {
            Some(user) => Ok(user),
            None => Err(login_redirect(parts.uri.path()).into_response()),
        }
    }
}

/// Redirect to the login page, remembering where the user was going.
pub(crate) fn login_redirect(next: &str) -> Redirect {
    let next: String = form_urlencoded::byte_serialize(next.as_bytes()).collect();
    Redirect::to(&format!("{LOGIN_PATH}?next={next}"))
}

/// Build an `HttpOnly` cookie for the session token.
pub(crate) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Session token from the `Authorization: Bearer` header or the session cookie.
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let Some((key, val)) = pair.trim().split_once('=') else {
                continue;
            };
            let val = val.trim();
            if key.trim() == SESSION_COOKIE_NAME && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
