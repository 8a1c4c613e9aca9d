use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use sqlx::SqlitePool;

use crate::api::{pages, session::CurrentUser};

/// Landing page. Anonymous callers are welcome, so a missing or stale session
/// is not an error here.
pub async fn index(headers: HeaderMap, pool: Extension<SqlitePool>) -> Response {
    match CurrentUser::resolve(&headers, &pool).await {
        Ok(user) => pages::index(user.as_ref().map(|user| user.username.as_str())).into_response(),
        Err(response) => response,
    }
}
