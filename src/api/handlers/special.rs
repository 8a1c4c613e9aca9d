use axum::response::IntoResponse;
use tracing::debug;

use crate::api::session::CurrentUser;

pub(crate) const SPECIAL_MESSAGE: &str = "You are logged in !";

#[utoipa::path(
    get,
    path= "/special",
    responses (
        (status = 200, description = "Caller holds a valid session", body = String, content_type = "text/plain"),
        (status = 303, description = "No session; redirected to /login")
    ),
    tag= "auth"
)]
pub async fn special(user: CurrentUser) -> impl IntoResponse {
    debug!("special requested by user {}", user.user_id);
    SPECIAL_MESSAGE
}
