//! Route handlers.
//!
//! HTML pages (`/`, `/register`, `/login`) are rendered by [`super::pages`];
//! the JSON and plain-text endpoints are also described in the `OpenAPI`
//! document.

pub mod health;
pub mod index;
pub mod special;
pub mod user_login;
pub mod user_logout;
pub mod user_register;
pub mod users;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Generic `500` used when a store or filesystem step fails.
pub(crate) fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
}
