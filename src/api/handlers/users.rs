use axum::{
    extract::Extension,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::error;
use utoipa::ToSchema;

use super::internal_error;
use crate::api::storage::{self, UserListing};

#[derive(Debug, Serialize, ToSchema)]
pub struct UserSummary {
    pub email: String,
    pub username: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserList {
    pub users: Vec<UserSummary>,
}

impl From<UserListing> for UserSummary {
    fn from(listing: UserListing) -> Self {
        Self {
            email: listing.email,
            username: listing.username,
        }
    }
}

#[utoipa::path(
    get,
    path= "/users.json",
    responses (
        (status = 200, description = "Every registered user, in storage order", body = UserList)
    ),
    tag= "users"
)]
pub async fn list_users(pool: Extension<SqlitePool>) -> Response {
    match storage::list_users(&pool).await {
        Ok(listing) => Json(UserList {
            users: listing.into_iter().map(UserSummary::from).collect(),
        })
        .into_response(),
        Err(err) => {
            error!("Failed to list users: {err:#}");
            internal_error()
        }
    }
}
