//! Registration flow.
//!
//! Flow Overview:
//! 1) Parse the account and profile forms (urlencoded or multipart).
//! 2) Validate both; on errors re-render the page with the submitted values.
//! 3) Hash the password and store the uploaded picture, if any.
//! 4) Insert user and profile in one transaction. A taken username is
//!    reported on the form and the stored picture is removed again.

use axum::{
    extract::Extension,
    response::{Html, IntoResponse, Response},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use super::internal_error;
use crate::api::{
    forms::{
        FieldErrors, ProfileForm, RegistrationSubmission, UserForm, FIELD_USERNAME,
        MSG_USERNAME_TAKEN,
    },
    media::MediaStore,
    pages,
    password::hash_password,
    state::AuthState,
    storage::{insert_user_and_profile, NewAccount, SignupOutcome},
};

pub async fn register_form() -> Html<String> {
    pages::registration(
        &UserForm::default(),
        &ProfileForm::default(),
        &FieldErrors::default(),
        false,
    )
}

#[instrument(skip(pool, auth_state, submission))]
pub async fn register(
    pool: Extension<SqlitePool>,
    auth_state: Extension<Arc<AuthState>>,
    submission: RegistrationSubmission,
) -> Response {
    let errors = submission.validate();
    if !errors.is_empty() {
        debug!(
            "registration rejected, invalid fields: {:?}",
            errors.fields().collect::<Vec<_>>()
        );
        return pages::registration(&submission.user, &submission.profile, &errors, false)
            .into_response();
    }

    let RegistrationSubmission { user, profile } = submission;

    let password_hash = match hash_password(user.password.clone()).await {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err:#}");
            return internal_error();
        }
    };

    let media = auth_state.media();
    let profile_pic = match store_profile_pic(media, &profile).await {
        Ok(path) => path,
        Err(response) => return response,
    };

    let account = NewAccount {
        username: &user.username,
        email: &user.email,
        password_hash: &password_hash,
        portfolio_site: &profile.portfolio_site,
        profile_pic: profile_pic.as_deref(),
    };

    let outcome = insert_user_and_profile(&pool, &account).await;

    if !matches!(outcome, Ok(SignupOutcome::Created(_))) {
        if let Some(path) = profile_pic.as_deref() {
            if let Err(err) = media.remove(path).await {
                error!("Failed to remove orphaned profile picture: {err:#}");
            }
        }
    }

    match outcome {
        Ok(SignupOutcome::Created(user_id)) => {
            info!("Registered user {user_id}");
            pages::registration(&user, &profile, &FieldErrors::default(), true).into_response()
        }
        Ok(SignupOutcome::Conflict) => {
            debug!("registration rejected, username already taken");
            let mut errors = FieldErrors::default();
            errors.add(FIELD_USERNAME, MSG_USERNAME_TAKEN);
            pages::registration(&user, &profile, &errors, false).into_response()
        }
        Err(err) => {
            error!("Failed to insert user and profile: {err:#}");
            internal_error()
        }
    }
}

/// Write the validated picture to the media store, if one was uploaded.
async fn store_profile_pic(
    media: &MediaStore,
    profile: &ProfileForm,
) -> Result<Option<String>, Response> {
    let (Some(image), Some(kind)) = (profile.profile_pic.as_ref(), profile.profile_pic_kind())
    else {
        return Ok(None);
    };

    match media.save_profile_pic(kind, &image.bytes).await {
        Ok(path) => {
            debug!(
                "stored profile picture {:?} as {path}",
                image.file_name.as_deref().unwrap_or("")
            );
            Ok(Some(path))
        }
        Err(err) => {
            error!("Failed to store profile picture: {err:#}");
            Err(internal_error())
        }
    }
}
