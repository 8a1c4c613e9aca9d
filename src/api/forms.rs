//! Typed registration and login payloads with field-level validation.
//!
//! Validation never touches the store; it only reports which fields are
//! wrong. Username uniqueness is enforced by the insert itself and reported
//! back through [`FieldErrors::add`] by the register handler.

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    Form,
};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;
use url::Url;
use utoipa::ToSchema;

use super::media::{ImageKind, UploadedImage};

pub(crate) const FIELD_USERNAME: &str = "username";
pub(crate) const FIELD_EMAIL: &str = "email";
pub(crate) const FIELD_PASSWORD: &str = "password";
pub(crate) const FIELD_PORTFOLIO_SITE: &str = "portfolio_site";
pub(crate) const FIELD_PROFILE_PIC: &str = "profile_pic";

const USERNAME_MAX_LEN: usize = 150;
const EMAIL_MAX_LEN: usize = 254;
const PORTFOLIO_SITE_MAX_LEN: usize = 200;

const MSG_REQUIRED: &str = "This field is required.";
const MSG_INVALID_USERNAME: &str = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";
const MSG_INVALID_EMAIL: &str = "Enter a valid email address.";
const MSG_INVALID_URL: &str = "Enter a valid URL.";
const MSG_INVALID_IMAGE: &str = "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub(crate) const MSG_USERNAME_TAKEN: &str = "A user with that username already exists.";

/// Validation messages keyed by field name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub(crate) fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub(crate) fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn merge(&mut self, other: Self) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub(crate) fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }
}

fn max_len_message(limit: usize, actual: usize) -> String {
    format!("Ensure this value has at most {limit} characters (it has {actual}).")
}

fn valid_username(username: &str) -> bool {
    Regex::new(r"^[\w.@+-]+$").is_ok_and(|re| re.is_match(username))
}

fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

fn valid_portfolio_site(site: &str) -> bool {
    Url::parse(site).is_ok_and(|url| {
        matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
    })
}

/// Account half of the registration form.
#[derive(Debug, Default)]
pub(crate) struct UserForm {
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) password: SecretString,
}

impl UserForm {
    pub(crate) fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();

        let username_len = self.username.chars().count();
        if self.username.is_empty() {
            errors.add(FIELD_USERNAME, MSG_REQUIRED);
        } else if username_len > USERNAME_MAX_LEN {
            errors.add(FIELD_USERNAME, max_len_message(USERNAME_MAX_LEN, username_len));
        } else if !valid_username(&self.username) {
            errors.add(FIELD_USERNAME, MSG_INVALID_USERNAME);
        }

        let email_len = self.email.chars().count();
        if self.email.is_empty() {
            errors.add(FIELD_EMAIL, MSG_REQUIRED);
        } else if email_len > EMAIL_MAX_LEN {
            errors.add(FIELD_EMAIL, max_len_message(EMAIL_MAX_LEN, email_len));
        } else if !valid_email(&self.email) {
            errors.add(FIELD_EMAIL, MSG_INVALID_EMAIL);
        }

        if self.password.expose_secret().is_empty() {
            errors.add(FIELD_PASSWORD, MSG_REQUIRED);
        }

        errors
    }
}

/// Profile half of the registration form.
#[derive(Debug, Default)]
pub(crate) struct ProfileForm {
    pub(crate) portfolio_site: String,
    pub(crate) profile_pic: Option<UploadedImage>,
}

impl ProfileForm {
    pub(crate) fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();

        if !self.portfolio_site.is_empty() {
            let len = self.portfolio_site.chars().count();
            if len > PORTFOLIO_SITE_MAX_LEN {
                errors.add(FIELD_PORTFOLIO_SITE, max_len_message(PORTFOLIO_SITE_MAX_LEN, len));
            } else if !valid_portfolio_site(&self.portfolio_site) {
                errors.add(FIELD_PORTFOLIO_SITE, MSG_INVALID_URL);
            }
        }

        if self.profile_pic.is_some() && self.profile_pic_kind().is_none() {
            errors.add(FIELD_PROFILE_PIC, MSG_INVALID_IMAGE);
        }

        errors
    }

    pub(crate) fn profile_pic_kind(&self) -> Option<ImageKind> {
        self.profile_pic
            .as_ref()
            .and_then(|image| ImageKind::sniff(&image.bytes))
    }
}

/// Both registration forms as submitted, either urlencoded or multipart.
#[derive(Debug, Default)]
pub(crate) struct RegistrationSubmission {
    pub(crate) user: UserForm,
    pub(crate) profile: ProfileForm,
}

impl RegistrationSubmission {
    fn from_fields(mut fields: HashMap<String, String>, image: Option<UploadedImage>) -> Self {
        let mut take = |name: &str| fields.remove(name).unwrap_or_default().trim().to_string();
        let username = take(FIELD_USERNAME);
        let email = take(FIELD_EMAIL);
        let portfolio_site = take(FIELD_PORTFOLIO_SITE);
        // Passwords are taken verbatim, surrounding whitespace included.
        let password = SecretString::from(fields.remove(FIELD_PASSWORD).unwrap_or_default());

        Self {
            user: UserForm {
                username,
                email,
                password,
            },
            profile: ProfileForm {
                portfolio_site,
                profile_pic: image,
            },
        }
    }

    /// Validate both forms; errors from each are reported together.
    pub(crate) fn validate(&self) -> FieldErrors {
        let mut errors = self.user.validate();
        errors.merge(self.profile.validate());
        errors
    }
}

#[async_trait]
impl<S> FromRequest<S> for RegistrationSubmission
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if !is_multipart {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            return Ok(Self::from_fields(fields, None));
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let mut fields = HashMap::new();
        let mut image = None;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(IntoResponse::into_response)?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == FIELD_PROFILE_PIC {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(IntoResponse::into_response)?;
                // Browsers send an empty part when no file was chosen.
                if !bytes.is_empty() {
                    image = Some(UploadedImage { file_name, bytes });
                }
            } else {
                let value = field.text().await.map_err(IntoResponse::into_response)?;
                fields.insert(name, value);
            }
        }

        debug!("multipart registration with image: {:?}", image);

        Ok(Self::from_fields(fields, image))
    }
}

/// Credentials posted to `/login`.
#[derive(Deserialize, ToSchema)]
pub struct LoginForm {
    #[serde(default)]
    pub(crate) username: String,
    #[serde(default)]
    pub(crate) password: String,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;

    fn user_form(username: &str, email: &str, password: &str) -> UserForm {
        UserForm {
            username: username.to_string(),
            email: email.to_string(),
            password: SecretString::from(password.to_string()),
        }
    }

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn valid_user_form_has_no_errors() {
        let form = user_form("alice", "alice@example.com", "s3cret");
        assert!(form.validate().is_empty());
    }

    #[test]
    fn missing_user_fields_are_required() {
        let errors = UserForm::default().validate();
        assert_eq!(errors.get(FIELD_USERNAME), [MSG_REQUIRED]);
        assert_eq!(errors.get(FIELD_EMAIL), [MSG_REQUIRED]);
        assert_eq!(errors.get(FIELD_PASSWORD), [MSG_REQUIRED]);
    }

    #[test]
    fn username_rejects_spaces_and_symbols() {
        assert_eq!(
            user_form("bad name", "a@example.com", "pw")
                .validate()
                .get(FIELD_USERNAME),
            [MSG_INVALID_USERNAME]
        );
        assert_eq!(
            user_form("bad#name", "a@example.com", "pw")
                .validate()
                .get(FIELD_USERNAME),
            [MSG_INVALID_USERNAME]
        );
        assert!(user_form("a.b@c+d-e_f", "a@example.com", "pw")
            .validate()
            .is_empty());
    }

    #[test]
    fn username_length_is_capped() {
        let long = "a".repeat(151);
        let errors = user_form(&long, "a@example.com", "pw").validate();
        assert_eq!(
            errors.get(FIELD_USERNAME),
            ["Ensure this value has at most 150 characters (it has 151)."]
        );
        assert!(user_form(&"a".repeat(150), "a@example.com", "pw")
            .validate()
            .is_empty());
    }

    #[test]
    fn email_must_be_well_formed() {
        for email in ["not-an-email", "missing-domain@", "a@b", "a b@example.com"] {
            let errors = user_form("alice", email, "pw").validate();
            assert_eq!(errors.get(FIELD_EMAIL), [MSG_INVALID_EMAIL], "{email}");
        }
    }

    #[test]
    fn portfolio_site_is_optional_but_must_be_http_url() {
        let mut profile = ProfileForm::default();
        assert!(profile.validate().is_empty());

        profile.portfolio_site = "https://alice.dev".to_string();
        assert!(profile.validate().is_empty());

        profile.portfolio_site = "ftp://alice.dev".to_string();
        assert_eq!(profile.validate().get(FIELD_PORTFOLIO_SITE), [MSG_INVALID_URL]);

        profile.portfolio_site = "alice dot dev".to_string();
        assert_eq!(profile.validate().get(FIELD_PORTFOLIO_SITE), [MSG_INVALID_URL]);
    }

    #[test]
    fn profile_pic_must_be_an_image() {
        let mut profile = ProfileForm {
            portfolio_site: String::new(),
            profile_pic: Some(UploadedImage {
                file_name: Some("notes.txt".to_string()),
                bytes: Bytes::from_static(b"plain text"),
            }),
        };
        assert_eq!(profile.validate().get(FIELD_PROFILE_PIC), [MSG_INVALID_IMAGE]);

        profile.profile_pic = Some(UploadedImage {
            file_name: Some("me.gif".to_string()),
            bytes: Bytes::from_static(b"GIF89a\x01\x00\x01\x00"),
        });
        assert!(profile.validate().is_empty());
        assert_eq!(profile.profile_pic_kind(), Some(ImageKind::Gif));
    }

    #[test]
    fn submission_trims_fields_but_not_password() {
        let submission = RegistrationSubmission::from_fields(
            fields(&[
                ("username", "  alice "),
                ("email", "alice@example.com\n"),
                ("password", " pw "),
                ("portfolio_site", " https://alice.dev "),
            ]),
            None,
        );
        assert_eq!(submission.user.username, "alice");
        assert_eq!(submission.user.email, "alice@example.com");
        assert_eq!(submission.user.password.expose_secret(), " pw ");
        assert_eq!(submission.profile.portfolio_site, "https://alice.dev");
        assert!(submission.validate().is_empty());
    }

    #[test]
    fn submission_reports_errors_from_both_forms() {
        let submission = RegistrationSubmission::from_fields(
            fields(&[("email", "nope"), ("portfolio_site", "nope")]),
            None,
        );
        let errors = submission.validate();
        let fields: Vec<_> = errors.fields().collect();
        assert_eq!(
            fields,
            [FIELD_EMAIL, FIELD_PASSWORD, FIELD_PORTFOLIO_SITE, FIELD_USERNAME]
        );
    }

    #[test]
    fn login_form_debug_hides_password() {
        let form = LoginForm {
            username: "alice".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{form:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }
}
