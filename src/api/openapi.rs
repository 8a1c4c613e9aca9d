use super::{
    forms::LoginForm,
    handlers::{
        health::{self, Health},
        special, user_login,
        users::{self, UserList, UserSummary},
    },
};
use utoipa::{
    openapi::{Contact, InfoBuilder, License, Tag},
    OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        user_login::login,
        special::special,
        users::list_users
    ),
    components(schemas(Health, LoginForm, UserList, UserSummary))
)]
struct ApiDoc;

/// `OpenAPI` document for the JSON and plain-text endpoints.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();

    // Use Cargo.toml metadata instead of the utoipa crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();
    info.contact = cargo_contact();
    info.license = cargo_license();
    doc.info = info;

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Login and session-gated endpoints".to_string());
    let mut users_tag = Tag::new("users");
    users_tag.description = Some("Registered users".to_string());
    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Build info and database reachability".to_string());
    doc.tags = Some(vec![auth_tag, users_tag, health_tag]);

    doc
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => (
            non_empty(name.trim()),
            non_empty(email.trim_end_matches('>').trim()),
        ),
        None => (non_empty(author.trim()), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let doc = openapi();
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            doc.info.description.as_deref(),
            Some(env!("CARGO_PKG_DESCRIPTION"))
        );

        let contact = doc.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("Team Authly"));
            assert_eq!(contact.email.as_deref(), Some("team@authly.dev"));
        }

        let license = doc.info.license;
        assert!(license.is_some_and(|license| license.name == "BSD-3-Clause"));
    }

    #[test]
    fn openapi_documents_json_and_text_endpoints() {
        let doc = openapi();
        for path in ["/health", "/login", "/special", "/users.json"] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }
        assert!(!doc.paths.paths.contains_key("/register"));

        let tags = doc.tags.unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "auth"));
    }

    #[test]
    fn parse_author_variants() {
        assert_eq!(
            parse_author("Jane Doe <jane@example.com>"),
            (Some("Jane Doe"), Some("jane@example.com"))
        );
        assert_eq!(parse_author("Jane Doe"), (Some("Jane Doe"), None));
        assert_eq!(
            parse_author("<jane@example.com>"),
            (None, Some("jane@example.com"))
        );
    }
}
