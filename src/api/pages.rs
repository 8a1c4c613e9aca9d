//! Server-rendered HTML pages.

use axum::response::Html;
use std::fmt::Write;

use super::forms::{
    FieldErrors, ProfileForm, UserForm, FIELD_EMAIL, FIELD_PASSWORD, FIELD_PORTFOLIO_SITE,
    FIELD_PROFILE_PIC, FIELD_USERNAME,
};

pub(crate) const REGISTERED_MESSAGE: &str = "Thank you for registering!";

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n<nav><a href=\"/\">Home</a></nav>\n{body}</body>\n</html>\n",
        escape(title)
    ))
}

fn field_errors(out: &mut String, errors: &FieldErrors, field: &str) {
    let messages = errors.get(field);
    if messages.is_empty() {
        return;
    }
    out.push_str("<ul class=\"errorlist\">");
    for message in messages {
        let _ = write!(out, "<li>{}</li>", escape(message));
    }
    out.push_str("</ul>\n");
}

fn input(out: &mut String, errors: &FieldErrors, label: &str, name: &str, kind: &str, value: &str) {
    field_errors(out, errors, name);
    let _ = writeln!(
        out,
        "<p><label for=\"id_{name}\">{label}</label> <input type=\"{kind}\" name=\"{name}\" id=\"id_{name}\" value=\"{}\"></p>",
        escape(value)
    );
}

/// Landing page; greets the user when a session is present.
pub(crate) fn index(username: Option<&str>) -> Html<String> {
    let body = match username {
        Some(username) => format!(
            "<h1>Welcome, {}!</h1>\n<p><a href=\"/special\">Special</a> | <a href=\"/logout\">Logout</a></p>\n",
            escape(username)
        ),
        None => "<h1>Welcome!</h1>\n<p><a href=\"/register\">Register</a> | <a href=\"/login\">Login</a></p>\n"
            .to_string(),
    };
    layout("Home", &body)
}

/// Registration page with both forms, their errors and submitted values.
pub(crate) fn registration(
    user: &UserForm,
    profile: &ProfileForm,
    errors: &FieldErrors,
    registered: bool,
) -> Html<String> {
    let mut body = String::from("<h1>Register</h1>\n");

    if registered {
        let _ = writeln!(body, "<p class=\"success\">{REGISTERED_MESSAGE}</p>");
        body.push_str("<p><a href=\"/login\">Login</a></p>\n");
        return layout("Register", &body);
    }

    body.push_str(
        "<form method=\"post\" action=\"/register\" enctype=\"multipart/form-data\">\n",
    );
    input(&mut body, errors, "Username", FIELD_USERNAME, "text", &user.username);
    input(&mut body, errors, "Email", FIELD_EMAIL, "email", &user.email);
    // Never echo the password back.
    input(&mut body, errors, "Password", FIELD_PASSWORD, "password", "");
    input(
        &mut body,
        errors,
        "Portfolio site",
        FIELD_PORTFOLIO_SITE,
        "url",
        &profile.portfolio_site,
    );
    field_errors(&mut body, errors, FIELD_PROFILE_PIC);
    let _ = writeln!(
        body,
        "<p><label for=\"id_{FIELD_PROFILE_PIC}\">Profile pic</label> <input type=\"file\" name=\"{FIELD_PROFILE_PIC}\" id=\"id_{FIELD_PROFILE_PIC}\" accept=\"image/*\"></p>"
    );
    body.push_str("<p><input type=\"submit\" value=\"Register\"></p>\n</form>\n");

    layout("Register", &body)
}

pub(crate) fn login() -> Html<String> {
    layout(
        "Login",
        "<h1>Login</h1>\n<form method=\"post\" action=\"/login\">\n\
         <p><label for=\"id_username\">Username</label> <input type=\"text\" name=\"username\" id=\"id_username\"></p>\n\
         <p><label for=\"id_password\">Password</label> <input type=\"password\" name=\"password\" id=\"id_password\"></p>\n\
         <p><input type=\"submit\" value=\"Login\"></p>\n</form>\n",
    )
}
