//! # Authly
//!
//! `authly` is a small account service: people register with a username,
//! email and password (plus an optional portfolio link and profile picture),
//! log in to obtain a session cookie, and log out again.
//!
//! ## Accounts
//!
//! - **Users** carry a unique username, an email and an Argon2id password hash.
//!   Plaintext passwords are held in `SecretString` and never stored or logged.
//! - **Profiles** extend a user one-to-one. A user and its profile are created
//!   in a single transaction, so neither exists without the other.
//!
//! ## Sessions
//!
//! A successful login stores the SHA-256 of a random token in `user_sessions`
//! and hands the raw token to the client in the `authly_session` cookie.
//! Protected routes resolve the cookie through the session store and redirect
//! anonymous callers to `/login`.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
