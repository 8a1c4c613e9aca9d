//! Password hashing with Argon2id.
//!
//! Hashing is CPU bound, so both entry points run on the blocking pool.

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use tokio::task;

/// Hash a plaintext password into a PHC string (`$argon2id$...`).
pub(crate) async fn hash_password(password: SecretString) -> Result<String> {
    task::spawn_blocking(move || hash_blocking(password.expose_secret()))
        .await
        .context("password hashing task failed")?
}

/// Check a plaintext password against a stored PHC string.
pub(crate) async fn verify_password(password: SecretString, stored_hash: String) -> Result<bool> {
    task::spawn_blocking(move || verify_blocking(password.expose_secret(), &stored_hash))
        .await
        .context("password verification task failed")?
}

fn hash_blocking(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("failed to hash password: {e}"))?
        .to_string();
    Ok(hash)
}

fn verify_blocking(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|e| anyhow!("invalid stored password hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
