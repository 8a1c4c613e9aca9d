//! Database helpers for accounts and sessions.

use anyhow::{anyhow, Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};
use std::{str::FromStr, time::Duration};
use tracing::{debug, Instrument};

use super::utils::{
    generate_session_token, hash_session_token, is_unique_violation, now_unix_seconds,
};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

/// Outcome when attempting to create a new user + profile.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SignupOutcome {
    Created(i64),
    Conflict,
}

/// Validated fields for a new user and its profile.
pub(crate) struct NewAccount<'a> {
    pub(crate) username: &'a str,
    pub(crate) email: &'a str,
    pub(crate) password_hash: &'a str,
    pub(crate) portfolio_site: &'a str,
    pub(crate) profile_pic: Option<&'a str>,
}

/// Minimal fields needed to check a login.
pub(crate) struct LoginRecord {
    pub(crate) user_id: i64,
    pub(crate) password_hash: String,
    pub(crate) is_active: bool,
}

/// Minimal data returned for a valid session cookie.
pub(crate) struct SessionRecord {
    pub(crate) user_id: i64,
    pub(crate) username: String,
}

pub(crate) struct UserListing {
    pub(crate) email: String,
    pub(crate) username: String,
}

/// Open the database and apply the schema.
///
/// In-memory databases live as long as their connection, so they get a single
/// connection that never idles out.
///
/// # Errors
/// Returns an error if the DSN is invalid, the database cannot be opened or
/// the schema fails to apply.
pub async fn connect(dsn: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(dsn)
        .with_context(|| format!("Invalid database DSN: {dsn}"))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool_options = if dsn.contains(":memory:") {
        SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    migrate(&pool).await?;

    Ok(pool)
}

async fn migrate(pool: &SqlitePool) -> Result<()> {
    for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
    }

    debug!("database schema applied");

    Ok(())
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

/// Insert a user and its profile in one transaction.
///
/// A duplicate username rolls back and reports `Conflict`; no profile is
/// written unless the user row was.
pub(crate) async fn insert_user_and_profile(
    pool: &SqlitePool,
    account: &NewAccount<'_>,
) -> Result<SignupOutcome> {
    let mut tx = pool.begin().await.context("begin signup transaction")?;

    let query = r"
        INSERT INTO users (username, email, password, is_active, date_joined)
        VALUES ($1, $2, $3, 1, $4)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(account.username)
        .bind(account.email)
        .bind(account.password_hash)
        .bind(now_unix_seconds())
        .fetch_one(&mut *tx)
        .instrument(span)
        .await;

    let user_id: i64 = match row {
        Ok(row) => row.get("id"),
        Err(err) => {
            if is_unique_violation(&err) {
                let _ = tx.rollback().await;
                return Ok(SignupOutcome::Conflict);
            }
            return Err(err).context("failed to insert user");
        }
    };

    let query = r"
        INSERT INTO user_profiles (user_id, portfolio_site, profile_pic)
        VALUES ($1, $2, $3)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(account.portfolio_site)
        .bind(account.profile_pic)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert user profile")?;

    tx.commit().await.context("commit signup transaction")?;

    Ok(SignupOutcome::Created(user_id))
}

/// Look up login data by username.
pub(crate) async fn lookup_login_record(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<LoginRecord>> {
    let query = "SELECT id, password, is_active FROM users WHERE username = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(username)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup login record")?;

    Ok(row.map(|row| LoginRecord {
        user_id: row.get("id"),
        password_hash: row.get("password"),
        is_active: row.get("is_active"),
    }))
}

pub(crate) async fn record_login(pool: &SqlitePool, user_id: i64) -> Result<()> {
    let query = "UPDATE users SET last_login = $1 WHERE id = $2";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(now_unix_seconds())
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to record last login")?;
    Ok(())
}

pub(crate) async fn insert_session(
    pool: &SqlitePool,
    user_id: i64,
    ttl_seconds: i64,
) -> Result<String> {
    // Generate a random token, store only its hash, and return the raw value
    // so the caller can set the session cookie.
    let query = r"
        INSERT INTO user_sessions (session_hash, user_id, created_at, expires_at)
        VALUES ($1, $2, $3, $4)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_session_token()?;
        let token_hash = hash_session_token(&token);
        let now = now_unix_seconds();
        let result = sqlx::query(query)
            .bind(token_hash)
            .bind(user_id)
            .bind(now)
            .bind(now.saturating_add(ttl_seconds))
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert session"),
        }
    }

    Err(anyhow!("failed to generate unique session token"))
}

pub(crate) async fn lookup_session(
    pool: &SqlitePool,
    token_hash: &[u8],
) -> Result<Option<SessionRecord>> {
    // Only accept active users and unexpired sessions.
    let query = r"
        SELECT users.id, users.username
        FROM user_sessions
        JOIN users ON users.id = user_sessions.user_id
        WHERE user_sessions.session_hash = $1
          AND user_sessions.expires_at > $2
          AND users.is_active = 1
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .bind(now_unix_seconds())
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup session")?;

    Ok(row.map(|row| SessionRecord {
        user_id: row.get("id"),
        username: row.get("username"),
    }))
}

pub(crate) async fn delete_session(pool: &SqlitePool, token_hash: &[u8]) -> Result<()> {
    let query = "DELETE FROM user_sessions WHERE session_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete session")?;
    Ok(())
}

/// Remove every expired session, returning how many were deleted.
pub(crate) async fn purge_expired_sessions(pool: &SqlitePool) -> Result<u64> {
    let query = "DELETE FROM user_sessions WHERE expires_at <= $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(now_unix_seconds())
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to purge expired sessions")?;
    Ok(result.rows_affected())
}

/// Every user's email and username, in storage order.
pub(crate) async fn list_users(pool: &SqlitePool) -> Result<Vec<UserListing>> {
    let query = "SELECT email, username FROM users ORDER BY id";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list users")?;

    Ok(rows
        .into_iter()
        .map(|row| UserListing {
            email: row.get("email"),
            username: row.get("username"),
        })
        .collect())
}
