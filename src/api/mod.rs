use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Extension, MatchedPath},
    http::{HeaderName, HeaderValue, Request},
    routing::get,
    Router,
};
use sqlx::SqlitePool;
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, services::ServeDir, set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug, error, info, info_span, Span};
use ulid::Ulid;

pub(crate) mod forms;
pub(crate) mod handlers;
pub(crate) mod media;
pub(crate) mod pages;
pub(crate) mod password;
pub mod session;
mod state;
pub mod storage;
pub(crate) mod utils;
// OpenAPI document for the JSON and plain-text routes; printed by the `openapi` binary.
mod openapi;

pub use openapi::openapi;
pub use session::CurrentUser;
pub use state::{AuthConfig, AuthState};

use handlers::{health, index, special, user_login, user_logout, user_register, users};

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Build the application router with every route and middleware layer.
#[must_use]
pub fn router(pool: SqlitePool, auth_state: Arc<AuthState>) -> Router {
    let media = ServeDir::new(auth_state.config().media_root());

    Router::new()
        .route("/", get(index::index))
        .route(
            "/register",
            get(user_register::register_form).post(user_register::register),
        )
        .route(
            "/login",
            get(user_login::login_form).post(user_login::login),
        )
        .route("/logout", get(user_logout::logout))
        .route("/special", get(special::special))
        .route("/users.json", get(users::list_users))
        .route("/health", get(health::health))
        .nest_service("/media", media)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
                .layer(Extension(auth_state))
                .layer(Extension(pool)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: &str, auth_config: AuthConfig) -> Result<()> {
    let pool = storage::connect(dsn).await?;

    tokio::fs::create_dir_all(auth_config.media_root())
        .await
        .with_context(|| {
            format!(
                "Failed to create media root {}",
                auth_config.media_root().display()
            )
        })?;

    let auth_state = Arc::new(AuthState::new(auth_config));

    spawn_session_purge(pool.clone());

    let app = router(pool, auth_state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Delete expired sessions periodically for the lifetime of the server.
fn spawn_session_purge(pool: SqlitePool) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match storage::purge_expired_sessions(&pool).await {
                Ok(0) => {}
                Ok(purged) => debug!("Purged {purged} expired sessions"),
                Err(err) => error!("Failed to purge expired sessions: {err:#}"),
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
