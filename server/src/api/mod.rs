//! HTTP surface: router, shared state and error mapping
//!
//! This module wires the handlers under [`endpoints`] into an axum router:
//! - error: `ApiError` and the JSON error schema
//! - extract: the `AuthSession` gate for privileged routes
//! - endpoints: handlers grouped by domain

pub mod endpoints;
mod error;
mod extract;

pub use error::{attach_details, ApiError, ErrorBody};
pub use extract::AuthSession;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthService, CookieSigner, SessionRegistry};
use crate::config::Environment;
use crate::persistence::{SqliteFeedbackRepository, SqliteUserRepository};
use crate::storage::SqliteStorage;
use endpoints::{auth, feedback, health};

/// Upper bound on handling one request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest accepted request body.
pub const BODY_LIMIT_BYTES: usize = 64 * 1024;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub storage: SqliteStorage,
    pub feedback: SqliteFeedbackRepository,
    pub auth: Arc<AuthService<SqliteUserRepository>>,
    pub environment: Environment,
}

impl AppState {
    /// Build the state around one storage manager. Repositories share its
    /// handle; nothing connects until the first request needs it.
    pub fn new(
        storage: SqliteStorage,
        sessions: SessionRegistry,
        signer: CookieSigner,
        environment: Environment,
    ) -> Self {
        let users = SqliteUserRepository::new(storage.clone());
        Self {
            feedback: SqliteFeedbackRepository::new(storage.clone()),
            auth: Arc::new(AuthService::new(users, sessions, signer)),
            storage,
            environment,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/api/feedback", post(feedback::submit).get(feedback::list))
        .route(
            "/api/feedback/{id}",
            get(feedback::get_one).delete(feedback::delete),
        )
        .route("/api/admin/feedback", get(feedback::list))
        .route("/api/admin/feedback/{id}", delete(feedback::delete))
        .route("/api/login", post(auth::login))
        .route("/api/logout", post(auth::logout))
        .route("/api/auth/check", get(auth::check))
        .route("/api/health", get(health::health))
        .fallback(endpoints::not_found)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES));

    if !state.environment.is_production() {
        router = router.layer(middleware::map_response(attach_details));
    }

    router
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
