//! Login, logout and session check

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::{ApiError, AppState, AuthSession};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthCheckResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    // A malformed body is indistinguishable from bad credentials
    let Json(request) = payload.map_err(|_| ApiError::InvalidCredentials)?;

    let success = state.auth.login(&request.username, &request.password).await?;
    Ok((
        [(SET_COOKIE, success.set_cookie)],
        Json(json!({ "success": true, "username": success.username })),
    )
        .into_response())
}

pub async fn logout(State(state): State<AppState>, AuthSession(active): AuthSession) -> Response {
    tracing::info!(username = %active.session.username, "Logout");
    let cleared = state.auth.logout(&active.token).await;
    ([(SET_COOKIE, cleared)], Json(json!({ "success": true }))).into_response()
}

pub async fn check(State(state): State<AppState>, headers: HeaderMap) -> Json<AuthCheckResponse> {
    let username = state
        .auth
        .authenticate(&headers)
        .await
        .map(|active| active.session.username);

    Json(AuthCheckResponse {
        authenticated: username.is_some(),
        username,
    })
}
