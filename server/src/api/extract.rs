use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::{ApiError, AppState};
use crate::auth::ActiveSession;

/// Extractor for privileged routes. Rejects anonymous requests with 401
/// before the handler body runs.
pub struct AuthSession(pub ActiveSession);

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match state.auth.authenticate(&parts.headers).await {
            Some(active) => Ok(AuthSession(active)),
            None => {
                tracing::debug!(path = %parts.uri.path(), "Rejected anonymous request");
                Err(ApiError::Unauthorized)
            }
        }
    }
}
