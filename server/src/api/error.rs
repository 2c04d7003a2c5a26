//! JSON error schema for the HTTP surface.
//!
//! Every failure renders as `{"error": <code>, "errors"?: [...]}`. Outside
//! production, [`attach_details`] additionally copies the server-side cause
//! into a `details` field.

use axum::body::Body;
use axum::http::header::CONTENT_LENGTH;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::AuthError;
use crate::persistence::PersistenceError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("invalid JSON body: {0}")]
    InvalidJson(String),
    #[error("request body too large")]
    PayloadTooLarge,
    #[error("not found")]
    NotFound,
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side cause carried alongside an error response.
#[derive(Debug, Clone)]
struct ErrorDetails(String);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::InvalidJson(_)
            | ApiError::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::StorageUnavailable(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_failed",
            ApiError::InvalidJson(_) => "invalid_json",
            ApiError::PayloadTooLarge => "payload_too_large",
            ApiError::NotFound => "not_found",
            ApiError::Unauthorized => "unauthorized",
            ApiError::InvalidCredentials => "invalid_credentials",
            ApiError::InvalidIdentifier(_) => "invalid_id",
            ApiError::StorageUnavailable(_) => "storage_unavailable",
            ApiError::Internal(_) => "internal_server_error",
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            ApiError::InvalidJson(cause)
            | ApiError::StorageUnavailable(cause)
            | ApiError::Internal(cause) => Some(cause.clone()),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = ErrorBody {
            error: self.code(),
            errors: match &self {
                ApiError::Validation(errors) => Some(errors.clone()),
                _ => None,
            },
            details: None,
        };

        let mut response = (status, Json(body.clone())).into_response();
        if let Some(details) = self.details() {
            response.extensions_mut().insert(body);
            response.extensions_mut().insert(ErrorDetails(details));
        }
        response
    }
}

impl From<PersistenceError> for ApiError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::InvalidId(id) => ApiError::InvalidIdentifier(id),
            PersistenceError::Storage(e) => ApiError::StorageUnavailable(e.to_string()),
            // The connection was lost after it had been established
            PersistenceError::Sqlx(
                e @ (sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)),
            ) => ApiError::StorageUnavailable(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::InvalidInput(_) => {
                ApiError::InvalidCredentials
            }
            AuthError::Persistence(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Response middleware that re-renders error bodies with their `details`.
/// Only installed outside production.
pub async fn attach_details(mut response: Response) -> Response {
    let Some(ErrorDetails(details)) = response.extensions_mut().remove::<ErrorDetails>() else {
        return response;
    };
    let Some(mut body) = response.extensions_mut().remove::<ErrorBody>() else {
        return response;
    };
    body.details = Some(details);

    let bytes = match serde_json::to_vec(&body) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to render error details: {}", e);
            return response;
        }
    };
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}
