//! Feedback submission and the admin listing/deletion surface

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::{ApiError, AppState, AuthSession};
use crate::feedback::parse_new_feedback;
use crate::persistence::{FeedbackPage, FeedbackRepository, Page};

/// Largest page a client may request.
pub const MAX_PAGE_SIZE: u32 = 500;

pub const ERR_LIMIT: &str = "limit must be an integer between 1 and 500";
pub const ERR_OFFSET: &str = "offset must be a non-negative integer";

/// Raw listing parameters. Parsed by hand so bad values produce the JSON
/// validation schema rather than a plain-text rejection.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl ListQuery {
    pub fn to_page(&self) -> Result<Page, Vec<String>> {
        let mut errors = Vec::new();

        let limit = match non_empty(&self.limit) {
            None => None,
            Some(raw) => match raw.parse::<u32>() {
                Ok(limit) if (1..=MAX_PAGE_SIZE).contains(&limit) => Some(limit),
                _ => {
                    errors.push(ERR_LIMIT.to_string());
                    None
                }
            },
        };

        let offset = match non_empty(&self.offset) {
            None => 0,
            Some(raw) => raw.parse::<u32>().unwrap_or_else(|_| {
                errors.push(ERR_OFFSET.to_string());
                0
            }),
        };

        if errors.is_empty() {
            Ok(Page { limit, offset })
        } else {
            Err(errors)
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// An undecodable path segment is reported like any other malformed id.
fn record_id(path: Result<Path<String>, PathRejection>) -> Result<String, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|rejection| ApiError::InvalidIdentifier(rejection.body_text()))
}

pub async fn submit(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::InvalidJson(rejection.body_text())
        }
    })?;

    let new = parse_new_feedback(&payload).map_err(|errors| {
        tracing::debug!(count = errors.len(), "Feedback rejected by validation");
        ApiError::Validation(errors)
    })?;

    let record = state.feedback.create_feedback(&new).await?;
    tracing::info!(id = %record.id, "Feedback stored");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "id": record.id })),
    ))
}

pub async fn list(
    _session: AuthSession,
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<FeedbackPage>, ApiError> {
    let Query(query) =
        query.map_err(|rejection| ApiError::Validation(vec![rejection.body_text()]))?;
    let page = query.to_page().map_err(ApiError::Validation)?;

    let result = state.feedback.list_feedback(page).await?;
    tracing::debug!(count = result.count, returned = result.feedback.len(), "Listed feedback");
    Ok(Json(result))
}

pub async fn get_one(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let id = record_id(path)?;
    let record = state
        .feedback
        .get_feedback(&id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(json!({ "feedback": record })))
}

pub async fn delete(
    AuthSession(active): AuthSession,
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let id = record_id(path)?;
    if !state.feedback.delete_feedback(&id).await? {
        return Err(ApiError::NotFound);
    }
    tracing::info!(id = %id, username = %active.session.username, "Feedback deleted");
    Ok(Json(json!({ "success": true })))
}
