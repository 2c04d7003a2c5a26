//! Route handlers organized by domain

pub mod auth;
pub mod feedback;
pub mod health;

use super::ApiError;

/// Fallback for unmatched paths.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
