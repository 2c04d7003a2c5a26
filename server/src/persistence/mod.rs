pub mod sqlite;
mod traits;

pub use sqlite::{SqliteFeedbackRepository, SqliteUserRepository};
pub use traits::{FeedbackRepository, UserRepository};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::feedback::FeedbackRecord;
use crate::storage::StorageError;

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Storage unavailable: {0}")]
    Storage(#[from] StorageError),
    #[error("Invalid identifier: {0}")]
    InvalidId(String),
    #[error("Username already exists: {0}")]
    DuplicateUser(String),
}

/// Limit and offset for listing. `limit: None` returns everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<u32>,
    pub offset: u32,
}

/// One page of feedback plus the total number of stored records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackPage {
    pub count: u64,
    pub feedback: Vec<FeedbackRecord>,
}

/// Stored admin principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: u64,
}

/// Validate an identifier's syntax and return its canonical text form.
///
/// Accepts any UUID spelling `uuid` parses (hyphenated, simple, braced, urn)
/// so lookups do not depend on how the client formatted it.
pub fn parse_record_id(id: &str) -> Result<String, PersistenceError> {
    Uuid::parse_str(id.trim())
        .map(|uuid| uuid.hyphenated().to_string())
        .map_err(|_| PersistenceError::InvalidId(id.to_string()))
}

/// Generate a fresh record identifier.
pub fn generate_record_id() -> String {
    Uuid::new_v4().hyphenated().to_string()
}
