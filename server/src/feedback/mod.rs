//! Feedback records and submission payloads.

pub mod validation;

pub use validation::{parse_new_feedback, validate};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One persisted feedback submission, in API shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub message: String,
    pub rating: Option<u8>,
    pub metadata: Option<Value>,
    /// Unix timestamp in milliseconds, assigned by the server.
    pub created_at: u64,
}

/// A validated, normalized submission ready to be stored.
///
/// Text fields are trimmed and empty optional fields are `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewFeedback {
    pub name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub message: String,
    pub rating: Option<u8>,
    pub metadata: Option<Value>,
}

impl FeedbackRecord {
    pub fn from_new(id: String, created_at: u64, new: &NewFeedback) -> Self {
        Self {
            id,
            name: new.name.clone(),
            email: new.email.clone(),
            company: new.company.clone(),
            message: new.message.clone(),
            rating: new.rating,
            metadata: new.metadata.clone(),
            created_at,
        }
    }

    /// The submitted content, without server-assigned fields.
    pub fn content(&self) -> NewFeedback {
        NewFeedback {
            name: self.name.clone(),
            email: self.email.clone(),
            company: self.company.clone(),
            message: self.message.clone(),
            rating: self.rating,
            metadata: self.metadata.clone(),
        }
    }
}
