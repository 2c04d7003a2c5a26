//! Async repository trait definitions for the persistence layer.
//!
//! Methods return `impl Future + Send` rather than using `async fn` so that
//! the futures are guaranteed `Send`, which axum handlers and
//! `tokio::spawn` require.

use super::{FeedbackPage, Page, PersistenceError, UserRecord};
use crate::feedback::{FeedbackRecord, NewFeedback};
use std::future::Future;

/// Repository for feedback submissions.
///
/// Identifiers passed to `get_feedback` / `delete_feedback` are validated
/// before any store round-trip; malformed ones yield
/// [`PersistenceError::InvalidId`].
pub trait FeedbackRepository: Send + Sync {
    /// Store a new record, assigning its id and creation time.
    fn create_feedback(
        &self,
        data: &NewFeedback,
    ) -> impl Future<Output = Result<FeedbackRecord, PersistenceError>> + Send;
    /// Newest first; same-timestamp records in reverse insertion order.
    fn list_feedback(
        &self,
        page: Page,
    ) -> impl Future<Output = Result<FeedbackPage, PersistenceError>> + Send;
    fn get_feedback(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<FeedbackRecord>, PersistenceError>> + Send;
    /// Returns `false` when no record had that id.
    fn delete_feedback(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<bool, PersistenceError>> + Send;
}

/// Repository for admin users.
pub trait UserRepository: Send + Sync {
    fn find_user_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, PersistenceError>> + Send;
    fn create_user(
        &self,
        user: &UserRecord,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}
