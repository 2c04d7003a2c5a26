//! SQLite-backed repository implementations.
//!
//! ## Database access
//!
//! Repositories never hold a pool directly. Each one keeps a clone of the
//! shared [`SqliteStorage`] manager and acquires the handle per operation,
//! so the first query of the process is what dials the database and a
//! failed connection is retried by the next request.
//!
//! ## Repository types
//!
//! | Type | Trait |
//! |------|-------|
//! | [`SqliteFeedbackRepository`] | `FeedbackRepository` |
//! | [`SqliteUserRepository`] | `UserRepository` |
//!
//! `metadata` is stored as JSON text and decoded through the helpers in
//! [`helpers`]; undecodable text comes back as a JSON string instead of an
//! error.

mod feedback_repo;
mod user_repo;
pub(crate) mod helpers;

pub use feedback_repo::SqliteFeedbackRepository;
pub use user_repo::SqliteUserRepository;
