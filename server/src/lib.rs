//! Feedback collection service.
//!
//! A public form submits short reviews and an authenticated admin surface
//! lists and deletes them. The crate is split the same way requests flow:
//!
//! - [`api`]: axum router, handlers and the JSON error schema
//! - [`auth`]: password hashing, session registry and signed cookies
//! - [`feedback`]: record types and payload validation
//! - [`persistence`]: repository traits and their SQLite implementations
//! - [`storage`]: the lazily connected, process-wide storage handle
//! - [`config`]: environment-driven configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod feedback;
pub mod persistence;
pub mod storage;

use std::time::{SystemTime, UNIX_EPOCH};

/// Get the current unix timestamp in milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
