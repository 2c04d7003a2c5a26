//! Shared encode/decode helpers for SQLite ↔ domain type conversions.

use serde_json::Value;

use crate::persistence::PersistenceError;

// ── metadata ───────────────────────────────────────────────────────────

/// Encode a metadata value into the JSON text stored in `feedback.metadata`.
pub fn encode_metadata(value: &Value) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string(value)?)
}

/// Decode stored metadata text. Text that is not valid JSON is returned as
/// a JSON string holding the raw text.
pub fn decode_metadata(raw: String) -> Value {
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Stored metadata is not valid JSON, returning raw text: {}", e);
            Value::String(raw)
        }
    }
}

// ── rating ─────────────────────────────────────────────────────────────

/// Decode a stored rating. The schema CHECK keeps values in 1..=5; anything
/// else is dropped rather than truncated.
pub fn decode_rating(raw: Option<i64>) -> Option<u8> {
    raw.and_then(|r| u8::try_from(r).ok())
        .filter(|r| (1..=5).contains(r))
}
