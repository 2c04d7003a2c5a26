//! Pure checks on submitted feedback payloads.
//!
//! Every rule runs independently and all violations are reported, in the
//! order the rules are declared below.

use serde_json::{Map, Value};

use super::NewFeedback;

pub const MESSAGE_MIN_CHARS: usize = 3;
pub const NAME_MAX_CHARS: usize = 100;
pub const EMAIL_MAX_CHARS: usize = 254;
pub const COMPANY_MAX_CHARS: usize = 200;
pub const RATING_MIN: i64 = 1;
pub const RATING_MAX: i64 = 5;

pub const ERR_NOT_OBJECT: &str = "payload must be a JSON object";
pub const ERR_MESSAGE: &str = "message is required and must be at least 3 characters";
pub const ERR_NAME: &str = "name must be a string of at most 100 characters";
pub const ERR_EMAIL: &str = "email must be a string of at most 254 characters";
pub const ERR_COMPANY: &str = "company must be a string of at most 200 characters";
pub const ERR_RATING: &str = "rating must be an integer between 1 and 5";

/// Optional text fields with their limits and messages, in rule order.
const OPTIONAL_TEXT_FIELDS: [(&str, usize, &str); 3] = [
    ("name", NAME_MAX_CHARS, ERR_NAME),
    ("email", EMAIL_MAX_CHARS, ERR_EMAIL),
    ("company", COMPANY_MAX_CHARS, ERR_COMPANY),
];

struct Invalid;

/// Check a raw payload. An empty list means it is valid.
pub fn validate(payload: &Value) -> Vec<String> {
    let Some(fields) = payload.as_object() else {
        return vec![ERR_NOT_OBJECT.to_string()];
    };

    let mut errors = Vec::new();

    if message_text(fields.get("message")).is_err() {
        errors.push(ERR_MESSAGE.to_string());
    }

    for (key, max_chars, error) in OPTIONAL_TEXT_FIELDS {
        if optional_text(fields.get(key), max_chars).is_err() {
            errors.push(error.to_string());
        }
    }

    if rating_value(fields.get("rating")).is_err() {
        errors.push(ERR_RATING.to_string());
    }

    errors
}

/// Validate and normalize a payload into a [`NewFeedback`].
pub fn parse_new_feedback(payload: &Value) -> Result<NewFeedback, Vec<String>> {
    let errors = validate(payload);
    if !errors.is_empty() {
        return Err(errors);
    }

    let Some(fields) = payload.as_object() else {
        return Err(vec![ERR_NOT_OBJECT.to_string()]);
    };

    let message = message_text(fields.get("message")).map_err(|_| vec![ERR_MESSAGE.to_string()])?;

    Ok(NewFeedback {
        name: text_field(fields, "name", NAME_MAX_CHARS),
        email: text_field(fields, "email", EMAIL_MAX_CHARS),
        company: text_field(fields, "company", COMPANY_MAX_CHARS),
        message,
        rating: rating_value(fields.get("rating")).ok().flatten(),
        metadata: fields.get("metadata").filter(|v| !v.is_null()).cloned(),
    })
}

fn text_field(fields: &Map<String, Value>, key: &str, max_chars: usize) -> Option<String> {
    optional_text(fields.get(key), max_chars).ok().flatten()
}

fn message_text(value: Option<&Value>) -> Result<String, Invalid> {
    match value {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.chars().count() >= MESSAGE_MIN_CHARS {
                Ok(trimmed.to_string())
            } else {
                Err(Invalid)
            }
        }
        _ => Err(Invalid),
    }
}

/// Absent, null and blank strings all normalize to `None`.
fn optional_text(value: Option<&Value>, max_chars: usize) -> Result<Option<String>, Invalid> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.chars().count() > max_chars {
                Err(Invalid)
            } else if trimmed.is_empty() {
                Ok(None)
            } else {
                Ok(Some(trimmed.to_string()))
            }
        }
        Some(_) => Err(Invalid),
    }
}

/// Integral numbers and integral numeric strings are accepted; anything
/// fractional or out of range is rejected rather than rounded or clamped.
fn rating_value(value: Option<&Value>) -> Result<Option<u8>, Invalid> {
    let candidate = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => number_to_integer(n.as_i64(), n.as_f64()),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            number_to_integer(s.parse::<i64>().ok(), s.parse::<f64>().ok())
        }
        Some(_) => None,
    };

    match candidate {
        Some(rating) if (RATING_MIN..=RATING_MAX).contains(&rating) => Ok(Some(rating as u8)),
        _ => Err(Invalid),
    }
}

fn number_to_integer(as_int: Option<i64>, as_float: Option<f64>) -> Option<i64> {
    if as_int.is_some() {
        return as_int;
    }
    as_float
        .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() <= i64::MAX as f64)
        .map(|f| f as i64)
}
