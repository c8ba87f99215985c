//! Domain model for pinned-note projects.
//!
//! # Responsibility
//! - Define the canonical records shared by editing, import and storage.
//! - Normalize legacy wire shapes once, at deserialization time.
//!
//! # Invariants
//! - A note carries exactly one placement kind, matching its project type.
//! - Image fields are always `ImageSource` values, never raw strings.
//!
//! # See also
//! - bundle for the external file shape.

pub mod connection;
pub mod frame;
pub mod image;
pub mod note;
pub mod project;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in Unix epoch milliseconds.
///
/// Returns `0` when the system clock reports a time before the epoch.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

/// Accepts string or numeric identifiers; older exports used `Date.now()` ids.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(value) => Ok(value),
        Value::Number(value) => Ok(value.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "identifier must be a string or number, got {other}"
        ))),
    }
}

/// Same as [`deserialize_id`] for optional reference fields.
pub(crate) fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = deserialize_id(deserializer)?;
    if value.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(value))
    }
}

/// Timestamps may carry a fractional jitter component; rounds to whole ms.
pub(crate) fn deserialize_epoch_ms<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.filter(|ms| ms.is_finite()).map(|ms| ms.round() as i64))
}

/// Like [`deserialize_epoch_ms`] but falls back to the current time.
pub(crate) fn deserialize_epoch_ms_or_now<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_epoch_ms(deserializer)?.unwrap_or_else(now_epoch_ms))
}
