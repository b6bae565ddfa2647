//! Column encoding shared by the repositories.
//!
//! Timestamps are stored as fixed-width RFC 3339 text (microseconds, `Z`)
//! so that SQL string comparison orders them chronologically.

use autorule_domain::time::Timestamp;
use chrono::SecondsFormat;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StorageError;

pub(crate) fn encode_ts(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_ts(text: &str) -> Result<Timestamp, sqlx::Error> {
    chrono::DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.to_utc())
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

pub(crate) fn decode_opt_ts(text: Option<String>) -> Result<Option<Timestamp>, sqlx::Error> {
    text.as_deref().map(decode_ts).transpose()
}

pub(crate) fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StorageError> {
    Ok(serde_json::to_string(value)?)
}

pub(crate) fn decode_json<T: DeserializeOwned>(text: &str) -> Result<T, sqlx::Error> {
    serde_json::from_str(text).map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

/// Decode a unit enum from its serde string form (`"all"`, `"completed"`…).
pub(crate) fn decode_tag<T: DeserializeOwned>(tag: String) -> Result<T, sqlx::Error> {
    serde_json::from_value(serde_json::Value::String(tag))
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))
}
