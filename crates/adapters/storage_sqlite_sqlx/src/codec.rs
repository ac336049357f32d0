//! Column encoding shared by the repositories.
//!
//! Ids are stored as hyphenated UUID strings, payloads as JSON text and
//! timestamps as fixed-width RFC 3339 strings with microseconds, so that
//! comparing the text compares the instants.

use std::str::FromStr;

use chrono::SecondsFormat;

use areaflow_domain::payload::{Payload, Value};
use areaflow_domain::time::Timestamp;

use crate::error::StorageError;

pub(crate) fn encode_ts(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn encode_payload(payload: &Payload) -> Result<String, StorageError> {
    Ok(serde_json::to_string(payload)?)
}

pub(crate) fn encode_value(value: &Value) -> Result<String, StorageError> {
    Ok(serde_json::to_string(value)?)
}

fn decode_error(err: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}

pub(crate) fn decode_id<T>(raw: &str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    T::from_str(raw).map_err(decode_error)
}

pub(crate) fn decode_opt_id<T>(raw: Option<String>) -> Result<Option<T>, sqlx::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.as_deref().map(decode_id).transpose()
}

pub(crate) fn decode_ts(raw: &str) -> Result<Timestamp, sqlx::Error> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.to_utc())
        .map_err(decode_error)
}

pub(crate) fn decode_opt_ts(raw: Option<String>) -> Result<Option<Timestamp>, sqlx::Error> {
    raw.as_deref().map(decode_ts).transpose()
}

pub(crate) fn decode_payload(raw: &str) -> Result<Payload, sqlx::Error> {
    serde_json::from_str(raw).map_err(decode_error)
}

pub(crate) fn decode_opt_payload(raw: Option<String>) -> Result<Option<Payload>, sqlx::Error> {
    raw.as_deref().map(decode_payload).transpose()
}

pub(crate) fn decode_opt_value(raw: Option<String>) -> Result<Option<Value>, sqlx::Error> {
    raw.as_deref()
        .map(|raw| serde_json::from_str(raw).map_err(decode_error))
        .transpose()
}
