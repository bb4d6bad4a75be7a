//! Lenient field decoders for the backend's JSON.
//!
//! The backend is PHP-flavoured: numbers arrive as strings, booleans as `0`/`1`
//! or `"1"`, absent values as `null` or `""`. These helpers are used through
//! `#[serde(deserialize_with = ...)]` on the identity types.

use serde::de::{DeserializeOwned, Error};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Numeric identifier encoded as a JSON number or a numeric string.
pub fn flexible_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| D::Error::custom(format!("identifier out of range: {}", n))),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| D::Error::custom(format!("identifier is not numeric: {:?}", s))),
        other => Err(D::Error::custom(format!(
            "expected numeric identifier, found {}",
            other
        ))),
    }
}

/// Boolean flag encoded as `true`, `1`, `"1"`, `"true"` and their negatives.
/// `null` reads as `false`.
pub fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::Null => Ok(false),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|v| v != 0.0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "sim" | "s" => Ok(true),
            "0" | "false" | "nao" | "não" | "n" | "" => Ok(false),
            other => Err(D::Error::custom(format!("not a boolean flag: {:?}", other))),
        },
        other => Err(D::Error::custom(format!("not a boolean flag: {}", other))),
    }
}

/// Text field that may be `null` or a number; `null` becomes the empty string.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(D::Error::custom(format!("expected text, found {}", other))),
    }
}

/// Optional text; `null` and blank strings are `None`.
pub fn optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = lenient_string(deserializer)?;
    if value.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(value))
    }
}

/// Credential-like text from an already parsed value: strings and numbers,
/// `None` when blank or of any other type.
pub fn text_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Optional nested record; `null`, `""`, `[]` and `false` are `None`.
pub fn optional_record<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if is_blank(&value) {
        return Ok(None);
    }
    T::deserialize(value).map(Some).map_err(D::Error::custom)
}

/// `null`, `false`, `0`, blank string, empty array or empty object.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v == 0.0),
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}
