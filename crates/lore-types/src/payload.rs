//! Normalized entity payloads.
//!
//! Every entity kind is stored and merged as the same shape: a string-keyed
//! tree whose leaves are JSON values. Keys are kept in sorted order so that
//! iteration, serialization, and conflict reporting are deterministic.
//!
//! Fields are addressed by dot-delimited paths, so a key at any depth must be
//! non-empty and must not contain [`PATH_SEPARATOR`]. That keeps every path
//! naming exactly one field, and keeps the empty path free to mean the whole
//! entity.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::TypeError;

/// Separator between the segments of a field path.
pub const PATH_SEPARATOR: char = '.';

/// Full entity state at one instant.
pub type Payload = BTreeMap<String, Value>;

/// Normalize an arbitrary JSON value into a [`Payload`].
///
/// Fails with [`TypeError::NotAnObject`] unless `value` is a JSON object,
/// and with [`TypeError::InvalidKey`] if any key fails [`check_keys`].
pub fn payload_from_value(value: Value) -> Result<Payload, TypeError> {
    match value {
        Value::Object(map) => {
            let payload: Payload = map.into_iter().collect();
            check_keys(&payload)?;
            Ok(payload)
        }
        other => Err(TypeError::NotAnObject(json_kind(&other))),
    }
}

/// Check that every object key in the tree, nested ones included, is
/// non-empty and free of [`PATH_SEPARATOR`]. Arrays are searched too.
pub fn check_keys(payload: &Payload) -> Result<(), TypeError> {
    for (key, value) in payload {
        check_key(key)?;
        check_value_keys(value)?;
    }
    Ok(())
}

fn check_value_keys(value: &Value) -> Result<(), TypeError> {
    match value {
        Value::Object(map) => map.iter().try_for_each(|(key, child)| {
            check_key(key)?;
            check_value_keys(child)
        }),
        Value::Array(items) => items.iter().try_for_each(check_value_keys),
        _ => Ok(()),
    }
}

fn check_key(key: &str) -> Result<(), TypeError> {
    if key.is_empty() || key.contains(PATH_SEPARATOR) {
        return Err(TypeError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Convert a payload back into a JSON object value.
pub fn payload_to_value(payload: &Payload) -> Value {
    let map: Map<String, Value> = payload
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Value::Object(map)
}

/// Name of a JSON value's kind, for error messages.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
