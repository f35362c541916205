//! Canonical JSON encoding for attribute-value identity.
//!
//! Attribute values are indexed and matched by their byte-exact JSON
//! encoding. To make JSON-equivalent inputs collide (different key order,
//! different whitespace), every value is re-encoded before it is used as an
//! index path segment or compared at query time:
//!
//! - Object keys sorted lexicographically (UTF-8 byte order), recursively
//! - No whitespace
//! - Arrays keep their order
//! - Numbers as `serde_json` encodes the parsed value
//!
//! Structure-different values (e.g. `10` vs `"10"`) stay distinct.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;

/// Serializes `value` into canonical JSON bytes.
///
/// # Errors
///
/// Returns [`crate::Error::Serialization`] if the value cannot be converted
/// to JSON.
#[must_use = "canonical bytes are the identity of the value"]
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let v = serde_json::to_value(value)?;
    let mut out = Vec::<u8>::new();
    write_value(&v, &mut out)?;
    Ok(out)
}

/// Same as [`to_canonical_bytes`], but returns a UTF-8 string.
///
/// # Errors
///
/// Returns [`crate::Error::Serialization`] if the value cannot be converted
/// to JSON.
#[must_use = "canonical string is the identity of the value"]
pub fn to_canonical_string<T: Serialize>(value: &T) -> Result<String> {
    let bytes = to_canonical_bytes(value)?;
    String::from_utf8(bytes).map_err(|_| crate::Error::Serialization {
        message: "canonical JSON produced invalid UTF-8".to_string(),
    })
}

fn write_value(v: &Value, out: &mut Vec<u8>) -> Result<()> {
    match v {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => serde_json::to_writer(&mut *out, n)?,
        Value::String(s) => {
            // Writes the JSON string with quotes + escaping, no whitespace.
            serde_json::to_writer(&mut *out, s)?;
        }
        Value::Array(arr) => {
            out.push(b'[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => write_object(map, out)?,
    }
    Ok(())
}

fn write_object(map: &Map<String, Value>, out: &mut Vec<u8>) -> Result<()> {
    out.push(b'{');

    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    for (i, k) in keys.iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        serde_json::to_writer(&mut *out, *k)?;
        out.push(b':');
        if let Some(val) = map.get(*k) {
            write_value(val, out)?;
        }
    }

    out.push(b'}');
    Ok(())
}
