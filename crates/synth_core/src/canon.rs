//! Canonical JSON for model artifacts
//!
//! Object keys are sorted recursively so that equal models serialize to
//! identical bytes; the compact form is what gets hashed.

use crate::errors::Result;
use serde::Serialize;
use serde_json::{map::Map, ser::PrettyFormatter, Serializer, Value};
use std::io::Write;

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            let mut sorted = Map::with_capacity(entries.len());
            for (key, val) in entries {
                sorted.insert(key, canonicalize(val));
            }
            Value::Object(sorted)
        }
        Value::Array(elements) => Value::Array(elements.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Compact canonical JSON (no whitespace)
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let canonical = canonicalize(serde_json::to_value(value)?);
    Ok(serde_json::to_string(&canonical)?)
}

/// Two-space indented canonical JSON written to `writer`
pub fn write_canonical_pretty<T, W>(mut writer: W, value: &T) -> Result<()>
where
    T: Serialize,
    W: Write,
{
    let canonical = canonicalize(serde_json::to_value(value)?);
    let formatter = PrettyFormatter::with_indent(b"  ");
    let mut serializer = Serializer::with_formatter(&mut writer, formatter);
    canonical.serialize(&mut serializer)?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// BLAKE3 of the compact canonical form, hex encoded
pub fn fingerprint_hex<T: Serialize>(value: &T) -> Result<String> {
    let json = to_canonical_json(value)?;
    Ok(hex::encode(blake3::hash(json.as_bytes()).as_bytes()))
}
