//! Bridge between JSON text and [`Value`].
//!
//! JSON maps into a subset of the value model: integers that fit `i64` become
//! `Int`, every other number becomes `Double`. Going the other way is lossy
//! where JSON has no counterpart:
//!
//! - `Undefined` and `Unspecified` serialize as `null`
//! - blobs serialize as arrays of byte values
//! - non-string object keys serialize as their display text, and an object
//!   whose keys render to the same text (`Int(1)` and `"1"`) fails to
//!   serialize rather than emitting a duplicate key
//! - non-finite floats serialize as `null`

use std::borrow::Cow;

use rustc_hash::FxHashSet;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::decoder::parse;
use crate::encoder::dump;
use crate::error::Result;
use crate::types::{Map, Value};

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::Double(u as f64)
                } else {
                    Value::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::string(s),
            serde_json::Value::Array(items) => {
                Value::from(items.into_iter().map(Value::from).collect::<Vec<_>>())
            }
            serde_json::Value::Object(map) => Value::from(
                map.into_iter()
                    .map(|(k, v)| (Value::string(k), Value::from(v)))
                    .collect::<Map>(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null | Value::Unspecified => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f32(*f),
            Value::Double(d) => serializer.serialize_f64(*d),
            Value::LongDouble(l) => serializer.serialize_f64(l.to_f64()),
            Value::String(s) => serializer.serialize_str(s),
            Value::Blob(b) => serializer.serialize_bytes(b),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let keys: Vec<Cow<'_, str>> = map.keys().map(json_key).collect();
                if map.keys().any(|key| !key.is_string()) {
                    let mut seen: FxHashSet<&str> = FxHashSet::default();
                    for key in &keys {
                        if !seen.insert(key) {
                            return Err(serde::ser::Error::custom(format!(
                                "object keys collide as JSON key {key:?}"
                            )));
                        }
                    }
                }
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in keys.iter().zip(map.values()) {
                    out.serialize_entry(&**key, value)?;
                }
                out.end()
            }
        }
    }
}

fn json_key(key: &Value) -> Cow<'_, str> {
    match key {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}

/// Parse JSON text into a [`Value`].
pub fn from_json(text: &str) -> Result<Value> {
    let json: serde_json::Value = serde_json::from_str(text)?;
    Ok(Value::from(json))
}

/// Render a [`Value`] as compact JSON text.
pub fn to_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

pub fn to_json_pretty(value: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// JSON text straight to JKSN bytes.
pub fn encode_json(text: &str, header: bool) -> Result<Vec<u8>> {
    dump(&from_json(text)?, header)
}

/// JKSN bytes straight to compact JSON text.
pub fn decode_json(bytes: &[u8], header: bool) -> Result<String> {
    to_json(&parse(bytes, header)?)
}
