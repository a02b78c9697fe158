//! Variant ⇄ JSON interchange.
//!
//! Used for DOM-style event payloads and for embedders that persist or
//! log marshalled values. Object references have no JSON representation
//! and convert as an error; everything else round-trips.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::error::{BridgeError, BridgeResult};
use crate::variant::{Variant, VariantMap};

/// Convert a variant to a JSON value.
pub fn to_json(v: &Variant) -> BridgeResult<JsonValue> {
    match v {
        Variant::Null | Variant::Void => Ok(JsonValue::Null),
        Variant::Bool(b) => Ok(JsonValue::Bool(*b)),
        Variant::Int(i) => Ok(JsonValue::from(*i)),
        Variant::Double(d) => Ok(serde_json::Number::from_f64(*d)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)),
        Variant::String(s) => Ok(JsonValue::String(s.clone())),
        Variant::Object(_) => Err(BridgeError::conversion(v.kind(), "json")),
        Variant::List(items) => items.iter().map(to_json).collect::<BridgeResult<Vec<_>>>()
            .map(JsonValue::Array),
        Variant::Map(entries) => {
            let mut obj = serde_json::Map::with_capacity(entries.len());
            for (k, v) in entries.iter() {
                obj.insert(k.clone(), to_json(v)?);
            }
            Ok(JsonValue::Object(obj))
        }
    }
}

/// Convert a JSON value to a variant. Never fails: every JSON value has a
/// variant representation.
pub fn from_json(v: &JsonValue) -> Variant {
    match v {
        JsonValue::Null => Variant::Null,
        JsonValue::Bool(b) => Variant::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Variant::Int(i),
            None => Variant::Double(n.as_f64().unwrap_or(0.0)),
        },
        JsonValue::String(s) => Variant::String(s.clone()),
        JsonValue::Array(items) => {
            Variant::List(Arc::new(items.iter().map(from_json).collect()))
        }
        JsonValue::Object(obj) => {
            let mut map = VariantMap::with_capacity(obj.len());
            for (k, v) in obj {
                map.insert(k.clone(), from_json(v));
            }
            Variant::Map(Arc::new(map))
        }
    }
}
