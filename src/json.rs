//! JSON conversions.
//!
//! Small nested dicts and lists can be stored as one JSON text dataset
//! instead of a tree of nodes.  [`describe`] renders any value as JSON for
//! display.

use serde_json::{json, Map, Number};
use std::collections::BTreeMap;

use crate::addressing::{escape_key, unescape_key, validate_mapping_key, SlashDecode, SlashPolicy};
use crate::error::{Error, Result};
use crate::value::{NdArray, SparseFormat, Value};

/// Whether `value` can take the JSON fast path.  Only lists and dicts
/// qualify at the top; nested values must be JSON primitives.  Keys are
/// validated on the way, so a `/` under [`SlashPolicy::Error`] still fails.
pub fn json_compatible(value: &Value, slash: SlashPolicy) -> Result<bool> {
    match value {
        Value::List(_) | Value::Dict(_) => primitive(value, slash),
        _ => Ok(false),
    }
}

fn primitive(value: &Value, slash: SlashPolicy) -> Result<bool> {
    match value {
        Value::Null | Value::Bool(_) | Value::Int(_) | Value::Text(_) => Ok(true),
        Value::Float(f) => Ok(f.is_finite()),
        Value::List(items) => {
            for item in items {
                if !primitive(item, slash)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Value::Dict(map) => {
            for (k, v) in map {
                validate_mapping_key(k)?;
                escape_key(k, slash)?;
                if !primitive(v, slash)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Convert a JSON-compatible value, escaping keys under `slash`.
pub fn to_json(value: &Value, slash: SlashPolicy) -> Result<serde_json::Value> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number(Number::from(*i)),
        Value::Float(f) => Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| Error::unsupported("non-finite float", "json"))?,
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => serde_json::Value::Array(
            items.iter().map(|v| to_json(v, slash)).collect::<Result<_>>()?,
        ),
        Value::Dict(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(escape_key(k, slash)?, to_json(v, slash)?);
            }
            serde_json::Value::Object(out)
        }
        other => return Err(Error::unsupported(other.kind(), "json")),
    })
}

/// Convert parsed JSON back, unescaping keys under `decode`.  Integers that
/// fit `i64` stay integers.
pub fn from_json(json: serde_json::Value, decode: SlashDecode) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::Text(s),
        serde_json::Value::Array(items) => Value::List(items.into_iter().map(|v| from_json(v, decode)).collect()),
        serde_json::Value::Object(map) => Value::Dict(
            map.into_iter()
                .map(|(k, v)| (unescape_key(&k, decode), from_json(v, decode)))
                .collect::<BTreeMap<_, _>>(),
        ),
    }
}

fn describe_array(a: &NdArray) -> serde_json::Value {
    json!({
        "dtype": a.dtype().name(),
        "shape": a.shape(),
        "data": a.to_f64_vec(),
    })
}

/// Lossy JSON rendering of any value.
pub fn describe(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Float(f) => json!(f),
        Value::Scalar(s) => json!({ "dtype": s.dtype().name(), "value": s.as_f64() }),
        Value::Datetime(t) => json!(t.isoformat()),
        Value::Timezone(z) => json!(z.to_string()),
        Value::Text(s) => json!(s),
        Value::Array(a) => describe_array(a),
        Value::MultiArray(parts) => serde_json::Value::Array(parts.iter().map(describe_array).collect()),
        Value::Sparse(m) => json!({
            "format": match m.format() { SparseFormat::Csc => "csc", SparseFormat::Csr => "csr" },
            "shape": [m.shape().0, m.shape().1],
            "nnz": m.nnz(),
        }),
        Value::Dict(map) => serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), describe(v))).collect()),
        Value::List(items) | Value::Tuple(items) => serde_json::Value::Array(items.iter().map(describe).collect()),
        Value::Frame(f) => json!({
            "kind": format!("{:?}", f.kind()),
            "columns": f.columns(),
            "shape": f.shape(),
        }),
        Value::ChunkedArray(c) => json!({
            "shape": c.shape(),
            "chunk_size": c.chunk_size(),
            "chunk_index": c.chunk_index(),
            "data": describe_array(c.data()),
        }),
        Value::ChunkedList(l) => json!({
            "size": l.size(),
            "start": l.start(),
            "items": l.items().iter().map(describe).collect::<Vec<_>>(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuples_and_non_finite_floats_are_not_json() {
        let v = Value::List(vec![Value::Tuple(vec![])]);
        assert!(!json_compatible(&v, SlashPolicy::Error).unwrap());
        let v = Value::List(vec![Value::Float(f64::NAN)]);
        assert!(!json_compatible(&v, SlashPolicy::Error).unwrap());
        assert!(!json_compatible(&Value::Int(1), SlashPolicy::Error).unwrap());
    }

    #[test]
    fn slash_keys_follow_policy() {
        let v: Value = [("a/b", Value::Int(1))].into_iter().collect();
        assert!(matches!(json_compatible(&v, SlashPolicy::Error), Err(Error::InvalidKey { .. })));
        let j = to_json(&v, SlashPolicy::Replace).unwrap();
        assert_eq!(j, json!({ "a{FWDSLASH}b": 1 }));
        assert_eq!(from_json(j, SlashDecode::Replace), v);
    }

    #[test]
    fn ints_and_floats_stay_distinct() {
        let v = Value::List(vec![Value::Int(1), Value::Float(1.0)]);
        let text = serde_json::to_string(&to_json(&v, SlashPolicy::Error).unwrap()).unwrap();
        assert_eq!(text, "[1,1.0]");
        assert_eq!(from_json(serde_json::from_str(&text).unwrap(), SlashDecode::Ignore), v);
    }
}
