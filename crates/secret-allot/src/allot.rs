//! Allotment of a document into per-node shares.
//!
//! A document marks its sensitive leaves with `{"$allot": ...}`. An array
//! under `$allot` holds one value per node; [`allot`] hands value *i* to
//! share *i* as `{"$share": value}`. A scalar under `$allot` is handed to
//! every share unchanged. All other fields are copied into every share.

use serde_json::{Map, Value};

use crate::error::AllotError;
use crate::Result;

/// Marker key for a value that must be split across nodes.
pub const ALLOT_KEY: &str = "$allot";
/// Marker key for one node's piece of an allotted value.
pub const SHARE_KEY: &str = "$share";

/// Split `document` into one document per node.
///
/// The number of shares is the length of the `$allot` arrays, which must all
/// agree. A document without any `$allot` array yields a single share.
pub fn allot(document: &Value) -> Result<Vec<Value>> {
    let count = share_count(document, "$")?.unwrap_or(1);
    Ok((0..count).map(|i| project(document, i)).collect())
}

/// Regroup per-node shares into a single document with `$allot` markers.
///
/// Inverse of [`allot`]: a lone share yields scalar `$allot` values, several
/// shares yield `$allot` arrays in share order.
pub fn unify(shares: &[Value]) -> Result<Value> {
    if shares.is_empty() {
        return Err(AllotError::NoShares);
    }
    let refs: Vec<&Value> = shares.iter().collect();
    unify_at(&refs, "$")
}

fn allot_marker(value: &Value) -> Option<&Map<String, Value>> {
    value.as_object().filter(|obj| obj.contains_key(ALLOT_KEY))
}

fn share_count(value: &Value, path: &str) -> Result<Option<usize>> {
    if let Some(marker) = allot_marker(value) {
        if marker.len() != 1 {
            return Err(AllotError::MalformedMarker {
                path: path.to_string(),
            });
        }
        return Ok(marker.get(ALLOT_KEY).and_then(Value::as_array).map(Vec::len));
    }

    let children: Vec<(String, &Value)> = match value {
        Value::Object(obj) => obj
            .iter()
            .map(|(k, v)| (format!("{path}.{k}"), v))
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("{path}[{i}]"), v))
            .collect(),
        _ => return Ok(None),
    };

    let mut count = None;
    for (child_path, child) in children {
        match (count, share_count(child, &child_path)?) {
            (Some(expected), Some(found)) if expected != found => {
                return Err(AllotError::AllotLengthMismatch {
                    path: child_path,
                    expected,
                    found,
                });
            }
            (None, found @ Some(_)) => count = found,
            _ => {}
        }
    }
    Ok(count)
}

fn project(value: &Value, index: usize) -> Value {
    if let Some(marker) = allot_marker(value) {
        let piece = match marker.get(ALLOT_KEY) {
            Some(Value::Array(pieces)) => pieces.get(index).cloned().unwrap_or(Value::Null),
            Some(scalar) => scalar.clone(),
            None => Value::Null,
        };
        let mut share = Map::new();
        share.insert(SHARE_KEY.to_string(), piece);
        return Value::Object(share);
    }

    match value {
        Value::Object(obj) => Value::Object(
            obj.iter()
                .map(|(k, v)| (k.clone(), project(v, index)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| project(v, index)).collect()),
        other => other.clone(),
    }
}

fn share_marker(value: &Value) -> Option<&Value> {
    value
        .as_object()
        .filter(|obj| obj.len() == 1)
        .and_then(|obj| obj.get(SHARE_KEY))
}

fn unify_at(values: &[&Value], path: &str) -> Result<Value> {
    let mismatch = || AllotError::StructureMismatch {
        path: path.to_string(),
    };
    let first = values[0];

    if share_marker(first).is_some() {
        let pieces = values
            .iter()
            .map(|v| share_marker(v).cloned().ok_or_else(mismatch))
            .collect::<Result<Vec<_>>>()?;
        let allotted = if pieces.len() == 1 {
            pieces.into_iter().next().unwrap_or(Value::Null)
        } else {
            Value::Array(pieces)
        };
        let mut marker = Map::new();
        marker.insert(ALLOT_KEY.to_string(), allotted);
        return Ok(Value::Object(marker));
    }

    match first {
        Value::Object(obj) => {
            let mut out = Map::new();
            for (key, _) in obj {
                let children = values
                    .iter()
                    .map(|v| match v {
                        Value::Object(o) if o.len() == obj.len() => {
                            o.get(key).ok_or_else(mismatch)
                        }
                        _ => Err(mismatch()),
                    })
                    .collect::<Result<Vec<_>>>()?;
                out.insert(key.clone(), unify_at(&children, &format!("{path}.{key}"))?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for i in 0..items.len() {
                let children = values
                    .iter()
                    .map(|v| match v {
                        Value::Array(a) if a.len() == items.len() => Ok(&a[i]),
                        _ => Err(mismatch()),
                    })
                    .collect::<Result<Vec<_>>>()?;
                out.push(unify_at(&children, &format!("{path}[{i}]"))?);
            }
            Ok(Value::Array(out))
        }
        scalar => {
            if values.iter().all(|v| *v == scalar) {
                Ok(scalar.clone())
            } else {
                Err(mismatch())
            }
        }
    }
}
