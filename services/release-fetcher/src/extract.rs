//!
//! src/extract.rs
//!
//! Typed reads out of upstream json documents. Every lookup walks a path
//! of object keys and degrades to a default on a missing key, a missing
//! intermediate object, or a value of the wrong shape. Nothing in here
//! returns an error or panics; callers never index a `Value` directly.
//!

use serde_json::Value;

/// Follows `path` through nested objects. `None` as soon as a segment is
/// absent or the current value is not an object
pub fn lookup<'a>(v: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut curr = v;
    for segment in path {
        match curr {
            Value::Object(map) => curr = map.get(*segment)?,
            _ => return None,
        }
    }
    Some(curr)
}

/// String at `path`, only when the value really is a string
pub fn opt_str<'a>(v: &'a Value, path: &[&str]) -> Option<&'a str> {
    lookup(v, path).and_then(Value::as_str)
}

/// String at `path` or the empty string
pub fn str_or_empty(v: &Value, path: &[&str]) -> String {
    str_or(v, path, "")
}

pub fn str_or(v: &Value, path: &[&str], default: &str) -> String {
    opt_str(v, path).unwrap_or(default).to_string()
}

/// Any json number at `path`, integers included
pub fn opt_number(v: &Value, path: &[&str]) -> Option<f64> {
    lookup(v, path).and_then(Value::as_f64)
}

/// Elements of the array at `path`, empty when absent or not an array
pub fn seq<'a>(v: &'a Value, path: &[&str]) -> &'a [Value] {
    match lookup(v, path) {
        Some(Value::Array(items)) => items.as_slice(),
        _ => &[],
    }
}

/// First element of the array at `path` if that element is a string
pub fn first_str<'a>(v: &'a Value, path: &[&str]) -> Option<&'a str> {
    seq(v, path).first().and_then(Value::as_str)
}

/// `child` string of every element of the array at `path`, in order.
/// Elements without it (or that are not objects) contribute ""
pub fn strings_of<'a>(v: &'a Value, path: &[&str], child: &str) -> Vec<&'a str> {
    seq(v, path)
        .iter()
        .map(|element| opt_str(element, &[child]).unwrap_or(""))
        .collect()
}
