//! Command-line override application.
//!
//! Overrides are dotted key paths mapped to raw textual values. An override
//! only ever rewrites a key that already exists in the merged tree, and the
//! raw value is coerced to the kind of the value it replaces. Overrides that
//! miss are dropped silently.

use serde_json::{Number, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Raw values treated as `false` when overriding a boolean leaf.
const FALSY: &[&str] = &["false", "null", "undefined", "no", "0", ""];

/// Apply dotted-path overrides onto the merged tree, in place.
pub fn apply_overrides(tree: &mut Value, overrides: &BTreeMap<String, String>) {
    for (key, raw) in overrides {
        apply_override(tree, key, raw);
    }
}

/// Apply a single override. Repeated separators collapse and leading or
/// trailing separators are trimmed, so `..server.port.` targets
/// `server.port`.
fn apply_override(tree: &mut Value, key: &str, raw: &str) {
    let segments: Vec<&str> = key.split('.').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut node = &mut *tree;
    for segment in parents {
        match node.get_mut(*segment) {
            Some(child) if child.is_object() => node = child,
            _ => {
                debug!(key, segment, "override path does not resolve to a mapping, skipping");
                return;
            }
        }
    }

    let Some(existing) = node.get_mut(*last) else {
        debug!(key, "override targets a missing key, skipping");
        return;
    };
    *existing = coerce(existing, raw);
}

/// Coerce a raw override value to the kind of the value it replaces.
/// Only string, number, and boolean conversions happen; an override landing
/// on a mapping or sequence replaces the whole container with the raw
/// string.
fn coerce(existing: &Value, raw: &str) -> Value {
    match existing {
        Value::Number(_) => match parse_number(raw) {
            Some(n) => Value::Number(n),
            None => Value::String(raw.to_string()),
        },
        Value::Bool(_) => Value::Bool(truthy(raw)),
        _ => Value::String(raw.to_string()),
    }
}

fn parse_number(raw: &str) -> Option<Number> {
    if let Ok(int) = raw.parse::<i64>() {
        return Some(Number::from(int));
    }
    raw.parse::<f64>().ok().and_then(Number::from_f64)
}

/// Boolean coercion: numeric-looking values compare as numbers (so `0` and
/// `0.0` are falsy), everything else is matched case-insensitively against
/// the falsy set.
fn truthy(raw: &str) -> bool {
    if let Some(number) = parse_number(raw) {
        return number.as_f64().is_some_and(|f| f != 0.0);
    }
    !FALSY.contains(&raw.to_lowercase().as_str())
}
