//! Structural diff over serialized value trees
//!
//! Both sides are serialized to `serde_yaml::Value` and walked together.
//! Mappings are compared key by key, sequences and scalars as whole values.
//! The result holds only the entries of the effective tree that differ from
//! the defaults, in the effective tree's key order.
//!
//! [`merge`] layers one tree over another.

use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::error::render::diff_failed;
use crate::error::Result;

/// Returns the subset of `effective` whose values differ from `defaults`
pub fn diff<T: Serialize>(defaults: &T, effective: &T) -> Result<Mapping> {
    let defaults = serde_yaml::to_value(defaults)?;
    let effective = serde_yaml::to_value(effective)?;
    diff_values(&defaults, &effective)
}

/// Diff two already-serialized trees; both roots must be mappings
pub fn diff_values(defaults: &Value, effective: &Value) -> Result<Mapping> {
    match (defaults, effective) {
        (Value::Mapping(d), Value::Mapping(e)) => diff_mappings("", d, e),
        _ => Err(diff_failed("<root>", "both trees must be mappings")),
    }
}

fn diff_mappings(path: &str, defaults: &Mapping, effective: &Mapping) -> Result<Mapping> {
    let mut delta = Mapping::new();

    for (key, value) in effective {
        let child = child_path(path, key);
        match defaults.get(key) {
            None | Some(Value::Null) => {
                if !value.is_null() {
                    delta.insert(key.clone(), value.clone());
                }
            }
            Some(Value::Mapping(default_map)) => match value {
                Value::Mapping(effective_map) => {
                    let sub = diff_mappings(&child, default_map, effective_map)?;
                    if !sub.is_empty() {
                        delta.insert(key.clone(), Value::Mapping(sub));
                    }
                }
                Value::Null => {
                    delta.insert(key.clone(), Value::Null);
                }
                other => {
                    return Err(diff_failed(
                        child,
                        format!("mapping in defaults but {} in effective values", kind(other)),
                    ));
                }
            },
            Some(default_value) => {
                if let Value::Mapping(_) = value {
                    return Err(diff_failed(
                        child,
                        format!("{} in defaults but mapping in effective values", kind(default_value)),
                    ));
                }
                if default_value != value {
                    delta.insert(key.clone(), value.clone());
                }
            }
        }
    }

    Ok(delta)
}

/// Deep-merge `overlay` into `base`, overlay winning on conflicts
pub fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn child_path(parent: &str, key: &Value) -> String {
    let key = match key {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_else(|_| "?".to_string()),
    };
    if parent.is_empty() {
        key
    } else {
        format!("{}.{}", parent, key)
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
