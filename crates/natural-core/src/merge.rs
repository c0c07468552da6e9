#![forbid(unsafe_code)]

//! Recursive object merging.
//!
//! # Rules
//!
//! [`merge_into`] walks `source` and writes each key into `target`:
//!
//! - both sides hold an object: recurse;
//! - anything else (scalar, `Null`, array, date, handle): the source value
//!   replaces the target value. Arrays are replaced wholesale, never
//!   concatenated or merged index by index.
//!
//! [`defaults_deep`] is the dual: it only fills keys that are absent from
//! `target`, recursing where both sides are objects.
//!
//! # Invariants
//!
//! 1. Merging is left-to-right: for any key present in several sources, the
//!    last applied source wins.
//! 2. `merge_into(t, s)` twice is the same as once.
//! 3. Keys of `target` that `source` does not mention are left untouched.
//! 4. Handles are moved by reference, never copied.

use crate::value::{Map, Value};

/// Merge `source` into `target` in place.
pub fn merge_into(target: &mut Map, source: &Map) {
    for (key, incoming) in source {
        match (target.get_mut(key), incoming) {
            (Some(Value::Object(existing)), Value::Object(nested)) => merge_into(existing, nested),
            _ => {
                target.insert(key.clone(), incoming.clone());
            }
        }
    }
}

/// Merge `sources` left to right into a fresh map.
#[must_use]
pub fn merged<'a>(sources: impl IntoIterator<Item = &'a Map>) -> Map {
    let mut out = Map::new();
    for source in sources {
        merge_into(&mut out, source);
    }
    out
}

/// Copy into `target` every key of `source` that `target` does not define.
///
/// Nested objects are completed recursively. A key holding `Null` counts as
/// defined and is not overwritten.
pub fn defaults_deep(target: &mut Map, source: &Map) {
    for (key, fallback) in source {
        match (target.get_mut(key), fallback) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                defaults_deep(existing, nested);
            }
            (Some(_), _) => {}
            (None, _) => {
                target.insert(key.clone(), fallback.clone());
            }
        }
    }
}
