#![forbid(unsafe_code)]

//! Dynamic values exchanged between UI components and data services.
//!
//! A [`Value`] is the in-process shape of query variables, form snapshots and
//! partial update payloads. It is JSON-like, with two additions:
//!
//! - [`Value::Date`] keeps instants typed so two distinct but equal dates
//!   compare equal.
//! - [`Value::Handle`] carries an external resource (file, blob, stream) by
//!   reference. Handles are never deep-copied and compare by identity.
//!
//! # Invariants
//!
//! 1. `Value::clone()` is a deep copy of every variant except
//!    [`Value::Handle`], which shares the same underlying resource.
//! 2. Equality is structural, except handles (identity) and numbers
//!    (numeric value, so `1` equals `1.0`).
//! 3. A key absent from a [`Map`] means "no value". `Null` is an explicit
//!    value and participates in comparisons and merges like any other.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Handle serialized | `to_json()` / `Serialize` reached a handle | [`ValueError::Handle`] with its path |
//! | Non-finite float | `Value::from(f64::NAN)` | Stored as `Null` |
//! | Fragment not an object | [`object()`] given a scalar or array | [`ValueError::NotAnObject`] |

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Error as _, Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Number;

/// Ordered string-keyed object.
pub type Map = BTreeMap<String, Value>;

/// Errors from value conversions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A handle cannot cross a serialization boundary.
    Handle {
        /// Dotted path of the offending value (`""` for the root).
        path: String,
    },
    /// An object was required but another kind of value was given.
    NotAnObject,
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handle { path } if path.is_empty() => {
                write!(f, "cannot serialize a resource handle")
            }
            Self::Handle { path } => write!(f, "cannot serialize resource handle at '{path}'"),
            Self::NotAnObject => write!(f, "value is not an object"),
        }
    }
}

impl std::error::Error for ValueError {}

/// Reference to an external resource that must never be deep-copied.
///
/// Cloning a `Handle` clones the reference. Two handles are equal only if they
/// point at the same resource, even when the resources themselves would
/// compare equal.
#[derive(Clone)]
pub struct Handle {
    label: Arc<str>,
    resource: Arc<dyn Any + Send + Sync>,
}

impl Handle {
    /// Wrap `resource` in a new handle. `label` is used for diagnostics only.
    pub fn new<R: Any + Send + Sync>(label: impl Into<String>, resource: R) -> Self {
        Self {
            label: Arc::from(label.into()),
            resource: Arc::new(resource),
        }
    }

    /// Diagnostic label (usually a file name).
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Borrow the resource if it is of type `R`.
    #[must_use]
    pub fn downcast_ref<R: Any>(&self) -> Option<&R> {
        self.resource.downcast_ref::<R>()
    }

    /// Whether both handles point at the same resource.
    #[must_use]
    pub fn same_resource(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.resource, &other.resource)
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.same_resource(other)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.label).finish()
    }
}

/// A dynamic, JSON-like value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<Value>),
    Object(Map),
    Handle(Handle),
}

impl Value {
    /// Whether this is [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Consume the value, returning its map if it is an object.
    #[must_use]
    pub fn into_object(self) -> Option<Map> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_handle(&self) -> Option<&Handle> {
        match self {
            Self::Handle(handle) => Some(handle),
            _ => None,
        }
    }

    /// Convert to a `serde_json::Value`.
    ///
    /// Dates become RFC 3339 strings with millisecond precision.
    ///
    /// # Errors
    ///
    /// [`ValueError::Handle`] if the value contains a handle anywhere.
    pub fn to_json(&self) -> Result<serde_json::Value, ValueError> {
        let mut path = Vec::new();
        to_json_at(self, &mut path)
    }
}

fn to_json_at<'a>(
    value: &'a Value,
    path: &mut Vec<std::borrow::Cow<'a, str>>,
) -> Result<serde_json::Value, ValueError> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => serde_json::Value::Number(n.clone()),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Date(date) => serde_json::Value::String(format_date(date)),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                path.push(index.to_string().into());
                out.push(to_json_at(item, path)?);
                path.pop();
            }
            serde_json::Value::Array(out)
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, item) in map {
                path.push(key.as_str().into());
                out.insert(key.clone(), to_json_at(item, path)?);
                path.pop();
            }
            serde_json::Value::Object(out)
        }
        Value::Handle(_) => {
            return Err(ValueError::Handle {
                path: path.join("."),
            });
        }
    })
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => numbers_equal(a, b),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Handle(a), Self::Handle(b)) => a.same_resource(b),
            _ => false,
        }
    }
}

/// Build a [`Map`] from a JSON object literal.
///
/// # Errors
///
/// [`ValueError::NotAnObject`] if `json` is not an object.
pub fn object(json: serde_json::Value) -> Result<Map, ValueError> {
    Value::from(json).into_object().ok_or(ValueError::NotAnObject)
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(key, item)| (key, Self::from(item)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Self::Null, Self::Number)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(date: DateTime<Utc>) -> Self {
        Self::Date(date)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Self::Object(map)
    }
}

impl From<Handle> for Value {
    fn from(handle: Handle) -> Self {
        Self::Handle(handle)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Date(date) => serializer.serialize_str(&format_date(date)),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, item) in map {
                    out.serialize_entry(key, item)?;
                }
                out.end()
            }
            Self::Handle(handle) => Err(S::Error::custom(format!(
                "cannot serialize resource handle '{}'",
                handle.label()
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn clone_shares_handles_but_copies_data() {
        let file = Handle::new("photo.jpg", vec![1u8, 2, 3]);
        let original = Value::from(object(json!({"name": "a"})).unwrap());
        let mut with_file = original.as_object().unwrap().clone();
        with_file.insert("file".into(), file.clone().into());

        let copy = with_file.clone();
        let copied = copy["file"].as_handle().unwrap();
        assert!(copied.same_resource(&file));
        assert_eq!(copied.downcast_ref::<Vec<u8>>(), Some(&vec![1u8, 2, 3]));
    }

    #[test]
    fn handles_compare_by_identity() {
        let a = Handle::new("a.txt", String::from("same"));
        let b = Handle::new("a.txt", String::from("same"));
        assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
        assert_ne!(Value::from(a), Value::from(b));
    }

    #[test]
    fn distinct_equal_dates_are_equal() {
        let a = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(Value::from(a), Value::from(b));
    }

    #[test]
    fn integer_and_float_numbers_compare_numerically() {
        assert_eq!(Value::from(json!(1)), Value::from(json!(1.0)));
        assert_ne!(Value::from(json!(1)), Value::from(json!(2)));
        assert_ne!(Value::from(json!(1)), Value::from(json!("1")));
    }

    #[test]
    fn nan_becomes_null() {
        assert!(Value::from(f64::NAN).is_null());
    }

    #[test]
    fn to_json_renders_dates() {
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut map = Map::new();
        map.insert("at".into(), date.into());
        let json = Value::from(map).to_json().unwrap();
        assert_eq!(json, json!({"at": "2024-03-01T12:00:00.000Z"}));
    }

    #[test]
    fn to_json_reports_handle_path() {
        let mut inner = Map::new();
        inner.insert("b".into(), Handle::new("f", ()).into());
        let mut map = Map::new();
        map.insert("a".into(), Value::Array(vec![Value::Null, inner.into()]));

        let err = Value::from(map).to_json().unwrap_err();
        assert_eq!(
            err,
            ValueError::Handle {
                path: "a.1.b".into()
            }
        );
        assert!(err.to_string().contains("a.1.b"));
    }

    #[test]
    fn serialize_matches_to_json() {
        let value = Value::from(json!({"a": [1, "x", null], "b": {"c": true}}));
        let via_serde = serde_json::to_value(&value).unwrap();
        assert_eq!(via_serde, value.to_json().unwrap());
    }

    #[test]
    fn serialize_rejects_handles() {
        let value = Value::from(Handle::new("blob", ()));
        assert!(serde_json::to_string(&value).is_err());
    }

    #[test]
    fn deserialize_through_json() {
        let value: Value = serde_json::from_str(r#"{"a": {"b": [1, 2]}}"#).unwrap();
        assert_eq!(value, Value::from(json!({"a": {"b": [1, 2]}})));
    }

    #[test]
    fn object_requires_an_object() {
        assert_eq!(object(json!([1])), Err(ValueError::NotAnObject));
        assert!(object(json!({})).unwrap().is_empty());
    }
}
