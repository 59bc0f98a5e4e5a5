//! Dynamic payload values
//!
//! Actions carry free-form payloads, so the store needs a value tree that can
//! hold both plain data and references that cannot be serialized (callbacks,
//! handles reconstructed during rehydration). [`Value::Opaque`] is the only
//! variant that is not plain data.
//!
//! [`find_non_serializable`] walks a value depth-first and reports the first
//! non-serializable entry, which is what the store's serializability check
//! runs on every dispatched action and on the resulting state.

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Error as _, Serialize, SerializeMap, SerializeSeq, Serializer};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Key path reported when the value being inspected is itself non-serializable
pub const ROOT_PATH: &str = "<root>";

/// A dynamic payload value
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// Absent / null
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Any number (JSON semantics, non-finite numbers included)
    Number(f64),
    /// UTF-8 string
    String(String),
    /// Ordered list
    Array(Vec<Value>),
    /// String-keyed map, iterated in key order
    Object(BTreeMap<String, Value>),
    /// A non-serializable reference
    Opaque(Opaque),
}

/// A shared, type-erased reference carried inside a [`Value`]
///
/// Opaque values compare equal only when they point at the same allocation.
#[derive(Clone)]
pub struct Opaque {
    type_name: String,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Opaque {
    /// Wrap a value, labelling it with its Rust type name
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>().to_owned(),
            inner: Arc::new(value),
        }
    }

    /// Wrap a value under an explicit label (e.g. `"Function"`, `"Promise"`)
    #[must_use]
    pub fn named<T: Any + Send + Sync>(type_name: impl Into<String>, value: T) -> Self {
        Self {
            type_name: type_name.into(),
            inner: Arc::new(value),
        }
    }

    /// The label reported by diagnostics
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Borrow the wrapped value if it has type `T`
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({})", self.type_name)
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Value {
    /// Build an object from key/value pairs
    #[must_use]
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Wrap a non-serializable value
    #[must_use]
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Self::Opaque(Opaque::new(value))
    }

    /// Whether this value is `Null`
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether this value is plain data at the top level
    ///
    /// Containers are plain even if they hold opaque children; use
    /// [`find_non_serializable`] for a deep check.
    #[must_use]
    pub const fn is_plain(&self) -> bool {
        !matches!(self, Self::Opaque(_))
    }

    /// Human-readable kind, used in diagnostics
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Opaque(opaque) => opaque.type_name(),
        }
    }

    /// String contents, if this is a string
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean contents, if this is a boolean
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric contents, if this is a number
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Map contents, if this is an object
    #[must_use]
    pub const fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a dot-separated path (`"profile.emails.0"`)
    ///
    /// Array segments are decimal indices. The empty path returns `self`.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(self);
        }
        path.split('.').try_fold(self, |current, segment| match current {
            Self::Object(map) => map.get(segment),
            Self::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    /// Child entries with their path segment, in traversal order
    fn entries(&self) -> Vec<(String, &Value)> {
        match self {
            Self::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
            Self::Array(items) => items.iter().enumerate().map(|(i, v)| (i.to_string(), v)).collect(),
            _ => Vec::new(),
        }
    }
}

/// The first non-serializable entry found in a value
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NonSerializable {
    /// Dot-joined path to the entry, or [`ROOT_PATH`] for the value itself
    pub key_path: String,
    /// Label of the offending value
    pub type_name: String,
}

/// Find the first non-serializable entry in `value`
///
/// Traversal is depth-first; object keys are visited in sorted order and array
/// elements by index. An entry whose dot-joined path equals one of
/// `ignored_paths` is skipped together with everything beneath it.
///
/// ```
/// use slicestore_core::value::{find_non_serializable, Value};
///
/// let payload = Value::object([
///     ("token", Value::from("abc")),
///     ("onDone", Value::opaque(|| ())),
/// ]);
///
/// let found = find_non_serializable(&payload, &[]).map(|f| f.key_path);
/// assert_eq!(found.as_deref(), Some("onDone"));
/// assert!(find_non_serializable(&payload, &["onDone".to_owned()]).is_none());
/// ```
#[must_use]
pub fn find_non_serializable(value: &Value, ignored_paths: &[String]) -> Option<NonSerializable> {
    if let Value::Opaque(opaque) = value {
        return Some(NonSerializable {
            key_path: ROOT_PATH.to_owned(),
            type_name: opaque.type_name().to_owned(),
        });
    }
    walk(value, "", ignored_paths)
}

fn walk(value: &Value, path: &str, ignored_paths: &[String]) -> Option<NonSerializable> {
    for (key, nested) in value.entries() {
        let nested_path = if path.is_empty() {
            key
        } else {
            format!("{path}.{key}")
        };

        if ignored_paths.iter().any(|ignored| *ignored == nested_path) {
            continue;
        }

        if let Value::Opaque(opaque) = nested {
            return Some(NonSerializable {
                key_path: nested_path,
                type_name: opaque.type_name().to_owned(),
            });
        }

        if let Some(found) = walk(nested, &nested_path, ignored_paths) {
            return Some(found);
        }
    }
    None
}

/// Structural view of a state or action for diagnostics
///
/// The serializability check never serializes anything; it inspects the tree
/// returned here instead, which lets it report the exact path of an offending
/// entry.
pub trait Inspect {
    /// Produce the value tree for `self`
    fn inspect(&self) -> Value;
}

impl Inspect for Value {
    fn inspect(&self) -> Value {
        self.clone()
    }
}

impl Inspect for serde_json::Value {
    fn inspect(&self) -> Value {
        Value::from(self.clone())
    }
}

impl Inspect for String {
    fn inspect(&self) -> Value {
        Value::String(self.clone())
    }
}

impl Inspect for &str {
    fn inspect(&self) -> Value {
        Value::String((*self).to_owned())
    }
}

impl Inspect for bool {
    fn inspect(&self) -> Value {
        Value::Bool(*self)
    }
}

macro_rules! inspect_number {
    ($($ty:ty),*) => {
        $(
            impl Inspect for $ty {
                fn inspect(&self) -> Value {
                    Value::from(*self)
                }
            }
        )*
    };
}

inspect_number!(i32, i64, u32, u64, f64);

impl Inspect for () {
    fn inspect(&self) -> Value {
        Value::Null
    }
}

impl<T: Inspect> Inspect for Option<T> {
    fn inspect(&self) -> Value {
        self.as_ref().map_or(Value::Null, Inspect::inspect)
    }
}

impl<T: Inspect> Inspect for Vec<T> {
    fn inspect(&self) -> Value {
        Value::Array(self.iter().map(Inspect::inspect).collect())
    }
}

impl<T: Inspect> Inspect for BTreeMap<String, T> {
    fn inspect(&self) -> Value {
        Value::Object(self.iter().map(|(k, v)| (k.clone(), v.inspect())).collect())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<i64> for Value {
    #[allow(clippy::cast_precision_loss)] // JSON numbers are f64
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<u64> for Value {
    #[allow(clippy::cast_precision_loss)] // JSON numbers are f64
    fn from(value: u64) -> Self {
        Self::Number(value as f64)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Self::Array(value.into_iter().map(Into::into).collect())
    }
}

impl From<Opaque> for Value {
    fn from(value: Opaque) -> Self {
        Self::Opaque(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            },
            serde_json::Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            },
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => serialize_number(*n, serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            },
            Self::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            },
            Self::Opaque(opaque) => Err(S::Error::custom(format!(
                "value of type `{}` is not serializable",
                opaque.type_name()
            ))),
        }
    }
}

// Integral numbers round-trip as integers rather than `1.0`.
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn serialize_number<S: Serializer>(n: f64, serializer: S) -> Result<S::Ok, S::Error> {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_EXACT {
        serializer.serialize_i64(n as i64)
    } else {
        serializer.serialize_f64(n)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn session_handle() -> Value {
        Value::Opaque(Opaque::named("Function", || ()))
    }

    #[test]
    fn plain_tree_has_no_violation() {
        let value = Value::from(serde_json::json!({
            "token": "abc",
            "roles": ["admin", "viewer"],
            "expires": 3600,
            "nested": {"flag": true, "nothing": null}
        }));
        assert_eq!(find_non_serializable(&value, &[]), None);
    }

    #[test]
    fn opaque_root_reports_root_path() {
        let found = find_non_serializable(&session_handle(), &[]);
        assert_eq!(
            found,
            Some(NonSerializable {
                key_path: ROOT_PATH.to_owned(),
                type_name: "Function".to_owned(),
            })
        );
    }

    #[test]
    fn nested_opaque_reports_dotted_path() {
        let value = Value::object([(
            "payload",
            Value::object([("callbacks", Value::Array(vec![Value::Null, session_handle()]))]),
        )]);

        let found = find_non_serializable(&value, &[]).map(|f| f.key_path);
        assert_eq!(found.as_deref(), Some("payload.callbacks.1"));
    }

    #[test]
    fn ignored_path_skips_whole_subtree() {
        let value = Value::object([(
            "meta",
            Value::object([
                ("arg", Value::object([("signal", session_handle())])),
                ("requestId", Value::from("r-1")),
            ]),
        )]);

        assert!(find_non_serializable(&value, &["meta.arg".to_owned()]).is_none());
        assert!(find_non_serializable(&value, &["meta".to_owned()]).is_none());
        assert!(find_non_serializable(&value, &["meta.requestId".to_owned()]).is_some());
    }

    #[test]
    fn keys_are_visited_in_sorted_order() {
        let value = Value::object([("zeta", session_handle()), ("alpha", session_handle())]);
        let found = find_non_serializable(&value, &[]).map(|f| f.key_path);
        assert_eq!(found.as_deref(), Some("alpha"));
    }

    #[test]
    fn get_path_walks_objects_and_arrays() {
        let value = Value::from(serde_json::json!({"profile": {"emails": ["a@x", "b@x"]}}));
        assert_eq!(
            value.get_path("profile.emails.1").and_then(Value::as_str),
            Some("b@x")
        );
        assert_eq!(value.get_path(""), Some(&value));
        assert!(value.get_path("profile.emails.9").is_none());
        assert!(value.get_path("profile.name").is_none());
    }

    #[test]
    fn opaque_values_compare_by_identity() {
        let a = Opaque::new(5_u8);
        let b = a.clone();
        let c = Opaque::new(5_u8);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.downcast_ref::<u8>(), Some(&5));
        assert_eq!(a.type_name(), "u8");
    }

    #[test]
    fn serializing_opaque_fails() {
        let value = Value::object([("cb", session_handle())]);
        let err = serde_json::to_string(&value);
        assert!(err.is_err());
    }

    #[test]
    fn integral_numbers_serialize_without_fraction() -> Result<(), serde_json::Error> {
        let value = Value::object([("count", Value::from(3)), ("ratio", Value::from(0.5))]);
        assert_eq!(serde_json::to_string(&value)?, r#"{"count":3,"ratio":0.5}"#);
        Ok(())
    }

    #[test]
    fn inspect_option_and_map() {
        let mut prefs = BTreeMap::new();
        prefs.insert("theme".to_owned(), "dark".to_owned());
        assert_eq!(
            prefs.inspect(),
            Value::object([("theme", Value::from("dark"))])
        );
        assert_eq!(Inspect::inspect(&None::<String>), Value::Null);
    }

    proptest! {
        #[test]
        fn json_values_are_always_serializable(n in any::<i64>(), s in ".*", b in any::<bool>()) {
            let value = Value::from(serde_json::json!({"n": n, "s": s, "list": [b, null]}));
            prop_assert!(find_non_serializable(&value, &[]).is_none());
        }
    }
}
