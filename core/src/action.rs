//! Tagged action records
//!
//! Actions are open records keyed by a string type (`"auth/login"`), so that
//! slices and the persistence layer, which are built independently, can all
//! talk to one store. The part of the type before the first `/` names the
//! slice that owns the action.

use crate::value::{Inspect, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of the action the persistence layer dispatches when it starts
///
/// Its payload carries callbacks, so the default store configuration exempts
/// it from the serializability check.
pub const PERSIST: &str = "persist/PERSIST";

/// Type of the action the persistence layer dispatches with restored state
pub const REHYDRATE: &str = "persist/REHYDRATE";

/// Access to the string type of an action
///
/// Middleware such as the serializability check is written against this
/// trait rather than against [`Action`] so that stores with their own action
/// enums can use it too.
pub trait ActionType {
    /// The action's type string, e.g. `"auth/login"`
    fn action_type(&self) -> &str;
}

/// A dispatched action
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Type string, `slice/case`
    #[serde(rename = "type")]
    pub action_type: String,
    /// Free-form payload
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
    /// Free-form metadata (request ids, thunk arguments)
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub meta: Value,
    /// Whether the payload describes a failure
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl Action {
    /// Create an action with no payload
    #[must_use]
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            payload: Value::Null,
            meta: Value::Null,
            error: false,
        }
    }

    /// Attach a payload
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Attach metadata
    #[must_use]
    pub fn with_meta(mut self, meta: impl Into<Value>) -> Self {
        self.meta = meta.into();
        self
    }

    /// Mark the action as describing a failure
    #[must_use]
    pub const fn as_error(mut self) -> Self {
        self.error = true;
        self
    }

    /// Whether this action has exactly the given type
    #[must_use]
    pub fn is(&self, action_type: &str) -> bool {
        self.action_type == action_type
    }

    /// The owning slice (`"auth"` for `"auth/login"`)
    #[must_use]
    pub fn slice_name(&self) -> Option<&str> {
        self.action_type.split_once('/').map(|(slice, _)| slice)
    }

    /// The case within the owning slice (`"login"` for `"auth/login"`)
    #[must_use]
    pub fn case_name(&self) -> Option<&str> {
        self.action_type.split_once('/').map(|(_, case)| case)
    }

    /// Whether this action belongs to the given slice
    #[must_use]
    pub fn belongs_to(&self, slice: &str) -> bool {
        self.slice_name() == Some(slice)
    }

    /// The payload entry at a dot-separated path, if it is a string
    #[must_use]
    pub fn payload_str(&self, path: &str) -> Option<&str> {
        self.payload.get_path(path).and_then(Value::as_str)
    }
}

impl ActionType for Action {
    fn action_type(&self) -> &str {
        &self.action_type
    }
}

impl Inspect for Action {
    fn inspect(&self) -> Value {
        let mut entries = vec![("type", Value::String(self.action_type.clone()))];
        if !self.payload.is_null() {
            entries.push(("payload", self.payload.clone()));
        }
        if !self.meta.is_null() {
            entries.push(("meta", self.meta.clone()));
        }
        if self.error {
            entries.push(("error", Value::Bool(true)));
        }
        Value::object(entries)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.action_type)
    }
}
