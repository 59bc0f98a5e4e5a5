//! The `user` slice.
//!
//! Holds the signed-in user's profile and their preferences.
//!
//! | action | effect on state |
//! |--------|-----------------|
//! | `user/setProfile` `{id, name, email}` | profile replaced |
//! | `user/updatePreference` `{key, value}` | one preference set |
//! | `user/clear` | back to the initial state |
//! | `auth/logout` | profile dropped, preferences kept |
//!
//! Preference values are stored as given. A non-serializable value ends up in
//! the state and is reported by the serializability check.

use crate::auth;
use serde::{Deserialize, Serialize};
use slicestore_core::{smallvec, Action, Effect, Inspect, Reducer, SmallVec, Value};
use std::collections::BTreeMap;

/// `user/setProfile`
pub const SET_PROFILE: &str = "user/setProfile";
/// `user/updatePreference`
pub const UPDATE_PREFERENCE: &str = "user/updatePreference";
/// `user/clear`
pub const CLEAR: &str = "user/clear";

/// Profile of the signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Account id
    pub id: String,
    /// Display name
    pub name: String,
    /// Contact address
    pub email: String,
}

impl UserProfile {
    fn from_payload(payload: &Value) -> Option<Self> {
        let json = serde_json::to_value(payload).ok()?;
        serde_json::from_value(json).ok()
    }

    fn to_value(&self) -> Value {
        Value::object([
            ("id", Value::from(self.id.as_str())),
            ("name", Value::from(self.name.as_str())),
            ("email", Value::from(self.email.as_str())),
        ])
    }
}

/// State owned by the `user` slice
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserState {
    /// Profile, once loaded
    pub profile: Option<UserProfile>,
    /// Free-form preferences
    pub preferences: BTreeMap<String, Value>,
}

impl Inspect for UserState {
    fn inspect(&self) -> Value {
        Value::object([
            (
                "profile",
                self.profile.as_ref().map_or(Value::Null, UserProfile::to_value),
            ),
            ("preferences", self.preferences.inspect()),
        ])
    }
}

/// Reducer for the `user` slice
#[derive(Debug, Clone, Copy, Default)]
pub struct UserReducer;

impl UserReducer {
    /// Create the reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Reducer for UserReducer {
    type State = UserState;
    type Action = Action;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action.action_type.as_str() {
            SET_PROFILE => match UserProfile::from_payload(&action.payload) {
                Some(profile) => state.profile = Some(profile),
                None => tracing::debug!(%action, "Ignoring malformed profile"),
            },
            UPDATE_PREFERENCE => match action.payload_str("key") {
                Some(key) => {
                    let value = action.payload.get_path("value").cloned().unwrap_or_default();
                    state.preferences.insert(key.to_owned(), value);
                },
                None => tracing::debug!(%action, "Ignoring preference update without a key"),
            },
            CLEAR => *state = UserState::default(),
            auth::LOGOUT => state.profile = None,
            _ => {},
        }
        smallvec![Effect::None]
    }
}

/// `user/setProfile`
#[must_use]
pub fn set_profile(profile: &UserProfile) -> Action {
    Action::new(SET_PROFILE).with_payload(profile.to_value())
}

/// `user/updatePreference`
#[must_use]
pub fn update_preference(key: impl Into<String>, value: impl Into<Value>) -> Action {
    Action::new(UPDATE_PREFERENCE).with_payload(Value::object([
        ("key", Value::String(key.into())),
        ("value", value.into()),
    ]))
}

/// `user/clear`
#[must_use]
pub fn clear() -> Action {
    Action::new(CLEAR)
}
