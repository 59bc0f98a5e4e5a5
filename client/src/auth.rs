//! The `auth` slice.
//!
//! Tracks the session token and the state of the login flow.
//!
//! | action | effect on state |
//! |--------|-----------------|
//! | `auth/loginPending` | status becomes `Pending`, error cleared |
//! | `auth/login` `{token}` | status becomes `Authenticated`, token stored |
//! | `auth/loginFailed` `{message}` | status becomes `Failed`, token dropped, error stored |
//! | `auth/logout` | back to the initial state |
//! | `persist/REHYDRATE` `{auth: {token}}` | token restored, status `Authenticated` |
//!
//! Anything else, including the above with a malformed payload, leaves the
//! state untouched.

use slicestore_core::{smallvec, Action, Effect, Inspect, Reducer, SmallVec, Value, REHYDRATE};
use std::fmt;

/// `auth/loginPending`
pub const LOGIN_PENDING: &str = "auth/loginPending";
/// `auth/login`
pub const LOGIN: &str = "auth/login";
/// `auth/loginFailed`
pub const LOGIN_FAILED: &str = "auth/loginFailed";
/// `auth/logout`
pub const LOGOUT: &str = "auth/logout";

/// Where the login flow stands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthStatus {
    /// No session
    #[default]
    Anonymous,
    /// Credentials submitted, waiting for the server
    Pending,
    /// Holding a session token
    Authenticated,
    /// Last attempt was refused
    Failed,
}

impl AuthStatus {
    /// Lower-case name, as shown in diagnostics
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Pending => "pending",
            Self::Authenticated => "authenticated",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State owned by the `auth` slice
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    /// Session token, if logged in
    pub token: Option<String>,
    /// Login flow status
    pub status: AuthStatus,
    /// Message of the last failed attempt
    pub error: Option<String>,
}

impl AuthState {
    /// Whether a session token is held
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.status, AuthStatus::Authenticated)
    }
}

impl Inspect for AuthState {
    fn inspect(&self) -> Value {
        Value::object([
            ("token", Inspect::inspect(&self.token)),
            ("status", Value::from(self.status.as_str())),
            ("error", Inspect::inspect(&self.error)),
        ])
    }
}

/// Reducer for the `auth` slice
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthReducer;

impl AuthReducer {
    /// Create the reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Reducer for AuthReducer {
    type State = AuthState;
    type Action = Action;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action.action_type.as_str() {
            LOGIN_PENDING => {
                state.status = AuthStatus::Pending;
                state.error = None;
            },
            LOGIN => match action.payload_str("token") {
                Some(token) => {
                    state.token = Some(token.to_owned());
                    state.status = AuthStatus::Authenticated;
                    state.error = None;
                },
                None => tracing::debug!(%action, "Ignoring login without a token"),
            },
            LOGIN_FAILED => {
                let message = action
                    .payload_str("message")
                    .unwrap_or("login failed")
                    .to_owned();
                state.token = None;
                state.status = AuthStatus::Failed;
                state.error = Some(message);
            },
            LOGOUT => *state = AuthState::default(),
            REHYDRATE => {
                if let Some(token) = action.payload_str("auth.token") {
                    state.token = Some(token.to_owned());
                    state.status = AuthStatus::Authenticated;
                    state.error = None;
                }
            },
            _ => {},
        }
        smallvec![Effect::None]
    }
}

/// `auth/loginPending`
#[must_use]
pub fn login_pending() -> Action {
    Action::new(LOGIN_PENDING)
}

/// `auth/login` carrying `token`
#[must_use]
pub fn login(token: impl Into<String>) -> Action {
    Action::new(LOGIN).with_payload(Value::object([("token", Value::String(token.into()))]))
}

/// `auth/loginFailed` carrying `message`
#[must_use]
pub fn login_failed(message: impl Into<String>) -> Action {
    Action::new(LOGIN_FAILED)
        .with_payload(Value::object([("message", Value::String(message.into()))]))
        .as_error()
}

/// `auth/logout`
#[must_use]
pub fn logout() -> Action {
    Action::new(LOGOUT)
}
