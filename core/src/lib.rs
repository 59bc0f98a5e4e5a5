//! # Slicestore Core
//!
//! Core traits and types for slicestore, a client-side state container built
//! on the Reducer pattern.
//!
//! ## Core Concepts
//!
//! - **State**: The data owned by one slice, or the root tree of all slices
//! - **Action**: A tagged record (`type` + free-form `payload`) flowing into the store
//! - **Reducer**: Function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Description of async follow-up work (not its execution)
//! - **Value**: Dynamic payload tree, including non-serializable handles
//!
//! ## Example
//!
//! ```
//! use slicestore_core::{smallvec, Action, Effect, Reducer, SmallVec};
//!
//! #[derive(Clone, Debug, Default)]
//! struct SessionState {
//!     token: Option<String>,
//! }
//!
//! struct SessionReducer;
//!
//! impl Reducer for SessionReducer {
//!     type State = SessionState;
//!     type Action = Action;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut SessionState,
//!         action: Action,
//!         _env: &(),
//!     ) -> SmallVec<[Effect<Action>; 4]> {
//!         if action.is("session/login") {
//!             state.token = action.payload.get_path("token").and_then(|t| t.as_str()).map(str::to_owned);
//!         }
//!         smallvec![Effect::None]
//!     }
//! }
//!
//! let mut state = SessionState::default();
//! let action = Action::new("session/login").with_payload(serde_json::json!({"token": "abc"}));
//! let _ = SessionReducer.reduce(&mut state, action, &());
//! assert_eq!(state.token.as_deref(), Some("abc"));
//! ```

pub use smallvec::{smallvec, SmallVec};

/// Tagged action records and the action type names the store special-cases
pub mod action;

/// Reducer composition utilities
pub mod composition;

/// Dynamic payload values and serializability inspection
pub mod value;

pub use action::{Action, ActionType, PERSIST, REHYDRATE};
pub use effect::Effect;
pub use reducer::Reducer;
pub use value::{find_non_serializable, Inspect, NonSerializable, Opaque, Value};

/// Reducer module - The core trait for state transitions
///
/// Reducers are functions: `(State, Action, Environment) → (State, Effects)`
///
/// They mutate the state they are handed in place, never block, and describe
/// any async follow-up work as [`Effect`](crate::effect::Effect) values.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for state transitions
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer owns
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for UserReducer {
    ///     type State = UserState;
    ///     type Action = Action;
    ///     type Environment = ();
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut UserState,
    ///         action: Action,
    ///         _env: &(),
    ///     ) -> SmallVec<[Effect<Action>; 4]> {
    ///         if action.is("user/clear") {
    ///             *state = UserState::default();
    ///         }
    ///         smallvec![Effect::None]
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// 1. Inspects the action
        /// 2. Updates state in place (or leaves it untouched)
        /// 3. Returns effect descriptions to be executed by the store
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe async follow-up work to be performed by the store.
/// They are values (not execution); whatever action an effect yields is
/// dispatched back through the store, middleware included.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are returned from reducers
    /// and run by the store after the state update has been published and
    /// listeners have been notified.
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Run effects sequentially
        Sequential(Vec<Effect<Action>>),

        /// Delayed action (timeouts, debounced saves)
        Delay {
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after delay
            action: Box<Action>,
        },

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is dispatched back into the store
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Whether this effect does nothing when executed
        ///
        /// Nested `Parallel`/`Sequential` effects are no-ops when all of their
        /// children are.
        #[must_use]
        pub fn is_none(&self) -> bool {
            match self {
                Effect::None => true,
                Effect::Parallel(effects) | Effect::Sequential(effects) => {
                    effects.iter().all(Effect::is_none)
                },
                Effect::Delay { .. } | Effect::Future(_) => false,
            }
        }

        /// Transform the action type produced by this effect
        ///
        /// Used when a reducer written against a narrower action type is
        /// embedded in a larger one.
        #[must_use]
        pub fn map<B, F>(self, f: F) -> Effect<B>
        where
            Action: Send + 'static,
            B: 'static,
            F: Fn(Action) -> B + Clone + Send + 'static,
        {
            match self {
                Effect::None => Effect::None,
                Effect::Parallel(effects) => {
                    Effect::Parallel(effects.into_iter().map(|e| e.map(f.clone())).collect())
                },
                Effect::Sequential(effects) => {
                    Effect::Sequential(effects.into_iter().map(|e| e.map(f.clone())).collect())
                },
                Effect::Delay { duration, action } => Effect::Delay {
                    duration,
                    action: Box::new(f(*action)),
                },
                Effect::Future(fut) => Effect::Future(Box::pin(async move { fut.await.map(f) })),
            }
        }
    }
}
