//! Reducer composition utilities
//!
//! This module provides utilities for composing reducers in various ways:
//! - **`combine_reducers`**: Run multiple reducers on the same state/action
//! - **`slice`**: Give a reducer ownership of one key of the root state
//!
//! A root reducer is usually a [`combine_reducers`] over one [`slice`] per
//! key. Every slice sees every action, so a slice may react to another
//! slice's actions (e.g. clearing the user profile on `auth/logout`).
//!
//! # Examples
//!
//! ```
//! use slicestore_core::{smallvec, Action, Effect, Reducer, SmallVec};
//! use slicestore_core::composition::{combine_reducers, slice};
//!
//! #[derive(Clone, Debug, Default)]
//! struct Root {
//!     hits: u32,
//!     name: String,
//! }
//!
//! struct HitsReducer;
//! struct NameReducer;
//!
//! impl Reducer for HitsReducer {
//!     type State = u32;
//!     type Action = Action;
//!     type Environment = ();
//!
//!     fn reduce(&self, state: &mut u32, action: Action, _env: &()) -> SmallVec<[Effect<Action>; 4]> {
//!         if action.is("hits/add") {
//!             *state += 1;
//!         }
//!         smallvec![Effect::None]
//!     }
//! }
//!
//! impl Reducer for NameReducer {
//!     type State = String;
//!     type Action = Action;
//!     type Environment = ();
//!
//!     fn reduce(&self, state: &mut String, action: Action, _env: &()) -> SmallVec<[Effect<Action>; 4]> {
//!         if let Some(name) = action.payload_str("name") {
//!             state.clear();
//!             state.push_str(name);
//!         }
//!         smallvec![Effect::None]
//!     }
//! }
//!
//! let root = combine_reducers(vec![
//!     Box::new(slice("hits", HitsReducer, |root: &mut Root| &mut root.hits)),
//!     Box::new(slice("name", NameReducer, |root: &mut Root| &mut root.name)),
//! ]);
//!
//! let mut state = Root::default();
//! let _ = root.reduce(&mut state, Action::new("hits/add"), &());
//! assert_eq!(state.hits, 1);
//! assert_eq!(state.name, "");
//! ```

use crate::effect::Effect;
use crate::reducer::Reducer;
use smallvec::SmallVec;

/// Combines multiple reducers that operate on the same state and action types.
///
/// Each reducer is run in sequence, and all effects are collected and concatenated.
///
/// # Type Parameters
///
/// - `S`: The state type
/// - `A`: The action type
/// - `E`: The environment type
#[must_use]
pub fn combine_reducers<S, A, E>(
    reducers: Vec<Box<dyn Reducer<State = S, Action = A, Environment = E> + Send + Sync>>,
) -> CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    CombinedReducer { reducers }
}

/// A combined reducer that runs multiple reducers in sequence.
///
/// Created by [`combine_reducers`].
pub struct CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    reducers: Vec<Box<dyn Reducer<State = S, Action = A, Environment = E> + Send + Sync>>,
}

impl<S, A, E> CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    /// Number of reducers combined
    #[must_use]
    pub fn len(&self) -> usize {
        self.reducers.len()
    }

    /// Whether no reducers were combined
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reducers.is_empty()
    }
}

impl<S, A, E> Reducer for CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let mut all_effects = SmallVec::new();

        for reducer in &self.reducers {
            let effects = reducer.reduce(state, action.clone(), env);
            all_effects.extend(effects);
        }

        all_effects
    }
}

/// Gives `reducer` ownership of one key of the root state.
///
/// The slice reducer sees every action dispatched to the root, and writes
/// only to the field `project` returns. Effects pass through unchanged.
pub fn slice<S, SubS, A, E, R>(
    name: &'static str,
    reducer: R,
    project: fn(&mut S) -> &mut SubS,
) -> SliceReducer<S, SubS, A, E, R>
where
    R: Reducer<State = SubS, Action = A, Environment = E>,
{
    SliceReducer {
        name,
        reducer,
        project,
        _phantom: std::marker::PhantomData,
    }
}

/// A reducer owning one key of the root state.
///
/// Created by [`slice`].
pub struct SliceReducer<S, SubS, A, E, R>
where
    R: Reducer<State = SubS, Action = A, Environment = E>,
{
    name: &'static str,
    reducer: R,
    project: fn(&mut S) -> &mut SubS,
    _phantom: std::marker::PhantomData<fn(A, &E)>,
}

impl<S, SubS, A, E, R> SliceReducer<S, SubS, A, E, R>
where
    R: Reducer<State = SubS, Action = A, Environment = E>,
{
    /// The root-state key this slice owns
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The wrapped slice reducer
    #[must_use]
    pub const fn inner(&self) -> &R {
        &self.reducer
    }
}

impl<S, SubS, A, E, R> Reducer for SliceReducer<S, SubS, A, E, R>
where
    R: Reducer<State = SubS, Action = A, Environment = E>,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        self.reducer.reduce((self.project)(state), action, env)
    }
}
