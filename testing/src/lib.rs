//! # Slicestore Testing
//!
//! Testing utilities and helpers for slicestore.
//!
//! This crate provides:
//! - [`ReducerTest`]: Given-When-Then harness for reducers
//! - [`mocks`]: stub reducers and recording listeners
//! - [`helpers`]: folding actions through a reducer, test tracing setup
//! - [`properties`]: proptest strategies for values and actions
//!
//! ## Example
//!
//! ```ignore
//! use slicestore_testing::{helpers::fold, mocks::RecordingListener};
//!
//! #[tokio::test]
//! async fn test_login_flow() {
//!     let store = initialize();
//!     let (listener, _subscription) = RecordingListener::attach(&store, |s| s.auth.clone());
//!
//!     store.dispatch(login("abc")).await.unwrap();
//!
//!     assert_eq!(listener.count(), 1);
//!     assert_eq!(store.get_state().auth, fold(AuthReducer, &(), [login("abc")]));
//! }
//! ```


pub use reducer_test::{assertions, ReducerTest};

/// Mock collaborators for store and slice tests
pub mod mocks {
    use slicestore_core::{smallvec, Action, Effect, Inspect, Reducer, SmallVec};
    use slicestore_runtime::{Store, Subscription};
    use std::sync::{Arc, Mutex, PoisonError};

    type StubFn<S> = dyn Fn(&mut S, &Action) + Send + Sync;

    /// A slice reducer with a documented, test-supplied contract
    ///
    /// Applies the given function to every action and remembers every action
    /// type it saw. Clones share the record.
    ///
    /// # Example
    ///
    /// ```
    /// use slicestore_core::{Action, Reducer};
    /// use slicestore_testing::mocks::StubReducer;
    ///
    /// // Contract: "counter/add" adds 1, everything else is ignored.
    /// let stub = StubReducer::new(|count: &mut u32, action: &Action| {
    ///     if action.is("counter/add") {
    ///         *count += 1;
    ///     }
    /// });
    ///
    /// let mut count = 0;
    /// let _ = stub.reduce(&mut count, Action::new("counter/add"), &());
    /// let _ = stub.reduce(&mut count, Action::new("other/thing"), &());
    /// assert_eq!(count, 1);
    /// assert_eq!(stub.seen(), vec!["counter/add", "other/thing"]);
    /// ```
    pub struct StubReducer<S> {
        apply: Arc<StubFn<S>>,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl<S> StubReducer<S> {
        /// Create a stub from its contract
        pub fn new<F>(apply: F) -> Self
        where
            F: Fn(&mut S, &Action) + Send + Sync + 'static,
        {
            Self {
                apply: Arc::new(apply),
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// A stub that never changes its state
        #[must_use]
        pub fn inert() -> Self {
            Self::new(|_, _| {})
        }

        /// Types of every action seen, in order
        #[must_use]
        pub fn seen(&self) -> Vec<String> {
            self.seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    impl<S> Clone for StubReducer<S> {
        fn clone(&self) -> Self {
            Self {
                apply: Arc::clone(&self.apply),
                seen: Arc::clone(&self.seen),
            }
        }
    }

    impl<S> Reducer for StubReducer<S> {
        type State = S;
        type Action = Action;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            self.seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(action.action_type.clone());
            (self.apply)(state, &action);
            smallvec![Effect::None]
        }
    }

    /// A change listener that records a value read from the store on every call
    ///
    /// Clones share the record.
    pub struct RecordingListener<T> {
        calls: Arc<Mutex<Vec<T>>>,
    }

    impl<T> Clone for RecordingListener<T> {
        fn clone(&self) -> Self {
            Self {
                calls: Arc::clone(&self.calls),
            }
        }
    }

    impl<T: Clone + Send + 'static> RecordingListener<T> {
        /// Subscribe to `store`, recording `read(state)` on every notification
        pub fn attach<S, E, R, F>(store: &Store<S, Action, E, R>, read: F) -> (Self, Subscription)
        where
            R: Reducer<State = S, Action = Action, Environment = E> + Send + Sync + 'static,
            S: Inspect + Clone + Send + Sync + 'static,
            E: Send + Sync + 'static,
            F: Fn(&S) -> T + Send + Sync + 'static,
        {
            let listener = Self {
                calls: Arc::new(Mutex::new(Vec::new())),
            };
            let record = Arc::clone(&listener.calls);
            let observed = store.clone();
            let subscription = store.subscribe(move || {
                let value = observed.state(&read);
                record
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(value);
            });
            (listener, subscription)
        }

        /// Values recorded so far, oldest first
        #[must_use]
        pub fn calls(&self) -> Vec<T> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Number of notifications received
        #[must_use]
        pub fn count(&self) -> usize {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        }
    }
}

/// Test helpers and utilities
pub mod helpers {
    use slicestore_core::Reducer;
    use std::sync::Once;

    /// Apply `actions` in order to the reducer's default state
    ///
    /// This is the reference result a slice must reach inside a store that
    /// received the same actions.
    pub fn fold<R, I>(reducer: &R, env: &R::Environment, actions: I) -> R::State
    where
        R: Reducer,
        R::State: Default,
        I: IntoIterator<Item = R::Action>,
    {
        let mut state = R::State::default();
        for action in actions {
            let _ = reducer.reduce(&mut state, action, env);
        }
        state
    }

    /// Install a test-friendly tracing subscriber once per process
    ///
    /// Honours `RUST_LOG`; output is captured by the test harness.
    pub fn init_test_tracing() {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "warn".into()),
                )
                .with_test_writer()
                .try_init();
        });
    }
}

/// Property-based testing utilities
///
/// Strategies for the dynamic values and actions the store handles.
pub mod properties {
    use proptest::prelude::*;
    use slicestore_core::{Action, Opaque, Value};
    use std::collections::BTreeMap;

    /// Plain (fully serializable) values, nested up to three levels
    pub fn arb_plain_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            (-1_000_000_i32..1_000_000).prop_map(Value::from),
            "[a-z]{0,8}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|m: BTreeMap<String, Value>| Value::Object(m)),
            ]
        })
    }

    /// Values that may contain an opaque (non-serializable) entry
    pub fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            4 => arb_plain_value(),
            1 => Just(Value::Opaque(Opaque::named("Function", || ()))),
            1 => ("[a-z]{1,6}", arb_plain_value()).prop_map(|(key, plain)| {
                Value::object([
                    (key, plain),
                    ("handle".to_owned(), Value::Opaque(Opaque::named("Handle", ()))),
                ])
            }),
        ]
    }

    /// Action types of the shape `slice/case`
    pub fn arb_action_type() -> impl Strategy<Value = String> {
        ("(auth|user|persist|misc)", "[a-zA-Z]{1,10}").prop_map(|(slice, case)| format!("{slice}/{case}"))
    }

    /// Actions with plain payloads
    pub fn arb_action() -> impl Strategy<Value = Action> {
        (arb_action_type(), arb_plain_value())
            .prop_map(|(action_type, payload)| Action::new(action_type).with_payload(payload))
    }
}
