//! Store assembly.
//!
//! The root state is `{ auth, user }`; each key is owned by its slice
//! reducer, and every action reaches both. The middleware chain is the
//! default one, with `persist/PERSIST` exempt from the serializability check.

use crate::auth::{AuthReducer, AuthState};
use crate::config::ClientConfig;
use crate::user::{UserReducer, UserState};
use slicestore_core::composition::{slice, SliceReducer};
use slicestore_core::{Action, Effect, Inspect, Reducer, SmallVec, Value};
use slicestore_runtime::{Store, StoreConfig};
use std::sync::OnceLock;
use thiserror::Error;

/// Root key of the auth slice
pub const AUTH_KEY: &str = "auth";
/// Root key of the user slice
pub const USER_KEY: &str = "user";

/// The application's root state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootState {
    /// Owned by the auth reducer
    pub auth: AuthState,
    /// Owned by the user reducer
    pub user: UserState,
}

impl Inspect for RootState {
    fn inspect(&self) -> Value {
        Value::object([(AUTH_KEY, self.auth.inspect()), (USER_KEY, self.user.inspect())])
    }
}

fn auth_of(state: &mut RootState) -> &mut AuthState {
    &mut state.auth
}

fn user_of(state: &mut RootState) -> &mut UserState {
    &mut state.user
}

/// Root reducer: runs the auth slice, then the user slice, on every action
///
/// Generic over the slice reducers so they can be replaced in tests.
pub struct RootReducer<AR = AuthReducer, UR = UserReducer>
where
    AR: Reducer<State = AuthState, Action = Action, Environment = ()>,
    UR: Reducer<State = UserState, Action = Action, Environment = ()>,
{
    auth: SliceReducer<RootState, AuthState, Action, (), AR>,
    user: SliceReducer<RootState, UserState, Action, (), UR>,
}

impl<AR, UR> RootReducer<AR, UR>
where
    AR: Reducer<State = AuthState, Action = Action, Environment = ()>,
    UR: Reducer<State = UserState, Action = Action, Environment = ()>,
{
    /// Combine the two slice reducers under their root keys
    #[must_use]
    pub fn new(auth: AR, user: UR) -> Self {
        Self {
            auth: slice(AUTH_KEY, auth, auth_of),
            user: slice(USER_KEY, user, user_of),
        }
    }

    /// Root keys, in the order their reducers run
    #[must_use]
    pub const fn keys(&self) -> [&'static str; 2] {
        [self.auth.name(), self.user.name()]
    }
}

impl<AR, UR> Reducer for RootReducer<AR, UR>
where
    AR: Reducer<State = AuthState, Action = Action, Environment = ()>,
    UR: Reducer<State = UserState, Action = Action, Environment = ()>,
{
    type State = RootState;
    type Action = Action;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        // Same as `combine_reducers`, without boxing the slices into `dyn Reducer + Send + Sync`.
        let mut effects = self.auth.reduce(state, action.clone(), env);
        effects.extend(self.user.reduce(state, action, env));
        effects
    }
}

/// The application store
pub type AppStore<AR = AuthReducer, UR = UserReducer> = Store<RootState, Action, (), RootReducer<AR, UR>>;

/// Build a store from two slice reducers
///
/// Each slice starts from its initial state.
#[must_use]
pub fn configure_store<AR, UR>(auth: AR, user: UR, config: StoreConfig) -> AppStore<AR, UR>
where
    AR: Reducer<State = AuthState, Action = Action, Environment = ()> + Send + Sync + 'static,
    UR: Reducer<State = UserState, Action = Action, Environment = ()> + Send + Sync + 'static,
{
    let reducer = RootReducer::new(auth, user);
    tracing::info!(keys = ?reducer.keys(), "Configuring store");
    Store::with_config(RootState::default(), reducer, (), config)
}

/// Build the application store with default configuration
///
/// The serializability check is on and ignores `persist/PERSIST`.
#[must_use]
pub fn initialize() -> AppStore {
    initialize_with(&ClientConfig::default())
}

/// Build the application store from `config`
#[must_use]
pub fn initialize_with(config: &ClientConfig) -> AppStore {
    configure_store(AuthReducer::new(), UserReducer::new(), config.store_config())
}

static SHARED: OnceLock<AppStore> = OnceLock::new();

/// Returned by [`install`] when the process-wide store already exists
#[derive(Debug, Error)]
#[error("the process-wide store is already installed")]
pub struct AlreadyInstalled;

/// Make `store` the process-wide store returned by [`shared`]
///
/// Call once from the entry point, before anything reads [`shared`].
///
/// # Errors
///
/// Returns [`AlreadyInstalled`] if a store was installed earlier or
/// [`shared`] has already built the default one.
pub fn install(store: AppStore) -> Result<AppStore, AlreadyInstalled> {
    SHARED.set(store.clone()).map_err(|_| AlreadyInstalled)?;
    tracing::debug!("Process-wide store installed");
    Ok(store)
}

/// The process-wide store
///
/// The store passed to [`install`], or one built with [`initialize`] on
/// first access if nothing was installed. Every call returns a handle onto
/// the same state.
#[must_use]
pub fn shared() -> AppStore {
    SHARED.get_or_init(initialize).clone()
}
