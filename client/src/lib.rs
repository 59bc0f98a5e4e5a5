//! # Slicestore Client
//!
//! The application's store: an `auth` slice and a `user` slice combined into
//! one root state, behind the default middleware chain.
//!
//! ## Example
//!
//! ```no_run
//! use slicestore_client::{auth, initialize};
//!
//! # async fn example() -> Result<(), slicestore_runtime::StoreError> {
//! let store = initialize();
//!
//! let subscription = store.subscribe(|| tracing::info!("state changed"));
//! store.dispatch(auth::login("abc")).await?;
//!
//! assert_eq!(store.get_state().auth.token.as_deref(), Some("abc"));
//! subscription.unsubscribe();
//! # Ok(())
//! # }
//! ```
//!
//! Most code should receive the store as an argument. [`shared()`] exists for
//! places that cannot, and always refers to the same store: the one the
//! entry point handed to [`install()`], or a default one if none was.

/// The `auth` slice
pub mod auth;

/// Environment configuration
pub mod config;

/// Store assembly
pub mod store;

/// The `user` slice
pub mod user;

pub use auth::{AuthReducer, AuthState, AuthStatus};
pub use config::{ClientConfig, ConfigError};
pub use store::{
    configure_store, initialize, initialize_with, install, shared, AlreadyInstalled, AppStore, RootReducer,
    RootState,
};
pub use user::{UserProfile, UserReducer, UserState};
