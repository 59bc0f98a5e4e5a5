//! Middleware - interceptors run around every dispatch
//!
//! A middleware sees each action twice: before the reducer runs (with the
//! current state) and after the new state has been published. Middleware
//! run in chain order both times.
//!
//! An error from [`Middleware::before_reduce`] aborts the dispatch: the
//! reducer does not run and listeners are not notified. An error from
//! [`Middleware::after_reduce`] is returned to the caller of `dispatch`, but
//! the state update stands and listeners are still notified.

use crate::error::StoreError;
use crate::serializable::{SerializableCheck, SerializableCheckOptions};
use slicestore_core::{ActionType, Inspect};
use std::fmt;

/// An interceptor invoked around every dispatch
pub trait Middleware<S, A>: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Called before the reducer with the state the action will be applied to
    ///
    /// # Errors
    ///
    /// Returning an error aborts the dispatch.
    fn before_reduce(&self, _action: &A, _state: &S) -> Result<(), StoreError> {
        Ok(())
    }

    /// Called after the reducer with the newly published state
    ///
    /// # Errors
    ///
    /// The error is reported to the caller of `dispatch`; the state update stands.
    fn after_reduce(&self, _action: &A, _state: &S) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Ordered list of middleware
pub struct MiddlewareChain<S, A> {
    middleware: Vec<Box<dyn Middleware<S, A>>>,
}

impl<S, A> MiddlewareChain<S, A> {
    /// An empty chain
    #[must_use]
    pub const fn new() -> Self {
        Self {
            middleware: Vec::new(),
        }
    }

    /// Append a middleware (runs after everything already in the chain)
    #[must_use]
    pub fn push(mut self, middleware: impl Middleware<S, A> + 'static) -> Self {
        self.middleware.push(Box::new(middleware));
        self
    }

    /// Prepend a middleware (runs before everything already in the chain)
    #[must_use]
    pub fn prepend(mut self, middleware: impl Middleware<S, A> + 'static) -> Self {
        self.middleware.insert(0, Box::new(middleware));
        self
    }

    /// Number of middleware in the chain
    #[must_use]
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    /// Whether the chain is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Middleware names in chain order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }

    /// Run every `before_reduce` hook, stopping at the first error
    pub(crate) fn before_reduce(&self, action: &A, state: &S) -> Result<(), StoreError> {
        self.middleware
            .iter()
            .try_for_each(|m| m.before_reduce(action, state))
    }

    /// Run every `after_reduce` hook, returning the first error
    ///
    /// All hooks run even if an earlier one fails.
    pub(crate) fn after_reduce(&self, action: &A, state: &S) -> Result<(), StoreError> {
        let mut first_error = None;
        for middleware in &self.middleware {
            if let Err(error) = middleware.after_reduce(action, state) {
                tracing::debug!(middleware = middleware.name(), %error, "after_reduce failed");
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl<S, A> Default for MiddlewareChain<S, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, A> fmt::Debug for MiddlewareChain<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Options for [`default_middleware`]
///
/// `serializable_check: None` leaves the serializability check out.
#[derive(Debug, Clone)]
pub struct DefaultMiddlewareOptions {
    /// Serializability check configuration
    pub serializable_check: Option<SerializableCheckOptions>,
}

impl DefaultMiddlewareOptions {
    /// Configure the serializability check
    #[must_use]
    pub fn with_serializable_check(mut self, options: SerializableCheckOptions) -> Self {
        self.serializable_check = Some(options);
        self
    }

    /// Leave the serializability check out
    #[must_use]
    pub fn without_serializable_check(mut self) -> Self {
        self.serializable_check = None;
        self
    }
}

impl Default for DefaultMiddlewareOptions {
    fn default() -> Self {
        Self {
            serializable_check: Some(SerializableCheckOptions::default()),
        }
    }
}

/// Build the default middleware chain
///
/// Currently just the serializability check. There is no immutability check:
/// state can only be changed through `&mut` inside a reducer.
#[must_use]
pub fn default_middleware<S, A>(options: DefaultMiddlewareOptions) -> MiddlewareChain<S, A>
where
    S: Inspect + 'static,
    A: ActionType + Inspect + 'static,
{
    let chain = MiddlewareChain::new();
    match options.serializable_check {
        Some(check) => chain.push(SerializableCheck::new(check)),
        None => chain,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slicestore_core::{Action, Value};
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
        fail_before: bool,
        fail_after: bool,
    }

    impl Recorder {
        fn new(name: &'static str, log: &Log) -> Self {
            Self {
                name,
                log: Arc::clone(log),
                fail_before: false,
                fail_after: false,
            }
        }

        fn record(&self, phase: &str) {
            if let Ok(mut log) = self.log.lock() {
                log.push(format!("{}:{phase}", self.name));
            }
        }
    }

    impl Middleware<Value, Action> for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn before_reduce(&self, _action: &Action, _state: &Value) -> Result<(), StoreError> {
            self.record("before");
            if self.fail_before {
                return Err(StoreError::middleware(self.name, "refused"));
            }
            Ok(())
        }

        fn after_reduce(&self, _action: &Action, _state: &Value) -> Result<(), StoreError> {
            self.record("after");
            if self.fail_after {
                return Err(StoreError::middleware(self.name, "complained"));
            }
            Ok(())
        }
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    #[test]
    fn hooks_run_in_chain_order() {
        let log = Log::default();
        let chain = MiddlewareChain::new()
            .push(Recorder::new("b", &log))
            .prepend(Recorder::new("a", &log));

        assert_eq!(chain.names(), vec!["a", "b"]);

        let action = Action::new("user/clear");
        assert!(chain.before_reduce(&action, &Value::Null).is_ok());
        assert!(chain.after_reduce(&action, &Value::Null).is_ok());
        assert_eq!(entries(&log), vec!["a:before", "b:before", "a:after", "b:after"]);
    }

    #[test]
    fn before_reduce_stops_at_first_error() {
        let log = Log::default();
        let mut refusing = Recorder::new("a", &log);
        refusing.fail_before = true;
        let chain = MiddlewareChain::new()
            .push(refusing)
            .push(Recorder::new("b", &log));

        let result = chain.before_reduce(&Action::new("auth/login"), &Value::Null);
        assert!(matches!(result, Err(StoreError::Middleware { ref name, .. }) if name == "a"));
        assert_eq!(entries(&log), vec!["a:before"]);
    }

    #[test]
    fn after_reduce_runs_every_hook() {
        let log = Log::default();
        let mut complaining = Recorder::new("a", &log);
        complaining.fail_after = true;
        let chain = MiddlewareChain::new()
            .push(complaining)
            .push(Recorder::new("b", &log));

        let result = chain.after_reduce(&Action::new("auth/login"), &Value::Null);
        assert!(result.is_err());
        assert_eq!(entries(&log), vec!["a:after", "b:after"]);
    }

    #[test]
    fn default_chain_holds_serializable_check() {
        let chain: MiddlewareChain<Value, Action> =
            default_middleware(DefaultMiddlewareOptions::default());
        assert_eq!(chain.names(), vec![crate::serializable::MIDDLEWARE_NAME]);

        let bare: MiddlewareChain<Value, Action> =
            default_middleware(DefaultMiddlewareOptions::default().without_serializable_check());
        assert!(bare.is_empty());
    }
}
