//! # Slicestore Runtime
//!
//! The Store: the single owner of application state.
//!
//! ## Core Components
//!
//! - **Store**: Holds the root state, runs the reducer for each dispatched
//!   action, notifies subscribers, and executes effects
//! - **Middleware**: Interceptors run before and after the reducer (the
//!   default chain holds the serializability check)
//! - **Subscriptions**: Synchronous change listeners, called in registration order
//!
//! ## Dispatch cycle
//!
//! One action is processed to completion before the next is accepted:
//!
//! 1. `before_reduce` middleware (may abort the dispatch)
//! 2. Reducer runs on a copy-on-write snapshot of the state
//! 3. New snapshot is published (`get_state()` now returns it)
//! 4. `after_reduce` middleware
//! 5. Listeners are called in registration order
//! 6. Effects start; any action they yield is dispatched through steps 1 to 6
//!
//! ## Example
//!
//! ```ignore
//! use slicestore_runtime::Store;
//!
//! let store = Store::new(RootState::default(), root_reducer, ());
//!
//! let subscription = store.subscribe(|| tracing::info!("state changed"));
//! store.dispatch(Action::new("auth/login").with_payload(json!({"token": "abc"}))).await?;
//!
//! let token = store.state(|s| s.auth.token.clone());
//! subscription.unsubscribe();
//! ```

use slicestore_core::{effect::Effect, reducer::Reducer};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Error types for the Store runtime
pub mod error;

/// Metric names recorded by the store
pub mod metrics;

/// Middleware trait, chain and default middleware
pub mod middleware;

/// Serializability check middleware
pub mod serializable;

/// Change listeners
pub mod subscription;

pub use error::StoreError;
pub use middleware::{default_middleware, DefaultMiddlewareOptions, Middleware, MiddlewareChain};
pub use serializable::{
    SerializableCheck, SerializableCheckOptions, Violation, ViolationLog, ViolationOrigin,
    ViolationPolicy, DEFAULT_LOG_CAPACITY,
};
pub use subscription::{Listener, Subscription};

/// Health check status levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthStatus {
    /// Store is accepting actions
    Healthy,

    /// Store is not accepting actions
    Unhealthy,
}

impl HealthStatus {
    /// Check if status is healthy
    #[must_use]
    pub const fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// Check if status is unhealthy
    #[must_use]
    pub const fn is_unhealthy(self) -> bool {
        matches!(self, Self::Unhealthy)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check result for a component
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Name of the component being checked
    pub component: String,

    /// Current health status
    pub status: HealthStatus,

    /// Optional message providing details
    pub message: Option<String>,

    /// Metadata (listener count, pending effects)
    pub metadata: Vec<(String, String)>,
}

impl HealthCheck {
    /// Create a healthy check result
    #[must_use]
    pub fn healthy(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Healthy,
            message: None,
            metadata: Vec::new(),
        }
    }

    /// Create an unhealthy check result
    #[must_use]
    pub fn unhealthy(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
            metadata: Vec::new(),
        }
    }

    /// Add metadata to the health check
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    /// Look up a metadata value
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Configuration for Store instances
///
/// # Example
///
/// ```
/// use slicestore_core::PERSIST;
/// use slicestore_runtime::{SerializableCheckOptions, StoreConfig};
/// use std::time::Duration;
///
/// let config = StoreConfig::default()
///     .with_serializable_check(SerializableCheckOptions::default().with_ignored_actions([PERSIST]))
///     .with_shutdown_timeout(Duration::from_secs(5));
///
/// assert!(config.middleware.serializable_check.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Options for the default middleware chain
    pub middleware: DefaultMiddlewareOptions,
    /// Capacity of the channel behind `subscribe_actions`
    pub broadcast_capacity: usize,
    /// Default timeout for graceful shutdown
    pub default_shutdown_timeout: Duration,
}

impl StoreConfig {
    /// Configure the serializability check
    #[must_use]
    pub fn with_serializable_check(mut self, options: SerializableCheckOptions) -> Self {
        self.middleware = self.middleware.with_serializable_check(options);
        self
    }

    /// Leave the serializability check out of the default chain
    #[must_use]
    pub fn without_serializable_check(mut self) -> Self {
        self.middleware = self.middleware.without_serializable_check();
        self
    }

    /// Set the action broadcast capacity
    #[must_use]
    pub const fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }

    /// Set the default shutdown timeout
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.default_shutdown_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            middleware: DefaultMiddlewareOptions::default(),
            broadcast_capacity: 16,
            default_shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Handle for tracking effect completion
///
/// Returned by [`Store::dispatch()`]. Resolves once every effect the reducer
/// returned for that action has finished. Effects of follow-up actions are
/// not tracked.
///
/// # Example
///
/// ```ignore
/// let mut handle = store.dispatch(Action::new("user/fetch")).await?;
/// handle.wait_with_timeout(Duration::from_secs(5)).await?;
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };
        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(tx),
        };

        (handle, tracking)
    }

    /// Create a handle that's already complete
    #[must_use]
    pub fn completed() -> Self {
        let (_tx, rx) = watch::channel(());
        Self {
            effects: Arc::new(AtomicUsize::new(0)),
            completion: rx,
        }
    }

    /// Number of effects still running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }

    /// Wait for all effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                // Every tracker is gone, so nothing can still be running.
                break;
            }
        }
    }

    /// Wait for all effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the timeout expires first.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.pending())
            .finish_non_exhaustive()
    }
}

/// Internal: tracking context passed through effect execution
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.notifier.send(());
        }
    }
}

/// Internal: RAII guard that decrements effect counter on drop
///
/// Ensures the effect counter is always decremented, even if the effect panics.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Guard that decrements an atomic counter on drop (for shutdown tracking)
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Store module - The runtime for reducers
pub mod store {
    use super::{
        metrics as names, Arc, AtomicBool, AtomicCounterGuard, AtomicUsize, DecrementGuard,
        Duration, Effect, EffectHandle, EffectTracking, HealthCheck, Ordering, Reducer,
        StoreConfig, StoreError,
    };
    use crate::middleware::{default_middleware, MiddlewareChain};
    use crate::subscription::{ListenerRegistry, Subscription};
    use futures::Stream;
    use slicestore_core::{ActionType, Inspect};
    use std::sync::{PoisonError, RwLock};
    use tokio::sync::{broadcast, watch, Mutex};

    /// The Store - single owner of application state
    ///
    /// The Store manages:
    /// 1. State (an `Arc` snapshot, replaced on every dispatch)
    /// 2. Reducer (state transitions)
    /// 3. Environment (injected dependencies)
    /// 4. Middleware (run around the reducer)
    /// 5. Listeners (notified after every dispatch)
    /// 6. Effect execution (with feedback loop)
    ///
    /// Cloning a store is cheap; every clone is a handle onto the same state.
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<Arc<S>>>,
        dispatch_lock: Arc<Mutex<()>>,
        reducer: Arc<R>,
        environment: Arc<E>,
        middleware: Arc<MiddlewareChain<S, A>>,
        listeners: ListenerRegistry,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        default_shutdown_timeout: Duration,
        /// Actions produced by effects, for observers
        action_broadcast: broadcast::Sender<A>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: ActionType + Inspect + Clone + Send + Sync + 'static,
        S: Inspect + Clone + Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a store with the default middleware chain
        ///
        /// # Arguments
        ///
        /// - `initial_state`: The starting state for the store
        /// - `reducer`: The root reducer
        /// - `environment`: Injected dependencies
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_config(initial_state, reducer, environment, StoreConfig::default())
        }

        /// Create a store with custom configuration
        ///
        /// The middleware chain is the default chain built from
        /// `config.middleware`.
        #[must_use]
        pub fn with_config(
            initial_state: S,
            reducer: R,
            environment: E,
            config: StoreConfig,
        ) -> Self {
            let middleware = default_middleware(config.middleware.clone());
            Self::build(initial_state, reducer, environment, middleware, &config)
        }

        /// Create a store with an explicit middleware chain
        ///
        /// Use [`default_middleware`] as a starting point to keep the defaults:
        ///
        /// ```ignore
        /// let chain = default_middleware(DefaultMiddlewareOptions::default()).push(AuditTrail::new());
        /// let store = Store::with_middleware(state, reducer, env, chain);
        /// ```
        #[must_use]
        pub fn with_middleware(
            initial_state: S,
            reducer: R,
            environment: E,
            middleware: MiddlewareChain<S, A>,
        ) -> Self {
            Self::build(
                initial_state,
                reducer,
                environment,
                middleware,
                &StoreConfig::default(),
            )
        }

        fn build(
            initial_state: S,
            reducer: R,
            environment: E,
            middleware: MiddlewareChain<S, A>,
            config: &StoreConfig,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(config.broadcast_capacity.max(1));
            tracing::debug!(middleware = ?middleware, "Store created");

            Self {
                state: Arc::new(RwLock::new(Arc::new(initial_state))),
                dispatch_lock: Arc::new(Mutex::new(())),
                reducer: Arc::new(reducer),
                environment: Arc::new(environment),
                middleware: Arc::new(middleware),
                listeners: ListenerRegistry::default(),
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                default_shutdown_timeout: config.default_shutdown_timeout,
                action_broadcast,
            }
        }

        /// Current state snapshot
        ///
        /// Snapshots are immutable. Two calls with no dispatch in between
        /// return the same allocation (`Arc::ptr_eq`).
        #[must_use]
        pub fn get_state(&self) -> Arc<S> {
            Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let logged_in = store.state(|s| s.auth.token.is_some());
        /// ```
        pub fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            f(&self.get_state())
        }

        /// Register a change listener
        ///
        /// The listener runs after every dispatch, once the new state has been
        /// published, in registration order. It runs on the dispatching task
        /// and must not block.
        pub fn subscribe<F>(&self, listener: F) -> Subscription
        where
            F: Fn() + Send + Sync + 'static,
        {
            self.listeners.subscribe(Arc::new(listener))
        }

        /// Number of attached listeners
        #[must_use]
        pub fn listener_count(&self) -> usize {
            self.listeners.len()
        }

        /// Subscribe to every action produced by effects
        ///
        /// Actions dispatched directly by callers are not broadcast.
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Every action produced by effects, as a stream
        ///
        /// A consumer that falls more than the broadcast capacity behind
        /// skips the missed actions. The stream ends when every store handle
        /// is gone.
        ///
        /// ```ignore
        /// use futures::StreamExt;
        ///
        /// let mut actions = store.action_stream();
        /// while let Some(action) = actions.next().await {
        ///     tracing::info!(%action, "effect produced action");
        /// }
        /// ```
        pub fn action_stream(&self) -> impl Stream<Item = A> + Send + use<S, A, E, R> {
            futures::stream::unfold(self.subscribe_actions(), |mut rx| async move {
                loop {
                    match rx.recv().await {
                        Ok(action) => return Some((action, rx)),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Action stream lagged");
                        },
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            })
        }

        /// Dispatch an action
        ///
        /// Waits for any dispatch in progress, then runs the full dispatch
        /// cycle for `action` before returning. Effects are started but not
        /// awaited; use the returned [`EffectHandle`] for that.
        ///
        /// # Errors
        ///
        /// - [`StoreError::ShutdownInProgress`] if the store is shutting down
        /// - Any error a middleware returns. Errors from `before_reduce`
        ///   leave the state untouched; errors from `after_reduce` are
        ///   reported after the new state was published and listeners ran.
        ///
        /// # Panics
        ///
        /// A panic in the reducer or a listener propagates to the caller.
        /// If a listener panics, the new state has already been published.
        #[tracing::instrument(skip(self, action), fields(action_type = %action.action_type()), name = "store_dispatch")]
        pub async fn dispatch(&self, action: A) -> Result<EffectHandle, StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                metrics::counter!(names::DISPATCH_REJECTED, "reason" => "shutdown").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            let _serial = self.dispatch_lock.lock().await;
            tracing::debug!("Processing action");
            metrics::counter!(names::DISPATCH_TOTAL).increment(1);

            let current = self.get_state();
            if let Err(error) = self.middleware.before_reduce(&action, &current) {
                tracing::warn!(%error, "Action rejected by middleware");
                metrics::counter!(names::DISPATCH_REJECTED, "reason" => "middleware").increment(1);
                return Err(error);
            }

            let (next, effects) = self.run_reducer(current, action.clone());
            self.publish(Arc::clone(&next));

            let checked = self.middleware.after_reduce(&action, &next);
            drop(next);

            self.notify_listeners();

            let (handle, tracking) = EffectHandle::new();
            let effects: Vec<_> = effects.into_iter().filter(|e| !e.is_none()).collect();
            if !effects.is_empty() {
                tracing::trace!("Executing {} effects", effects.len());
            }
            for effect in effects {
                self.execute_effect(effect, tracking.clone());
            }

            tracing::debug!("Action processing completed");
            checked.map(|()| handle)
        }

        /// Alias of [`dispatch`](Self::dispatch)
        ///
        /// # Errors
        ///
        /// See [`dispatch`](Self::dispatch).
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
            self.dispatch(action).await
        }

        fn run_reducer(
            &self,
            mut state: Arc<S>,
            action: A,
        ) -> (Arc<S>, slicestore_core::SmallVec<[Effect<A>; 4]>) {
            let span = tracing::debug_span!("reducer_execution");
            let _enter = span.enter();

            let start = std::time::Instant::now();
            let effects = self
                .reducer
                .reduce(Arc::make_mut(&mut state), action, &self.environment);
            metrics::histogram!(names::REDUCER_DURATION).record(start.elapsed().as_secs_f64());

            tracing::trace!("Reducer completed, returned {} effects", effects.len());
            (state, effects)
        }

        fn publish(&self, next: Arc<S>) {
            *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
        }

        fn notify_listeners(&self) {
            let listeners = self.listeners.snapshot();
            if listeners.is_empty() {
                return;
            }
            tracing::trace!(count = listeners.len(), "Notifying listeners");
            for listener in &listeners {
                listener();
            }
            metrics::counter!(names::LISTENERS_NOTIFIED).increment(listeners.len() as u64);
        }

        /// Graceful shutdown with the configured default timeout
        ///
        /// # Errors
        ///
        /// See [`shutdown`](Self::shutdown).
        pub async fn shutdown_default(&self) -> Result<(), StoreError> {
            self.shutdown(self.default_shutdown_timeout).await
        }

        /// Initiate graceful shutdown of the store
        ///
        /// 1. Sets the shutdown flag (rejecting new actions)
        /// 2. Waits for pending effects to complete (with timeout)
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires
        /// before all pending effects complete.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            self.shutdown.store(true, Ordering::Release);

            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(10);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);
                if pending == 0 {
                    tracing::info!("All effects completed, shutdown successful");
                    return Ok(());
                }
                if start.elapsed() >= timeout {
                    tracing::error!(pending_effects = pending, "Shutdown timeout: {pending} effects still running");
                    return Err(StoreError::ShutdownTimeout(pending));
                }
                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Whether shutdown has been initiated
        #[must_use]
        pub fn is_shutting_down(&self) -> bool {
            self.shutdown.load(Ordering::Acquire)
        }

        /// Perform a health check on the Store
        #[must_use]
        pub fn health(&self) -> HealthCheck {
            let check = if self.is_shutting_down() {
                HealthCheck::unhealthy("store", "Store is shutting down")
            } else {
                HealthCheck::healthy("store")
            };

            check
                .with_metadata("listeners", self.listener_count().to_string())
                .with_metadata(
                    "pending_effects",
                    self.pending_effects.load(Ordering::Acquire).to_string(),
                )
                .with_metadata("middleware", self.middleware.names().join(","))
        }

        fn track_pending(&self) -> AtomicCounterGuard {
            self.pending_effects.fetch_add(1, Ordering::SeqCst);
            AtomicCounterGuard(Arc::clone(&self.pending_effects))
        }

        /// Dispatch an action yielded by an effect
        async fn feed_back(&self, action: A) {
            let _ = self.action_broadcast.send(action.clone());
            if let Err(error) = self.dispatch(action).await {
                tracing::warn!(%error, "Action produced by effect was not applied");
            }
        }

        /// Execute an effect with tracking
        ///
        /// - `None`: No-op
        /// - `Future`: Runs the computation, dispatches the resulting action if `Some`
        /// - `Delay`: Waits for the duration, then dispatches the action
        /// - `Parallel`: Starts every child concurrently
        /// - `Sequential`: Runs children in order, each finishing before the next starts
        ///
        /// [`DecrementGuard`] keeps the counters right even if an effect panics.
        #[allow(clippy::needless_pass_by_value)] // tracking is cloned into spawned tasks
        fn execute_effect(&self, effect: Effect<A>, tracking: EffectTracking) {
            match effect {
                Effect::None => {
                    metrics::counter!(names::EFFECTS_EXECUTED, "type" => "none").increment(1);
                },
                Effect::Future(fut) => {
                    tracing::trace!("Executing Effect::Future");
                    metrics::counter!(names::EFFECTS_EXECUTED, "type" => "future").increment(1);
                    tracking.increment();
                    let pending = self.track_pending();
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guard = DecrementGuard(tracking);
                        let _pending = pending;
                        if let Some(action) = fut.await {
                            store.feed_back(action).await;
                        }
                    });
                },
                Effect::Delay { duration, action } => {
                    tracing::trace!("Executing Effect::Delay (duration: {:?})", duration);
                    metrics::counter!(names::EFFECTS_EXECUTED, "type" => "delay").increment(1);
                    tracking.increment();
                    let pending = self.track_pending();
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guard = DecrementGuard(tracking);
                        let _pending = pending;
                        tokio::time::sleep(duration).await;
                        store.feed_back(*action).await;
                    });
                },
                Effect::Parallel(effects) => {
                    tracing::trace!("Executing Effect::Parallel with {} effects", effects.len());
                    metrics::counter!(names::EFFECTS_EXECUTED, "type" => "parallel").increment(1);
                    for effect in effects {
                        self.execute_effect(effect, tracking.clone());
                    }
                },
                Effect::Sequential(effects) => {
                    tracing::trace!("Executing Effect::Sequential with {} effects", effects.len());
                    metrics::counter!(names::EFFECTS_EXECUTED, "type" => "sequential").increment(1);
                    tracking.increment();
                    let pending = self.track_pending();
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guard = DecrementGuard(tracking);
                        let _pending = pending;

                        for effect in effects {
                            let (sub_tx, mut sub_rx) = watch::channel(());
                            let step = EffectTracking {
                                counter: Arc::new(AtomicUsize::new(0)),
                                notifier: Arc::new(sub_tx),
                            };
                            store.execute_effect(effect, step.clone());

                            while step.counter.load(Ordering::SeqCst) > 0 {
                                if sub_rx.changed().await.is_err() {
                                    break;
                                }
                            }
                        }
                        tracing::trace!("Effect::Sequential completed");
                    });
                },
            }
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                dispatch_lock: Arc::clone(&self.dispatch_lock),
                reducer: Arc::clone(&self.reducer),
                environment: Arc::clone(&self.environment),
                middleware: Arc::clone(&self.middleware),
                listeners: self.listeners.clone(),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                default_shutdown_timeout: self.default_shutdown_timeout,
                action_broadcast: self.action_broadcast.clone(),
            }
        }
    }

    impl<S, A, E, R> std::fmt::Debug for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("Store")
                .field("middleware", &self.middleware)
                .field("listeners", &self.listeners.len())
                .field("shutdown", &self.shutdown.load(Ordering::Acquire))
                .finish_non_exhaustive()
        }
    }
}

// Re-export for convenience
pub use store::Store;

#[cfg(test)]
mod tests {
    use super::*;
    use slicestore_core::{smallvec, Action, Inspect, SmallVec, Value};
    use std::sync::Mutex;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct TestState {
        value: i64,
        note: Value,
    }

    impl Inspect for TestState {
        fn inspect(&self) -> Value {
            Value::object([("value", self.value.inspect()), ("note", self.note.clone())])
        }
    }

    #[derive(Debug, Clone)]
    struct TestReducer;

    impl Reducer for TestReducer {
        type State = TestState;
        type Action = Action;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action.action_type.as_str() {
                "counter/increment" => {
                    state.value += 1;
                    smallvec![Effect::None]
                },
                "counter/decrement" => {
                    state.value -= 1;
                    smallvec![Effect::None]
                },
                "counter/note" => {
                    state.note = action.payload;
                    smallvec![Effect::None]
                },
                "counter/incrementLater" => smallvec![Effect::Future(Box::pin(async {
                    Some(Action::new("counter/increment"))
                }))],
                "counter/incrementAfterDelay" => smallvec![Effect::Delay {
                    duration: Duration::from_millis(10),
                    action: Box::new(Action::new("counter/increment")),
                }],
                "counter/incrementThrice" => smallvec![Effect::Parallel(vec![
                    Effect::Future(Box::pin(async { Some(Action::new("counter/increment")) })),
                    Effect::Future(Box::pin(async { Some(Action::new("counter/increment")) })),
                    Effect::Future(Box::pin(async { Some(Action::new("counter/increment")) })),
                ])],
                "counter/upUpDown" => smallvec![Effect::Sequential(vec![
                    Effect::Future(Box::pin(async { Some(Action::new("counter/increment")) })),
                    Effect::Future(Box::pin(async { Some(Action::new("counter/increment")) })),
                    Effect::Future(Box::pin(async { Some(Action::new("counter/decrement")) })),
                ])],
                _ => smallvec![Effect::None],
            }
        }
    }

    fn store() -> Store<TestState, Action, (), TestReducer> {
        Store::new(TestState::default(), TestReducer, ())
    }

    #[tokio::test]
    async fn test_store_creation() {
        let store = store();
        assert_eq!(store.state(|s| s.value), 0);
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_updates_state() {
        let store = store();
        let _ = store.dispatch(Action::new("counter/increment")).await;
        let _ = store.dispatch(Action::new("counter/increment")).await;
        let _ = store.dispatch(Action::new("counter/decrement")).await;
        assert_eq!(store.state(|s| s.value), 1);
    }

    #[tokio::test]
    async fn test_unknown_action_leaves_state_alone() {
        let store = store();
        let before = store.get_state();
        let _ = store.dispatch(Action::new("somebody/else")).await;
        assert_eq!(*store.get_state(), *before);
    }

    #[tokio::test]
    async fn test_get_state_is_stable_between_dispatches() {
        let store = store();
        let first = store.get_state();
        let second = store.get_state();
        assert!(Arc::ptr_eq(&first, &second));

        let _ = store.dispatch(Action::new("counter/increment")).await;
        let third = store.get_state();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(first.value, 0, "old snapshots are never mutated");
        assert_eq!(third.value, 1);
    }

    #[tokio::test]
    async fn test_listener_sees_updated_state() {
        let store = store();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let observer = store.clone();
        let log = Arc::clone(&seen);
        let _subscription = store.subscribe(move || {
            if let Ok(mut log) = log.lock() {
                log.push(observer.state(|s| s.value));
            }
        });

        let _ = store.dispatch(Action::new("counter/increment")).await;
        let _ = store.dispatch(Action::new("counter/increment")).await;

        let seen = seen.lock().map(|s| s.clone()).unwrap_or_default();
        assert_eq!(seen, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_unsubscribed_listener_is_not_called() {
        let store = store();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let subscription = store.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let _ = store.dispatch(Action::new("counter/increment")).await;
        assert!(subscription.unsubscribe());
        let _ = store.dispatch(Action::new("counter/increment")).await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_effect_future_feeds_back() {
        let store = store();
        let mut handle = store
            .dispatch(Action::new("counter/incrementLater"))
            .await
            .unwrap_or_else(|_| EffectHandle::completed());
        assert!(handle.wait_with_timeout(Duration::from_secs(1)).await.is_ok());
        assert_eq!(store.state(|s| s.value), 1);
    }

    #[tokio::test]
    async fn test_effect_delay() {
        let store = store();
        let _ = store.dispatch(Action::new("counter/incrementAfterDelay")).await;
        assert_eq!(store.state(|s| s.value), 0);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.state(|s| s.value), 1);
    }

    #[tokio::test]
    async fn test_effect_parallel() {
        let store = store();
        let mut handle = store
            .dispatch(Action::new("counter/incrementThrice"))
            .await
            .unwrap_or_else(|_| EffectHandle::completed());
        assert!(handle.wait_with_timeout(Duration::from_secs(1)).await.is_ok());
        assert_eq!(store.state(|s| s.value), 3);
    }

    #[tokio::test]
    async fn test_effect_sequential() {
        let store = store();
        let mut handle = store
            .dispatch(Action::new("counter/upUpDown"))
            .await
            .unwrap_or_else(|_| EffectHandle::completed());
        assert!(handle.wait_with_timeout(Duration::from_secs(1)).await.is_ok());
        assert_eq!(store.state(|s| s.value), 1);
    }

    #[tokio::test]
    async fn test_subscribe_actions_sees_effect_output() {
        let store = store();
        let mut rx = store.subscribe_actions();
        let _ = store.dispatch(Action::new("counter/incrementLater")).await;

        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(matches!(received, Ok(Ok(ref a)) if a.is("counter/increment")));
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_actions() {
        let store = store();
        assert!(store.health().status.is_healthy());
        assert!(store.shutdown(Duration::from_secs(1)).await.is_ok());

        let result = store.dispatch(Action::new("counter/increment")).await;
        assert!(matches!(result, Err(StoreError::ShutdownInProgress)));
        let health = store.health();
        assert!(health.status.is_unhealthy());
        assert_eq!(health.status.to_string(), "unhealthy");
        assert_eq!(health.message.as_deref(), Some("Store is shutting down"));
        assert_eq!(store.state(|s| s.value), 0);
    }

    #[tokio::test]
    async fn test_non_serializable_payload_is_reported() {
        let log = ViolationLog::new();
        let config = StoreConfig::default()
            .with_serializable_check(SerializableCheckOptions::default().with_log(log.clone()));
        let store = Store::with_config(TestState::default(), TestReducer, (), config);

        let _ = store
            .dispatch(Action::new("counter/note").with_payload(Value::opaque(42_u8)))
            .await;

        let origins: Vec<_> = log.snapshot().into_iter().map(|v| (v.origin, v.key_path)).collect();
        assert_eq!(
            origins,
            vec![
                (ViolationOrigin::Action, "payload".to_owned()),
                (ViolationOrigin::State, "note".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn test_rejecting_middleware_leaves_state_and_listeners_alone() {
        let config = StoreConfig::default().with_serializable_check(
            SerializableCheckOptions::default().with_policy(ViolationPolicy::Reject),
        );
        let store = Store::with_config(TestState::default(), TestReducer, (), config);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let _subscription = store.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let result = store
            .dispatch(Action::new("counter/note").with_payload(Value::opaque(42_u8)))
            .await;

        assert!(matches!(result, Err(StoreError::NonSerializable { .. })));
        assert_eq!(store.state(|s| s.note.clone()), Value::Null);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_dispatches_serialize() {
        let store = store();
        let handles: Vec<_> = (0..20)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    let _ = store.dispatch(Action::new("counter/increment")).await;
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.is_ok());
        }
        assert_eq!(store.state(|s| s.value), 20);
    }

    #[test]
    fn test_completed_handle_has_nothing_pending() {
        let mut handle = EffectHandle::completed();
        assert_eq!(handle.pending(), 0);
        tokio_test::block_on(handle.wait());
    }
}
