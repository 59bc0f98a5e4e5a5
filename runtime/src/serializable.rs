//! Serializability check middleware
//!
//! Development-time validation that dispatched actions and the resulting
//! state are plain, serializable data. Actions are checked before the reducer
//! runs, state after it.
//!
//! Some actions legitimately carry non-serializable values. The persistence
//! layer's [`PERSIST`](slicestore_core::PERSIST) action, for instance, passes
//! callbacks. Such action types are listed in
//! [`SerializableCheckOptions::ignored_actions`] and skipped entirely; the
//! state they produce is still checked.
//!
//! # Example
//!
//! ```
//! use slicestore_core::PERSIST;
//! use slicestore_runtime::serializable::SerializableCheckOptions;
//!
//! let options = SerializableCheckOptions::default().with_ignored_actions([PERSIST]);
//! assert!(options.ignores_action(PERSIST));
//! assert!(!options.ignores_action("auth/login"));
//! ```

use crate::error::StoreError;
use crate::middleware::Middleware;
use slicestore_core::{find_non_serializable, ActionType, Inspect, NonSerializable};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Name the check reports in logs and errors
pub const MIDDLEWARE_NAME: &str = "SerializableStateInvariantMiddleware";

/// Action paths ignored by default (thunk arguments and request metadata)
pub const DEFAULT_IGNORED_ACTION_PATHS: [&str; 2] = ["meta.arg", "meta.baseQueryMeta"];

/// Default time budget for a single check before a warning is logged
pub const DEFAULT_WARN_AFTER: Duration = Duration::from_millis(32);

/// Violations a [`ViolationLog`] keeps by default before evicting the oldest
pub const DEFAULT_LOG_CAPACITY: usize = 256;

/// What to do when a violation is found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViolationPolicy {
    /// Log at error level and record in the [`ViolationLog`]
    #[default]
    Warn,
    /// As `Warn`, and additionally fail the dispatch for action violations
    Reject,
}

/// Where a violation was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationOrigin {
    /// In the dispatched action
    Action,
    /// In the state produced by the reducer
    State,
}

impl ViolationOrigin {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::State => "state",
        }
    }
}

impl fmt::Display for ViolationOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-serializable value detected by the check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Action or state
    pub origin: ViolationOrigin,
    /// Type of the action being dispatched
    pub action_type: String,
    /// Dot-joined path to the offending value
    pub key_path: String,
    /// Label of the offending value
    pub type_name: String,
}

impl Violation {
    fn new(origin: ViolationOrigin, action_type: &str, found: NonSerializable) -> Self {
        Self {
            origin,
            action_type: action_type.to_owned(),
            key_path: found.key_path,
            type_name: found.type_name,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "non-serializable {} in the {} at `{}` while handling `{}`",
            self.type_name, self.origin, self.key_path, self.action_type
        )
    }
}

/// Shared record of the most recent violations the check has found
///
/// Holds at most `capacity` entries; once full, each new violation evicts
/// the oldest one. Clones share the same log.
#[derive(Debug, Clone)]
pub struct ViolationLog {
    inner: Arc<Mutex<LogEntries>>,
}

#[derive(Debug)]
struct LogEntries {
    capacity: usize,
    entries: VecDeque<Violation>,
    evicted: u64,
}

impl Default for ViolationLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl ViolationLog {
    /// Create an empty log holding up to [`DEFAULT_LOG_CAPACITY`] violations
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty log holding up to `capacity` violations (at least one)
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(LogEntries {
                capacity,
                entries: VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY)),
                evicted: 0,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogEntries> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, violation: Violation) {
        let mut log = self.lock();
        if log.entries.len() == log.capacity {
            log.entries.pop_front();
            log.evicted += 1;
        }
        log.entries.push_back(violation);
    }

    /// Copy of the retained violations, oldest first
    #[must_use]
    pub fn snapshot(&self) -> Vec<Violation> {
        self.lock().entries.iter().cloned().collect()
    }

    /// Number of retained violations
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether nothing is retained
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most violations the log retains
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Violations dropped to make room since the last [`clear`](Self::clear)
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.lock().evicted
    }

    /// Drop every recorded violation
    pub fn clear(&self) {
        let mut log = self.lock();
        log.entries.clear();
        log.evicted = 0;
    }
}

/// Configuration for [`SerializableCheck`]
#[derive(Debug, Clone)]
pub struct SerializableCheckOptions {
    /// Action types skipped entirely by the action check
    pub ignored_actions: Vec<String>,
    /// Action paths skipped by the action check
    pub ignored_action_paths: Vec<String>,
    /// State paths skipped by the state check
    pub ignored_paths: Vec<String>,
    /// Skip the action check
    pub ignore_actions: bool,
    /// Skip the state check
    pub ignore_state: bool,
    /// Log a warning when one check takes longer than this
    pub warn_after: Duration,
    /// What a violation does
    pub policy: ViolationPolicy,
    /// Where violations are recorded
    pub log: ViolationLog,
}

impl SerializableCheckOptions {
    /// Skip these action types entirely (in addition to any already listed)
    #[must_use]
    pub fn with_ignored_actions<I, T>(mut self, action_types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.ignored_actions
            .extend(action_types.into_iter().map(Into::into));
        self
    }

    /// Replace the ignored action paths
    #[must_use]
    pub fn with_ignored_action_paths<I, T>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.ignored_action_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Skip these state paths
    #[must_use]
    pub fn with_ignored_paths<I, T>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.ignored_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Skip the action check
    #[must_use]
    pub const fn ignoring_actions(mut self) -> Self {
        self.ignore_actions = true;
        self
    }

    /// Skip the state check
    #[must_use]
    pub const fn ignoring_state(mut self) -> Self {
        self.ignore_state = true;
        self
    }

    /// Set the time budget for a single check
    #[must_use]
    pub const fn with_warn_after(mut self, warn_after: Duration) -> Self {
        self.warn_after = warn_after;
        self
    }

    /// Set the violation policy
    #[must_use]
    pub const fn with_policy(mut self, policy: ViolationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Record violations in `log`
    #[must_use]
    pub fn with_log(mut self, log: ViolationLog) -> Self {
        self.log = log;
        self
    }

    /// Whether actions of this type skip the action check
    #[must_use]
    pub fn ignores_action(&self, action_type: &str) -> bool {
        self.ignore_actions || self.ignored_actions.iter().any(|t| t == action_type)
    }
}

impl Default for SerializableCheckOptions {
    fn default() -> Self {
        Self {
            ignored_actions: Vec::new(),
            ignored_action_paths: DEFAULT_IGNORED_ACTION_PATHS
                .iter()
                .map(|p| (*p).to_owned())
                .collect(),
            ignored_paths: Vec::new(),
            ignore_actions: false,
            ignore_state: false,
            warn_after: DEFAULT_WARN_AFTER,
            policy: ViolationPolicy::default(),
            log: ViolationLog::default(),
        }
    }
}

/// The serializability check middleware
#[derive(Debug, Clone)]
pub struct SerializableCheck {
    options: SerializableCheckOptions,
}

impl SerializableCheck {
    /// Create the middleware
    #[must_use]
    pub const fn new(options: SerializableCheckOptions) -> Self {
        Self { options }
    }

    /// The log this middleware records into
    #[must_use]
    pub fn log(&self) -> ViolationLog {
        self.options.log.clone()
    }

    /// The configuration in use
    #[must_use]
    pub const fn options(&self) -> &SerializableCheckOptions {
        &self.options
    }

    fn timed<T>(&self, phase: ViolationOrigin, check: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = check();
        let elapsed = start.elapsed();
        if elapsed > self.options.warn_after {
            tracing::warn!(
                middleware = MIDDLEWARE_NAME,
                phase = phase.as_str(),
                elapsed_ms = elapsed.as_millis(),
                threshold_ms = self.options.warn_after.as_millis(),
                "{MIDDLEWARE_NAME} took {}ms, which is more than the warning threshold of {}ms",
                elapsed.as_millis(),
                self.options.warn_after.as_millis(),
            );
        }
        result
    }

    fn report(&self, violation: &Violation) {
        metrics::counter!(crate::metrics::SERIALIZABLE_VIOLATIONS, "origin" => violation.origin.as_str())
            .increment(1);
        match violation.origin {
            ViolationOrigin::Action => tracing::error!(
                action_type = %violation.action_type,
                key_path = %violation.key_path,
                value_type = %violation.type_name,
                "A non-serializable value was detected in an action, in the path: `{}`",
                violation.key_path,
            ),
            ViolationOrigin::State => tracing::error!(
                action_type = %violation.action_type,
                key_path = %violation.key_path,
                value_type = %violation.type_name,
                "A non-serializable value was detected in the state, in the path: `{}`; check the reducers handling `{}`",
                violation.key_path,
                violation.action_type,
            ),
        }
        self.options.log.push(violation.clone());
    }
}

impl<S, A> Middleware<S, A> for SerializableCheck
where
    S: Inspect,
    A: ActionType + Inspect,
{
    fn name(&self) -> &str {
        MIDDLEWARE_NAME
    }

    fn before_reduce(&self, action: &A, _state: &S) -> Result<(), StoreError> {
        let action_type = action.action_type();
        if self.options.ignores_action(action_type) {
            tracing::trace!(action_type, "serializability check skipped for action");
            return Ok(());
        }

        let found = self.timed(ViolationOrigin::Action, || {
            find_non_serializable(&action.inspect(), &self.options.ignored_action_paths)
        });

        let Some(found) = found else {
            return Ok(());
        };
        let violation = Violation::new(ViolationOrigin::Action, action_type, found);
        self.report(&violation);

        match self.options.policy {
            ViolationPolicy::Warn => Ok(()),
            ViolationPolicy::Reject => Err(StoreError::NonSerializable {
                action_type: violation.action_type,
                key_path: violation.key_path,
                type_name: violation.type_name,
            }),
        }
    }

    fn after_reduce(&self, action: &A, state: &S) -> Result<(), StoreError> {
        if self.options.ignore_state {
            return Ok(());
        }

        let found = self.timed(ViolationOrigin::State, || {
            find_non_serializable(&state.inspect(), &self.options.ignored_paths)
        });

        if let Some(found) = found {
            self.report(&Violation::new(ViolationOrigin::State, action.action_type(), found));
        }
        Ok(())
    }
}
