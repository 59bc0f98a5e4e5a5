//! Metric names recorded by the store.
//!
//! The store records through the [`metrics`] facade; whichever recorder the
//! application installs receives them. Without a recorder the calls are
//! no-ops.
//!
//! Call [`describe_metrics`] once after installing a recorder to attach
//! descriptions and units.

use metrics::{describe_counter, describe_histogram, Unit};

/// Actions accepted by `dispatch`
pub const DISPATCH_TOTAL: &str = "store.dispatch.total";

/// Actions refused (shutdown or middleware)
pub const DISPATCH_REJECTED: &str = "store.dispatch.rejected";

/// Reducer execution time
pub const REDUCER_DURATION: &str = "store.reducer.duration_seconds";

/// Listener invocations
pub const LISTENERS_NOTIFIED: &str = "store.listeners.notified";

/// Effects started, labelled by `type`
pub const EFFECTS_EXECUTED: &str = "store.effects.executed";

/// Serializability violations, labelled by `origin`
pub const SERIALIZABLE_VIOLATIONS: &str = "store.serializable.violations";

/// Register descriptions for every store metric.
pub fn describe_metrics() {
    describe_counter!(DISPATCH_TOTAL, Unit::Count, "Actions accepted by the store");
    describe_counter!(
        DISPATCH_REJECTED,
        Unit::Count,
        "Actions refused because the store was shutting down or a middleware rejected them"
    );
    describe_histogram!(REDUCER_DURATION, Unit::Seconds, "Root reducer execution time");
    describe_counter!(LISTENERS_NOTIFIED, Unit::Count, "Subscriber invocations");
    describe_counter!(EFFECTS_EXECUTED, Unit::Count, "Effects started, by effect type");
    describe_counter!(
        SERIALIZABLE_VIOLATIONS,
        Unit::Count,
        "Non-serializable values detected in actions or state"
    );
}
