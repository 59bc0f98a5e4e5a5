//! Change listeners
//!
//! Listeners are plain callbacks invoked after every dispatch, once the new
//! state has been published. They take no arguments; a listener that needs
//! the state reads it from the store handle it captured.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// A registered change listener
pub type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// The set of listeners attached to one store
#[derive(Clone, Default)]
pub(crate) struct ListenerRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl ListenerRegistry {
    pub(crate) fn subscribe(&self, listener: Listener) -> Subscription {
        let mut registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.entries.push((id, listener));
        tracing::trace!(listener_id = id, "Listener subscribed");

        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Listeners in registration order, as of now
    ///
    /// Notification iterates this copy, so (un)subscribing from inside a
    /// listener only takes effect from the next dispatch.
    pub(crate) fn snapshot(&self) -> Vec<Listener> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }
}

/// Handle returned by `Store::subscribe`
///
/// Dropping the handle does NOT unsubscribe; call
/// [`unsubscribe`](Self::unsubscribe). The handle does not keep the store
/// alive.
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Detach the listener
    ///
    /// Returns `true` if this call removed it, `false` if it was already
    /// removed or the store is gone. Calling it more than once is harmless.
    pub fn unsubscribe(&self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
        let before = registry.entries.len();
        registry.entries.retain(|(id, _)| *id != self.id);
        let removed = registry.entries.len() != before;
        if removed {
            tracing::trace!(listener_id = self.id, "Listener unsubscribed");
        }
        removed
    }

    /// Whether the listener is still attached
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registry.upgrade().is_some_and(|registry| {
            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entries
                .iter()
                .any(|(id, _)| *id == self.id)
        })
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
