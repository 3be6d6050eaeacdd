//! Publish/subscribe registries for orchestrator events.
//!
//! Each event kind gets its own [`EventRegistry`], so handlers for one kind
//! can never observe or remove handlers of another. Subscribing returns a
//! [`Subscription`] capability that removes exactly the handler it created.
//!
//! Handlers run synchronously on the emitting task, in registration order.
//! A panicking handler is caught and logged; remaining handlers still see
//! the event and the emitter carries on.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::error;

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Slots<T> {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(u64, Handler<T>)>>,
}

/// Ordered list of handlers for one event kind.
pub struct EventRegistry<T> {
    name: &'static str,
    slots: Arc<Slots<T>>,
}

impl<T: 'static> EventRegistry<T> {
    /// Create an empty registry. `name` appears in panic logs.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: Arc::new(Slots {
                next_id: AtomicU64::new(1),
                handlers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register a handler.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.slots.next_id.fetch_add(1, Ordering::Relaxed);
        self.slots.handlers.lock().push((id, Arc::new(handler)));

        let weak: Weak<Slots<T>> = Arc::downgrade(&self.slots);
        Subscription {
            event: self.name,
            remove: Some(Box::new(move || {
                weak.upgrade()
                    .map(|slots| {
                        let mut handlers = slots.handlers.lock();
                        let before = handlers.len();
                        handlers.retain(|(hid, _)| *hid != id);
                        handlers.len() != before
                    })
                    .unwrap_or(false)
            })),
        }
    }

    /// Deliver `event` to every handler.
    ///
    /// The handler list is snapshotted first, so handlers may subscribe or
    /// unsubscribe from inside a callback without deadlocking. Returns the
    /// number of handlers that panicked.
    pub fn emit(&self, event: &T) -> usize {
        let snapshot: Vec<Handler<T>> = self
            .slots
            .handlers
            .lock()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();

        let mut faulted = 0;
        for handler in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                faulted += 1;
                error!(event = self.name, "Event handler panicked");
            }
        }
        faulted
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.slots.handlers.lock().len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> fmt::Debug for EventRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("name", &self.name)
            .field("handlers", &self.slots.handlers.lock().len())
            .finish()
    }
}

/// Handle returned by a subscribe call.
///
/// Dropping the handle keeps the handler registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    event: &'static str,
    remove: Option<Box<dyn FnOnce() -> bool + Send + Sync>>,
}

impl Subscription {
    /// Remove the handler. Returns `false` if it was already gone.
    pub fn unsubscribe(mut self) -> bool {
        self.remove.take().map(|remove| remove()).unwrap_or(false)
    }

    /// Event kind this subscription belongs to.
    pub fn event(&self) -> &'static str {
        self.event
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .finish()
    }
}
