//! Subscriber types for the reactive system.
//!
//! A Subscriber is any re-runnable unit that records dependencies while it
//! runs. Effects and the internal runner of a computed cell are subscribers.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::graph::Dep;

/// Unique identifier for a subscriber.
///
/// IDs are assigned in creation order. They exist for deduplication and
/// debugging; notification order does not follow them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A type-erased subscriber, as stored in dependency sets and on the
/// active-subscriber stack.
pub trait Subscriber {
    /// Get the subscriber's unique ID.
    fn subscriber_id(&self) -> SubscriberId;

    /// React to a change in one of the subscriber's dependencies.
    ///
    /// Subscribers with a scheduler hand the notification to it; the rest
    /// re-run directly.
    fn notify(self: Rc<Self>);

    /// Remember that this subscriber joined `dep`.
    fn record_dep(&self, dep: &Rc<Dep>);

    /// Forget a dependency set this subscriber joined.
    fn forget_dep(&self, dep: &Dep);

    /// Number of dependency sets this subscriber belongs to.
    fn dependency_count(&self) -> usize;
}
