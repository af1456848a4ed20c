//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects reactive objects,
//! computed cells, and effects. It owns the dependency registry and turns
//! reads into dependency records and writes into notifications.
//!
//! # How It Works
//!
//! 1. When a reactive key is read while a subscriber is running, the runtime
//!    records the subscriber in the dependency set for `(target, key)`.
//!
//! 2. When a reactive key is written, the runtime:
//!    a. Collects the subscribers of the written key
//!    b. For shape changes (`Add`/`Delete`), also collects the subscribers of
//!       the target's shape key (`Length` for arrays, `Iterate` otherwise)
//!    c. Deduplicates them
//!    d. Hands each one the notification: subscribers with a scheduler run the
//!       scheduler, the rest re-run immediately
//!
//! # Thread Safety
//!
//! The registry is thread-local. Every thread gets its own independent
//! reactive world; reactive values must not be shared across threads.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId};
use crate::graph::{Key, TargetEntry, TargetId, TargetMap, Trackable};

thread_local! {
    static REGISTRY: RefCell<TargetMap> = RefCell::new(TargetMap::new());
}

/// How a key was read.
///
/// All kinds record the same dependency; the kind is carried for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOp {
    /// A plain property read.
    Get,

    /// A key-existence check.
    Has,

    /// An enumeration of the target's keys.
    Iterate,
}

/// How a key was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOp {
    /// An existing key received a different value.
    Set,

    /// A key that did not exist before was created.
    Add,

    /// A key was removed.
    Delete,
}

impl TriggerOp {
    /// Whether this write changes the set of keys on the target.
    pub fn changes_shape(&self) -> bool {
        matches!(self, TriggerOp::Add | TriggerOp::Delete)
    }
}

/// The global reactive runtime.
///
/// This is a stateless facade over the thread-local registry and the
/// active-subscriber stack.
pub struct Runtime;

impl Runtime {
    /// Record that the current subscriber read `key` on `target`.
    ///
    /// Does nothing outside a reactive context. Recording the same
    /// `(target, key, subscriber)` twice is a no-op.
    pub fn track(target: &dyn Trackable, op: TrackOp, key: &Key) {
        let Some(active) = ReactiveContext::current() else {
            return;
        };

        let dep = REGISTRY.with(|registry| registry.borrow_mut().dep_for(target, key));

        if dep.insert(&active) {
            active.record_dep(&dep);
            trace!(
                target = target.target_id().raw(),
                %key,
                ?op,
                subscriber = active.subscriber_id().raw(),
                "tracked dependency"
            );
        }
    }

    /// Notify the subscribers of `key` on `target`.
    ///
    /// `key` is `None` when only the shape fallback should fire.
    pub fn trigger(target: &dyn Trackable, op: TriggerOp, key: Option<&Key>) {
        Self::trigger_batch(target, &[(op, key.cloned())]);
    }

    /// Notify the union of the subscribers of several writes to one target.
    ///
    /// Every subscriber is notified once, however many of the writes it
    /// depends on.
    pub fn trigger_batch(target: &dyn Trackable, changes: &[(TriggerOp, Option<Key>)]) {
        let id = target.target_id();

        let collected = REGISTRY.with(|registry| {
            registry
                .borrow()
                .entry(id)
                .map(|entry| Self::collect(entry, target, changes))
        });

        let Some(subscribers) = collected else {
            debug!(target = id.raw(), "write to a target nothing has read; ignoring");
            return;
        };

        trace!(
            target = id.raw(),
            changes = changes.len(),
            subscribers = subscribers.len(),
            "triggering subscribers"
        );

        for subscriber in subscribers.into_values() {
            subscriber.notify();
        }
    }

    fn collect(
        entry: &TargetEntry,
        target: &dyn Trackable,
        changes: &[(TriggerOp, Option<Key>)],
    ) -> IndexMap<SubscriberId, Rc<dyn Subscriber>> {
        let mut subscribers = IndexMap::new();
        let mut add = |key: &Key| {
            if let Some(dep) = entry.dep(key) {
                for subscriber in dep.snapshot() {
                    subscribers
                        .entry(subscriber.subscriber_id())
                        .or_insert(subscriber);
                }
            }
        };

        for (op, key) in changes {
            if let Some(key) = key {
                add(key);
            }
            if op.changes_shape() {
                add(&target.target_kind().shape_key());
            }
        }

        subscribers
    }

    /// Remove the dependency set of `(target, key)` from the registry and from
    /// every subscriber that belonged to it.
    ///
    /// Returns the number of subscribers that were detached.
    pub fn scrub(target: &dyn Trackable, key: &Key) -> usize {
        let id = target.target_id();
        let removed = REGISTRY.with(|registry| registry.borrow_mut().remove_dep(id, key));

        let Some(dep) = removed else {
            return 0;
        };

        let detached = dep.drain();
        for subscriber in &detached {
            subscriber.forget_dep(&dep);
        }

        debug!(
            target = id.raw(),
            %key,
            detached = detached.len(),
            "scrubbed dependency set"
        );
        detached.len()
    }

    /// Drop the registry entry of a target that is going away.
    pub(crate) fn forget(id: TargetId) {
        // The registry may be busy (or already torn down) when a target is
        // dropped from inside another registry operation; `prune` reclaims
        // the entry later in that case.
        let removed = REGISTRY
            .try_with(|registry| {
                registry
                    .try_borrow_mut()
                    .ok()
                    .and_then(|mut registry| registry.remove(id))
            })
            .ok()
            .flatten();

        if removed.is_some() {
            trace!(target = id.raw(), "forgot dropped target");
        }
        drop(removed);
    }

    /// Reclaim the entries of every target that is gone.
    pub fn prune() -> usize {
        let dead = REGISTRY.with(|registry| registry.borrow_mut().take_dead());
        let count = dead.len();
        if count > 0 {
            debug!(removed = count, "pruned dead targets from registry");
        }
        drop(dead);
        count
    }

    /// Whether anything has ever been tracked on the target.
    pub fn has_entry(target: &dyn Trackable) -> bool {
        REGISTRY.with(|registry| registry.borrow().contains(target.target_id()))
    }

    /// Number of subscribers currently recorded for `(target, key)`.
    pub fn subscriber_count(target: &dyn Trackable, key: &Key) -> usize {
        REGISTRY.with(|registry| {
            registry
                .borrow()
                .get(target.target_id(), key)
                .map_or(0, |dep| dep.len())
        })
    }

    /// Number of targets with a registry entry.
    pub fn target_count() -> usize {
        REGISTRY.with(|registry| registry.borrow().len())
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a reactive context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}
