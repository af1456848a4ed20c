//! Dependency sets.
//!
//! A [`Dep`] is the set of subscribers that read one `(target, key)` pair.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::target::{Key, TargetId};
use crate::reactive::{Subscriber, SubscriberId};

/// The subscribers of a single `(target, key)` pair.
///
/// Membership only: a subscriber is recorded at most once. Members are held
/// weakly, so a dependency set never keeps a subscriber (or anything its
/// callback captured) alive. Dead members are skipped and swept on snapshot.
pub struct Dep {
    target: TargetId,
    key: Key,
    subscribers: RefCell<IndexMap<SubscriberId, Weak<dyn Subscriber>>>,
}

impl Dep {
    pub(crate) fn new(target: TargetId, key: Key) -> Self {
        Self {
            target,
            key,
            subscribers: RefCell::new(IndexMap::new()),
        }
    }

    /// The target this set belongs to.
    pub fn target(&self) -> TargetId {
        self.target
    }

    /// The key this set belongs to.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Add a subscriber. Returns `false` if it was already present.
    pub fn insert(&self, subscriber: &Rc<dyn Subscriber>) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let id = subscriber.subscriber_id();
        if subscribers.contains_key(&id) {
            return false;
        }
        subscribers.insert(id, Rc::downgrade(subscriber));
        true
    }

    /// Remove a subscriber by ID.
    pub fn remove(&self, id: SubscriberId) -> bool {
        self.subscribers.borrow_mut().shift_remove(&id).is_some()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers
            .borrow()
            .get(&id)
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Number of live members.
    pub fn len(&self) -> usize {
        self.subscribers
            .borrow()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the live members out, so the set can change while they run.
    pub fn snapshot(&self) -> Vec<Rc<dyn Subscriber>> {
        let mut subscribers = self.subscribers.borrow_mut();
        subscribers.retain(|_, weak| weak.strong_count() > 0);
        subscribers.values().filter_map(Weak::upgrade).collect()
    }

    /// Remove every member and return the live ones.
    pub(crate) fn drain(&self) -> Vec<Rc<dyn Subscriber>> {
        let drained: Vec<Weak<dyn Subscriber>> = self
            .subscribers
            .borrow_mut()
            .drain(..)
            .map(|(_, weak)| weak)
            .collect();
        drained.iter().filter_map(Weak::upgrade).collect()
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("target", &self.target)
            .field("key", &self.key)
            .field("subscribers", &self.len())
            .finish()
    }
}
