//! Target Map
//!
//! The two-level store behind tracking: `target -> key -> Dep`.
//!
//! The outer level never owns its targets. Each entry keeps only a weak
//! liveness handle; targets remove their own entry when dropped, and any entry
//! whose handle is dead is reclaimed by [`TargetMap::prune`].

use std::any::Any;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::dep::Dep;
use super::target::{Key, TargetId, TargetKind, Trackable};

/// Entry count below which the map never prunes on insert.
const MIN_PRUNE_THRESHOLD: usize = 64;

/// Per-target entry.
pub struct TargetEntry {
    target: Weak<dyn Any>,
    kind: TargetKind,
    deps: HashMap<Key, Rc<Dep>>,
}

impl TargetEntry {
    /// Whether the target is still alive.
    pub fn is_alive(&self) -> bool {
        self.target.strong_count() > 0
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn dep(&self, key: &Key) -> Option<&Rc<Dep>> {
        self.deps.get(key)
    }

    pub fn deps(&self) -> impl Iterator<Item = &Rc<Dep>> {
        self.deps.values()
    }
}

/// The dependency registry.
pub struct TargetMap {
    entries: HashMap<TargetId, TargetEntry>,
    prune_threshold: usize,
}

impl TargetMap {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            prune_threshold: MIN_PRUNE_THRESHOLD,
        }
    }

    /// Get the dependency set for `(target, key)`, creating the entry and the
    /// set on first use.
    pub fn dep_for(&mut self, target: &dyn Trackable, key: &Key) -> Rc<Dep> {
        let id = target.target_id();
        if !self.entries.contains_key(&id) && self.entries.len() >= self.prune_threshold {
            self.prune();
            self.prune_threshold = (self.entries.len() * 2).max(MIN_PRUNE_THRESHOLD);
        }

        let entry = self.entries.entry(id).or_insert_with(|| TargetEntry {
            target: target.downgrade(),
            kind: target.target_kind(),
            deps: HashMap::new(),
        });
        Rc::clone(
            entry
                .deps
                .entry(key.clone())
                .or_insert_with(|| Rc::new(Dep::new(id, key.clone()))),
        )
    }

    /// Get the entry for a target.
    pub fn entry(&self, id: TargetId) -> Option<&TargetEntry> {
        self.entries.get(&id)
    }

    /// Get the dependency set for `(target, key)` without creating it.
    pub fn get(&self, id: TargetId, key: &Key) -> Option<Rc<Dep>> {
        self.entries.get(&id)?.deps.get(key).cloned()
    }

    pub fn contains(&self, id: TargetId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Detach the dependency set for `(target, key)`.
    pub fn remove_dep(&mut self, id: TargetId, key: &Key) -> Option<Rc<Dep>> {
        self.entries.get_mut(&id)?.deps.remove(key)
    }

    /// Detach a whole target entry.
    ///
    /// The entry is returned rather than dropped so the caller can release any
    /// borrow of the map before the subscribers it owns are dropped.
    pub fn remove(&mut self, id: TargetId) -> Option<TargetEntry> {
        self.entries.remove(&id)
    }

    /// Detach every entry whose target is gone.
    pub fn take_dead(&mut self) -> Vec<TargetEntry> {
        let dead: Vec<TargetId> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_alive())
            .map(|(id, _)| *id)
            .collect();

        dead.into_iter()
            .filter_map(|id| self.entries.remove(&id))
            .collect()
    }

    /// Drop every entry whose target is gone. Returns how many were removed.
    pub fn prune(&mut self) -> usize {
        let removed = self.take_dead().len();
        if removed > 0 {
            debug!(removed, "pruned dead targets from registry");
        }
        removed
    }

    /// Number of targets with an entry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TargetMap {
    fn default() -> Self {
        Self::new()
    }
}
