//! Reactive Handles
//!
//! A [`Reactive`] is the tracked view of a [`Target`]. Reads through it record
//! dependencies; writes through it notify dependents.
//!
//! # Wrapping
//!
//! Wrapping is idempotent: [`reactive`] keeps a per-thread weak cache from
//! target to handle, so wrapping the same target twice yields the same handle
//! for as long as that handle is alive. Nested composites are wrapped lazily,
//! when they are read, not when the outer object is wrapped.
//!
//! # Arrays
//!
//! Index writes go through [`Reactive::set`] like any other key. Writing past
//! the end is an "add" and therefore also reaches `length` readers. The bulk
//! mutators ([`Reactive::push`], [`Reactive::pop`], [`Reactive::insert`],
//! [`Reactive::remove`]) collect every index they changed plus the length
//! change and notify the union once, so a subscriber runs once per call.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use super::runtime::{Runtime, TrackOp, TriggerOp};
use super::value::{Composite, Target, Value, Written};
use crate::error::{ReactiveError, Result};
use crate::graph::{Key, TargetId, TargetKind, Trackable};

thread_local! {
    static PROXY_CACHE: RefCell<HashMap<TargetId, Weak<ProxyInner>>> = RefCell::new(HashMap::new());
}

struct ProxyInner {
    target: Target,
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        let id = self.target.id();
        let _ = PROXY_CACHE.try_with(|cache| {
            if let Ok(mut cache) = cache.try_borrow_mut() {
                if cache.get(&id).is_some_and(|weak| weak.strong_count() == 0) {
                    cache.remove(&id);
                }
            }
        });
    }
}

/// Wrap a target in its reactive handle.
pub fn reactive(target: &Target) -> Reactive {
    let id = target.id();
    PROXY_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if let Some(inner) = cache.get(&id).and_then(Weak::upgrade) {
            return Reactive { inner };
        }

        trace!(target = id.raw(), "wrapping target");
        let inner = Rc::new(ProxyInner {
            target: target.clone(),
        });
        cache.insert(id, Rc::downgrade(&inner));
        Reactive { inner }
    })
}

/// Wrap a value if it is a composite. Primitives are returned unchanged.
pub fn wrap_reactive(value: Value) -> Value {
    match value {
        Value::Object(target) => Value::Reactive(reactive(&target)),
        other => other,
    }
}

/// A tracked handle to a [`Target`].
///
/// # Example
///
/// ```rust,ignore
/// let state = reactive(&Target::from(json!({ "name": "a", "age": 1 })));
///
/// let _effect = Effect::new({
///     let state = state.clone();
///     move || println!("{}", state.get("name"))
/// });
///
/// state.set("name", "b")?;  // Prints "b"
/// state.set("age", 2)?;     // Prints nothing
/// ```
#[derive(Clone)]
pub struct Reactive {
    inner: Rc<ProxyInner>,
}

impl Reactive {
    /// The wrapped target. Access through it is untracked.
    pub fn raw(&self) -> &Target {
        &self.inner.target
    }

    pub fn id(&self) -> TargetId {
        self.inner.target.id()
    }

    pub fn is_array(&self) -> bool {
        self.inner.target.is_array()
    }

    /// Whether two handles are the same handle.
    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Read a key, tracking it. Composite values come back wrapped.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        let value = self.raw().data().read(&key);
        Runtime::track(self.raw(), TrackOp::Get, &key);
        wrap_reactive(value)
    }

    /// Check whether a key exists, tracking it.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        let found = self.raw().data().contains(&key);
        Runtime::track(self.raw(), TrackOp::Has, &key);
        found
    }

    /// Enumerate the keys, tracking the target's shape.
    pub fn keys(&self) -> Vec<Key> {
        let keys = self.raw().data().keys();
        self.track_shape();
        keys
    }

    /// Number of fields or elements, tracking the target's shape.
    pub fn len(&self) -> usize {
        let len = self.raw().len();
        self.track_shape();
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn track_shape(&self) {
        let key = self.raw().kind().shape_key();
        let op = match key {
            Key::Length => TrackOp::Get,
            _ => TrackOp::Iterate,
        };
        Runtime::track(self.raw(), op, &key);
    }

    /// Write a key and notify its dependents.
    ///
    /// A new key notifies as an "add"; an existing key notifies only if the
    /// value actually changed.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into().into_raw();
        let written = self.raw().data_mut().write(&key, value.clone())?;

        let changes = Self::changes_for(&key, &value, &written);
        if !changes.is_empty() {
            Runtime::trigger_batch(self.raw(), &changes);
        }
        Ok(())
    }

    fn changes_for(key: &Key, value: &Value, written: &Written) -> Vec<(TriggerOp, Option<Key>)> {
        if let (Key::Length, Some(old_len)) = (key, written.old_len) {
            let new_len = value.as_f64().map_or(old_len, |n| n as usize);
            if new_len == old_len {
                return Vec::new();
            }
            let mut changes = vec![(TriggerOp::Set, Some(Key::Length))];
            changes.extend((new_len..old_len).map(|i| (TriggerOp::Delete, Some(Key::Index(i)))));
            return changes;
        }

        if !written.had_key {
            vec![(TriggerOp::Add, Some(key.clone()))]
        } else if written.old != *value {
            vec![(TriggerOp::Set, Some(key.clone()))]
        } else {
            Vec::new()
        }
    }

    /// Delete a key.
    ///
    /// The dependency set of the deleted key is removed from the registry and
    /// from every subscriber that held it. Readers of the target's shape are
    /// notified. Returns whether the key existed.
    pub fn delete(&self, key: impl Into<Key>) -> Result<bool> {
        let key = key.into();
        let removed = self.raw().data_mut().remove(&key)?;

        Runtime::scrub(self.raw(), &key);
        if removed.is_some() {
            Runtime::trigger(self.raw(), TriggerOp::Delete, None);
        }
        Ok(removed.is_some())
    }

    fn with_items<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> Result<R>) -> Result<R> {
        match &mut *self.raw().data_mut() {
            Composite::Array(items) => f(items),
            Composite::Object(_) => Err(ReactiveError::NotAnArray),
        }
    }

    /// Append an element. Returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        let value = value.into().into_raw();
        let index = self.with_items(|items| {
            items.push(value);
            Ok(items.len() - 1)
        })?;

        Runtime::trigger_batch(
            self.raw(),
            &[
                (TriggerOp::Add, Some(Key::Index(index))),
                (TriggerOp::Set, Some(Key::Length)),
            ],
        );
        Ok(index + 1)
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Result<Option<Value>> {
        let popped = self.with_items(|items| Ok(items.pop().map(|v| (items.len(), v))))?;

        let Some((index, value)) = popped else {
            return Ok(None);
        };
        Runtime::trigger_batch(
            self.raw(),
            &[
                (TriggerOp::Delete, Some(Key::Index(index))),
                (TriggerOp::Set, Some(Key::Length)),
            ],
        );
        Ok(Some(wrap_reactive(value)))
    }

    /// Insert an element at `index`, shifting later elements up.
    pub fn insert(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        let value = value.into().into_raw();
        let old_len = self.with_items(|items| {
            let len = items.len();
            if index > len {
                return Err(ReactiveError::IndexOutOfBounds { index, len });
            }
            items.insert(index, value);
            Ok(len)
        })?;

        let mut changes: Vec<_> = (index..old_len)
            .map(|i| (TriggerOp::Set, Some(Key::Index(i))))
            .collect();
        changes.push((TriggerOp::Add, Some(Key::Index(old_len))));
        changes.push((TriggerOp::Set, Some(Key::Length)));
        Runtime::trigger_batch(self.raw(), &changes);
        Ok(())
    }

    /// Remove the element at `index`, shifting later elements down.
    pub fn remove(&self, index: usize) -> Result<Value> {
        let (removed, new_len) = self.with_items(|items| {
            let len = items.len();
            if index >= len {
                return Err(ReactiveError::IndexOutOfBounds { index, len });
            }
            let removed = items.remove(index);
            Ok((removed, items.len()))
        })?;

        let mut changes: Vec<_> = (index..new_len)
            .map(|i| (TriggerOp::Set, Some(Key::Index(i))))
            .collect();
        changes.push((TriggerOp::Delete, Some(Key::Index(new_len))));
        changes.push((TriggerOp::Set, Some(Key::Length)));
        Runtime::trigger_batch(self.raw(), &changes);
        Ok(wrap_reactive(removed))
    }

    /// Deep, tracked read into JSON.
    ///
    /// Every key and nested composite is read through its reactive handle, so
    /// the current subscriber depends on all of them, including the shape of
    /// each composite. Cyclic references render as `null`.
    pub fn snapshot(&self) -> serde_json::Value {
        let mut visiting = Vec::new();
        self.snapshot_guarded(&mut visiting)
    }

    fn snapshot_guarded(&self, visiting: &mut Vec<TargetId>) -> serde_json::Value {
        if visiting.contains(&self.id()) {
            return serde_json::Value::Null;
        }
        visiting.push(self.id());

        let keys = self.keys();
        let json = if self.is_array() {
            serde_json::Value::Array(
                keys.iter()
                    .map(|key| Self::snapshot_value(self.get(key), visiting))
                    .collect(),
            )
        } else {
            serde_json::Value::Object(
                keys.iter()
                    .filter_map(|key| match key {
                        Key::Field(name) => {
                            Some((name.clone(), Self::snapshot_value(self.get(key), visiting)))
                        }
                        _ => None,
                    })
                    .collect(),
            )
        };

        visiting.pop();
        json
    }

    fn snapshot_value(value: Value, visiting: &mut Vec<TargetId>) -> serde_json::Value {
        match value {
            Value::Reactive(nested) => nested.snapshot_guarded(visiting),
            other => other.to_json(),
        }
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Trackable for Reactive {
    fn target_id(&self) -> TargetId {
        self.raw().target_id()
    }

    fn target_kind(&self) -> TargetKind {
        self.raw().target_kind()
    }

    fn downgrade(&self) -> Weak<dyn Any> {
        self.raw().downgrade()
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("target", &self.inner.target)
            .finish()
    }
}
