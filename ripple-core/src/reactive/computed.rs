//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when one of
//! its dependencies has been written since the last read.
//!
//! # How Computed Cells Work
//!
//! 1. The getter runs inside a lazy internal effect, so nothing happens until
//!    the first read.
//!
//! 2. A read of a dirty cell runs the getter, caches the result and marks the
//!    cell clean. A read of a clean cell returns the cache.
//!
//! 3. When a dependency is written, the internal effect does not re-run.
//!    Its scheduler marks the cell dirty and notifies whoever read the cell.
//!
//! 4. Further writes before the next read find the cell already dirty and do
//!    nothing, so the getter runs at most once per read no matter how many
//!    upstream writes happened.
//!
//! The cell is itself trackable: reading it records a dependency on the
//! synthetic key [`Key::Value`], and invalidation triggers that key.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use super::effect::{Effect, EffectOptions};
use super::runtime::{Runtime, TrackOp, TriggerOp};
use crate::error::{ReactiveError, Result};
use crate::graph::{Key, TargetId, TargetKind, Trackable};

/// Where a computed cell gets its value from, and where writes go.
pub enum ComputedSource<T> {
    /// Read-only: writes are ignored.
    Getter(Box<dyn Fn() -> T>),

    /// A getter and a setter. The setter is expected to write upstream state.
    GetSet(Box<dyn Fn() -> T>, Box<dyn Fn(T)>),
}

impl<T> ComputedSource<T> {
    pub fn getter<G>(get: G) -> Self
    where
        G: Fn() -> T + 'static,
    {
        ComputedSource::Getter(Box::new(get))
    }

    pub fn get_set<G, S>(get: G, set: S) -> Self
    where
        G: Fn() -> T + 'static,
        S: Fn(T) + 'static,
    {
        ComputedSource::GetSet(Box::new(get), Box::new(set))
    }

    fn split(self) -> (Box<dyn Fn() -> T>, Option<Box<dyn Fn(T)>>) {
        match self {
            ComputedSource::Getter(get) => (get, None),
            ComputedSource::GetSet(get, set) => (get, Some(set)),
        }
    }
}

impl<T> fmt::Debug for ComputedSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputedSource::Getter(_) => f.write_str("Getter"),
            ComputedSource::GetSet(..) => f.write_str("GetSet"),
        }
    }
}

/// Dirty state for a computed cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency changed (or the getter never ran). Recompute on next read.
    Dirty,
}

struct ComputedInner<T: 'static> {
    id: TargetId,

    /// Runs the getter with tracking. Never runs on its own.
    runner: Effect<T>,

    setter: Option<Box<dyn Fn(T)>>,

    value: RefCell<Option<T>>,

    state: Cell<ComputedState>,

    this: Weak<ComputedInner<T>>,
}

impl<T: 'static> ComputedInner<T> {
    /// Scheduler target: a dependency was written.
    fn invalidate(&self) {
        if self.state.get() == ComputedState::Dirty {
            return;
        }

        self.state.set(ComputedState::Dirty);
        trace!(target = self.id.raw(), "computed invalidated");
        Runtime::trigger(self, TriggerOp::Set, Some(&Key::Value));
    }
}

impl<T: 'static> Trackable for ComputedInner<T> {
    fn target_id(&self) -> TargetId {
        self.id
    }

    fn target_kind(&self) -> TargetKind {
        TargetKind::Cell
    }

    fn downgrade(&self) -> Weak<dyn Any> {
        let weak: Weak<ComputedInner<T>> = self.this.clone();
        weak
    }
}

impl<T: 'static> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.runner.dispose();
        Runtime::forget(self.id);
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let state = reactive(&Target::from(json!({ "name": "a" })));
/// let shout = Computed::new({
///     let state = state.clone();
///     move || format!("{}!", state.get("name"))
/// });
///
/// assert_eq!(shout.value(), "a!");
/// state.set("name", "b")?;
/// assert_eq!(shout.value(), "b!");
/// ```
pub struct Computed<T: Clone + 'static> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: Clone + 'static> Computed<T> {
    /// Create a read-only computed cell.
    ///
    /// The getter does not run until the first read.
    pub fn new<G>(get: G) -> Self
    where
        G: Fn() -> T + 'static,
    {
        Self::from_source(ComputedSource::getter(get))
    }

    /// Create a computed cell whose writes go to `set`.
    pub fn with_setter<G, S>(get: G, set: S) -> Self
    where
        G: Fn() -> T + 'static,
        S: Fn(T) + 'static,
    {
        Self::from_source(ComputedSource::get_set(get, set))
    }

    pub fn from_source(source: ComputedSource<T>) -> Self {
        let (get, setter) = source.split();

        let inner = Rc::new_cyclic(|this: &Weak<ComputedInner<T>>| {
            let weak = this.clone();
            let options = EffectOptions::new()
                .lazy(true)
                .computed(true)
                .scheduler(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.invalidate();
                    }
                });

            ComputedInner {
                id: TargetId::new(),
                runner: Effect::with_options(move || get(), options),
                setter,
                value: RefCell::new(None),
                state: Cell::new(ComputedState::Dirty),
                this: this.clone(),
            }
        });

        Self { inner }
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// # Panics
    ///
    /// Panics if the getter reads this same cell while it is being computed.
    /// Use [`Computed::try_value`] to get an error instead.
    pub fn value(&self) -> T {
        match self.try_value() {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Get the current value, recomputing if necessary.
    pub fn try_value(&self) -> Result<T> {
        let inner = &self.inner;

        if inner.state.get() == ComputedState::Dirty {
            let Some(value) = inner.runner.run() else {
                return Err(ReactiveError::CyclicComputed);
            };
            *inner.value.borrow_mut() = Some(value);
            inner.state.set(ComputedState::Clean);
        }

        Runtime::track(&**inner, TrackOp::Get, &Key::Value);

        inner
            .value
            .borrow()
            .clone()
            .ok_or(ReactiveError::CyclicComputed)
    }

    /// Write through the configured setter.
    ///
    /// Does not mark the cell dirty itself; the setter's upstream writes do.
    pub fn set_value(&self, value: T) {
        match &self.inner.setter {
            Some(set) => set(value),
            None => debug!(target = self.inner.id.raw(), "write to read-only computed ignored"),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.state() == ComputedState::Dirty
    }

    pub fn state(&self) -> ComputedState {
        self.inner.state.get()
    }

    /// Whether writes go anywhere.
    pub fn has_setter(&self) -> bool {
        self.inner.setter.is_some()
    }

    /// Number of times the getter has run.
    pub fn compute_count(&self) -> usize {
        self.inner.runner.run_count()
    }

    /// Number of dependency sets the getter currently belongs to.
    pub fn dependency_count(&self) -> usize {
        self.inner.runner.dependency_count()
    }
}

impl<T: Clone + 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Trackable for Computed<T> {
    fn target_id(&self) -> TargetId {
        self.inner.id
    }

    fn target_kind(&self) -> TargetKind {
        TargetKind::Cell
    }

    fn downgrade(&self) -> Weak<dyn Any> {
        Trackable::downgrade(&*self.inner)
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

/// Create a computed cell from a getter or a getter/setter pair.
pub fn derive_computed<T: Clone + 'static>(source: impl Into<ComputedSource<T>>) -> Computed<T> {
    Computed::from_source(source.into())
}

impl<T, G> From<G> for ComputedSource<T>
where
    G: Fn() -> T + 'static,
{
    fn from(get: G) -> Self {
        ComputedSource::getter(get)
    }
}
