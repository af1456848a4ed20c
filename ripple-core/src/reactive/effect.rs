//! Effect Implementation
//!
//! An Effect is a re-runnable computation that records the reactive keys it
//! reads and re-runs when one of them is written.
//!
//! # How Effects Work
//!
//! 1. When created, an eager effect runs its function immediately to
//!    establish initial dependencies. A lazy effect waits for `run()`.
//!
//! 2. While running, the effect sits on the active-subscriber stack, so every
//!    tracked read links the key to this effect.
//!
//! 3. When a dependency is written, the effect re-runs, or, if it was created
//!    with a scheduler, the scheduler is called instead.
//!
//! # Re-entrancy
//!
//! An effect that is already on the stack does not run again. This is what
//! stops an effect that writes a key it also reads from recursing forever.
//!
//! # Lifetime
//!
//! Dependency sets hold their subscribers weakly. An effect lives exactly as
//! long as one of its [`Effect`] handles does; dropping the last handle
//! detaches it from every dependency set and releases whatever its function
//! captured. Call [`Effect::dispose`] to stop it while handles remain.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::{debug, trace};

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId};
use crate::graph::Dep;

/// Callback invoked instead of a direct re-run.
pub type Scheduler = Rc<dyn Fn()>;

/// Configuration for an effect.
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Defer the first run until `run()` is called.
    pub lazy: bool,

    /// Marks the runner of a computed cell.
    pub computed: bool,

    /// Called on notification instead of re-running the effect.
    pub scheduler: Option<Scheduler>,
}

impl EffectOptions {
    /// Options for an eager effect without a scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn computed(mut self, computed: bool) -> Self {
        self.computed = computed;
        self
    }

    pub fn scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn() + 'static,
    {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("computed", &self.computed)
            .field("scheduler", &self.scheduler.is_some())
            .finish()
    }
}

/// Shared state of an effect.
struct EffectInner<T> {
    id: SubscriberId,

    /// The effect function.
    callback: RefCell<Box<dyn FnMut() -> T>>,

    options: EffectOptions,

    /// Dependency sets this effect joined, in the order it joined them.
    deps: RefCell<SmallVec<[Weak<Dep>; 4]>>,

    disposed: Cell<bool>,

    run_count: Cell<usize>,
}

impl<T: 'static> EffectInner<T> {
    fn run(self: &Rc<Self>) -> Option<T> {
        if self.disposed.get() {
            return None;
        }

        if ReactiveContext::contains(self.id) {
            trace!(subscriber = self.id.raw(), "effect already running; skipped");
            return None;
        }

        let _ctx = ReactiveContext::enter(Rc::clone(self) as Rc<dyn Subscriber>);
        self.run_count.set(self.run_count.get() + 1);

        let mut callback = self.callback.borrow_mut();
        let result = (&mut **callback)();
        Some(result)
    }
}

impl<T: 'static> Subscriber for EffectInner<T> {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn notify(self: Rc<Self>) {
        // A notification pass may still hold an effect disposed mid-pass.
        if self.disposed.get() {
            return;
        }

        match &self.options.scheduler {
            Some(scheduler) => {
                trace!(subscriber = self.id.raw(), "handing notification to scheduler");
                scheduler();
            }
            None => {
                self.run();
            }
        }
    }

    fn record_dep(&self, dep: &Rc<Dep>) {
        let mut deps = self.deps.borrow_mut();
        deps.retain(|weak| weak.strong_count() > 0);
        deps.push(Rc::downgrade(dep));
    }

    fn forget_dep(&self, dep: &Dep) {
        self.deps
            .borrow_mut()
            .retain(|weak| !std::ptr::eq(weak.as_ptr(), dep));
    }

    fn dependency_count(&self) -> usize {
        self.deps
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

impl<T> Drop for EffectInner<T> {
    fn drop(&mut self) {
        let id = self.id;
        for dep in self.deps.get_mut().drain(..).filter_map(|weak| weak.upgrade()) {
            dep.remove(id);
        }
    }
}

/// A re-runnable computation that runs when its dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let state = reactive(&Target::from(json!({ "count": 0 })));
///
/// let effect = Effect::new({
///     let state = state.clone();
///     move || println!("Count is: {}", state.get("count"))
/// });
///
/// state.set("count", 5)?;  // Prints: "Count is: 5"
/// ```
#[must_use = "an effect stops running when its last handle is dropped"]
pub struct Effect<T: 'static = ()> {
    inner: Rc<EffectInner<T>>,
}

impl<T: 'static> Effect<T> {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: FnMut() -> T + 'static,
    {
        Self::with_options(run, EffectOptions::new())
    }

    /// Create a new effect without running it immediately.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: FnMut() -> T + 'static,
    {
        Self::with_options(run, EffectOptions::new().lazy(true))
    }

    /// Create a new effect with explicit options.
    pub fn with_options<F>(run: F, options: EffectOptions) -> Self
    where
        F: FnMut() -> T + 'static,
    {
        let lazy = options.lazy;
        let effect = Self {
            inner: Rc::new(EffectInner {
                id: SubscriberId::new(),
                callback: RefCell::new(Box::new(run)),
                options,
                deps: RefCell::new(SmallVec::new()),
                disposed: Cell::new(false),
                run_count: Cell::new(0),
            }),
        };

        if !lazy {
            effect.run();
        }

        effect
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Run the effect function with dependency tracking.
    ///
    /// Returns the function's result, or `None` if the effect is already
    /// running further up the stack or has been disposed.
    pub fn run(&self) -> Option<T> {
        self.inner.run()
    }

    pub fn options(&self) -> &EffectOptions {
        &self.inner.options
    }

    /// Dispose of the effect.
    ///
    /// The effect leaves every dependency set it joined and will not run again.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }

        let deps: SmallVec<[Weak<Dep>; 4]> = self.inner.deps.borrow_mut().drain(..).collect();
        for dep in deps.iter().filter_map(Weak::upgrade) {
            dep.remove(self.inner.id);
        }
        debug!(
            subscriber = self.inner.id.raw(),
            deps = deps.len(),
            "disposed effect"
        );
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Get the number of dependency sets the effect belongs to.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependency_count()
    }
}

impl<T: 'static> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("options", &self.inner.options)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Register a reactive side effect.
///
/// Unless `options.lazy` is set, the callback runs once before this returns.
pub fn subscribe<T, F>(callback: F, options: EffectOptions) -> Effect<T>
where
    T: 'static,
    F: FnMut() -> T + 'static,
{
    Effect::with_options(callback, options)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
