//! Reactive Primitives
//!
//! This module implements the core reactive system: reactive objects,
//! computed cells, and effects. These primitives form the foundation of
//! Ripple's fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Reactive Objects
//!
//! A [`Reactive`] wraps a plain object or array ([`Target`]). When one of its
//! keys is read within a tracking context (such as a computed getter or an
//! effect), the key automatically registers that context as a dependent. When
//! the key is written, only the dependents of that key are notified.
//!
//! ## Computed Cells
//!
//! A [`Computed`] is a derived value that caches its result. It re-evaluates
//! lazily, on the first read after one of its dependencies changed.
//!
//! ## Effects
//!
//! An [`Effect`] is a side-effecting computation that re-runs whenever one of
//! the keys it read is written.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local stack of running subscribers to
//! detect dependencies, and a thread-local registry mapping each
//! `(target, key)` pair to the subscribers that read it.

mod computed;
mod context;
mod effect;
mod proxy;
mod runtime;
mod subscriber;
mod value;

pub use computed::{derive_computed, Computed, ComputedSource, ComputedState};
pub use context::ReactiveContext;
pub use effect::{subscribe, Effect, EffectOptions, Scheduler};
pub use proxy::{reactive, wrap_reactive, Reactive};
pub use runtime::{Runtime, TrackOp, TriggerOp};
pub use subscriber::{Subscriber, SubscriberId};
pub use value::{Composite, Target, Value, MAX_ARRAY_LEN};
