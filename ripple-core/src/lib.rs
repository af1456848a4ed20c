//! Ripple Core
//!
//! This crate provides the dependency tracking engine behind Ripple's
//! fine-grained reactivity. It implements:
//!
//! - Reactive objects and arrays that record which keys are read
//! - Effects that re-run when exactly those keys are written
//! - Lazily recomputed computed cells
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Reactive handles, effects, computed cells and the runtime
//!   that connects them
//! - `graph`: The dependency registry from `(target, key)` to subscribers
//! - `error`: Error types for writes and cyclic computed reads
//!
//! Everything is single-threaded: each thread has its own registry and its own
//! stack of running subscribers.
//!
//! # Example
//!
//! ```rust,ignore
//! use ripple_core::{derive_computed, reactive, subscribe, EffectOptions, Target};
//! use serde_json::json;
//!
//! // Wrap a plain object
//! let state = reactive(&Target::from(json!({ "name": "a", "age": 1 })));
//!
//! // Create a derived value
//! let greeting = derive_computed({
//!     let state = state.clone();
//!     move || format!("hello {}", state.get("name"))
//! });
//!
//! // Create an effect
//! let _effect = subscribe(
//!     move || println!("{}", greeting.value()),
//!     EffectOptions::new(),
//! );
//!
//! // Only readers of "name" re-run
//! state.set("name", "b")?;
//! // Effect automatically runs, prints: "hello b"
//! state.set("age", 2)?;
//! // Nothing is printed
//! ```

pub mod error;
pub mod graph;
pub mod reactive;

pub use error::{ReactiveError, Result};
pub use graph::Key;
pub use reactive::{
    derive_computed, reactive, subscribe, wrap_reactive, Computed, ComputedSource, Effect,
    EffectOptions, Reactive, Target, Value,
};
