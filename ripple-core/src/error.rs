//! Error types for reactive writes.
//!
//! Reads never fail: a missing key reads as [`Value::Null`](crate::reactive::Value::Null).
//! Only writes through a [`Reactive`](crate::reactive::Reactive) handle and
//! cyclic computed reads produce errors.

use thiserror::Error;

use crate::graph::Key;

/// Errors produced by the reactive engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReactiveError {
    /// The key cannot address this kind of target (a field on an array, an
    /// index on an object).
    #[error("key {key} cannot be used on {kind} target")]
    InvalidKey { key: Key, kind: &'static str },

    /// An array length must be a non-negative integer no larger than
    /// [`MAX_ARRAY_LEN`](crate::reactive::MAX_ARRAY_LEN).
    #[error("invalid array length {0}")]
    InvalidLength(f64),

    /// An array mutator was called on an object target.
    #[error("target is not an array")]
    NotAnArray,

    /// An index passed to `insert`/`remove` is past the end of the array, or
    /// an index write would grow the array past
    /// [`MAX_ARRAY_LEN`](crate::reactive::MAX_ARRAY_LEN).
    #[error("index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A computed getter read its own value while it was being evaluated.
    #[error("computed value read itself during evaluation")]
    CyclicComputed,
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;
