//! Targets and Keys
//!
//! This module defines what the registry is keyed by: the identity of a
//! trackable target and the key read or written on it.

use std::any::Any;
use std::fmt;
use std::rc::Weak;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a trackable target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

/// The shape of a target, which decides the fallback key used by
/// shape-changing writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// A plain object with named fields.
    Object,

    /// An array. Shape changes notify the `Length` key.
    Array,

    /// A computed cell, tracked under [`Key::Value`].
    Cell,
}

impl TargetKind {
    /// The key that stands for "the shape of this target changed".
    pub fn shape_key(&self) -> Key {
        match self {
            TargetKind::Array => Key::Length,
            TargetKind::Object | TargetKind::Cell => Key::Iterate,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            TargetKind::Object => "object",
            TargetKind::Array => "array",
            TargetKind::Cell => "computed",
        }
    }
}

/// A key read from or written to a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A named object field.
    Field(String),

    /// An array element.
    Index(usize),

    /// The length of an array.
    Length,

    /// Sentinel for object-level iteration. Readers that enumerate an object
    /// depend on it, and adding or removing a field notifies it.
    Iterate,

    /// The synthetic key a computed cell is tracked under.
    Value,
}

impl Key {
    /// Create a field key.
    pub fn field(name: impl Into<String>) -> Self {
        Key::Field(name.into())
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Field(name.to_owned())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Field(name)
    }
}

impl From<&String> for Key {
    fn from(name: &String) -> Self {
        Key::Field(name.clone())
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Field(name) => write!(f, "{name:?}"),
            Key::Index(index) => write!(f, "[{index}]"),
            Key::Length => f.write_str("length"),
            Key::Iterate => f.write_str("<iterate>"),
            Key::Value => f.write_str("value"),
        }
    }
}

/// Anything the registry can record dependencies against.
///
/// Implementors hand out a weak liveness handle only; the registry must never
/// keep a target alive.
pub trait Trackable {
    /// Identity of the target.
    fn target_id(&self) -> TargetId;

    /// Shape of the target.
    fn target_kind(&self) -> TargetKind;

    /// A weak reference used to detect that the target is gone.
    fn downgrade(&self) -> Weak<dyn Any>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_ids_are_unique() {
        let id1 = TargetId::new();
        let id2 = TargetId::new();
        assert_ne!(id1, id2);
        assert!(id2.raw() > id1.raw());
    }

    #[test]
    fn shape_key_depends_on_kind() {
        assert_eq!(TargetKind::Array.shape_key(), Key::Length);
        assert_eq!(TargetKind::Object.shape_key(), Key::Iterate);
    }

    #[test]
    fn keys_convert_from_names_and_indices() {
        assert_eq!(Key::from("age"), Key::Field("age".into()));
        assert_eq!(Key::from(3usize), Key::Index(3));
        assert_eq!(Key::from(3usize).to_string(), "[3]");
        assert_eq!(Key::field("x").to_string(), "\"x\"");
    }
}
