//! Plain Values
//!
//! The data a reactive object wraps: primitives plus shared, identity-bearing
//! composites ([`Target`]). Everything in this module is untracked; tracking
//! happens only through a [`Reactive`] handle.
//!
//! # Identity
//!
//! Composites compare by identity, primitives by value. This is the only
//! change detection the engine performs: writing an equal primitive or the
//! same composite back into a key does not notify anyone.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use super::proxy::Reactive;
use super::runtime::Runtime;
use crate::error::{ReactiveError, Result};
use crate::graph::{Key, TargetId, TargetKind, Trackable};

/// A value stored in, or read from, a reactive object.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),

    /// A raw composite. Reads through a [`Reactive`] never return this
    /// variant; they wrap it first.
    Object(Target),

    /// A reactive handle. Stored values never hold this variant; writes
    /// unwrap it to its raw target.
    Reactive(Reactive),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether the value is a composite (raw or wrapped).
    pub fn is_composite(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Reactive(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Value::Reactive(r) => Some(r),
            _ => None,
        }
    }

    /// The raw composite behind this value, if any.
    pub fn as_target(&self) -> Option<&Target> {
        match self {
            Value::Object(t) => Some(t),
            Value::Reactive(r) => Some(r.raw()),
            _ => None,
        }
    }

    /// Strip any reactive wrapper, leaving the value as it is stored.
    pub fn into_raw(self) -> Value {
        match self {
            Value::Reactive(r) => Value::Object(r.raw().clone()),
            other => other,
        }
    }

    /// Untracked conversion to JSON. Cyclic composites render as `null`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut visiting = Vec::new();
        self.to_json_guarded(&mut visiting)
    }

    fn to_json_guarded(&self, visiting: &mut Vec<TargetId>) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Object(_) | Value::Reactive(_) => {
                let Some(target) = self.as_target() else {
                    return serde_json::Value::Null;
                };
                if visiting.contains(&target.id()) {
                    return serde_json::Value::Null;
                }
                visiting.push(target.id());
                let json = match &*target.data() {
                    Composite::Object(fields) => serde_json::Value::Object(
                        fields
                            .iter()
                            .map(|(k, v)| (k.clone(), v.to_json_guarded(visiting)))
                            .collect(),
                    ),
                    Composite::Array(items) => serde_json::Value::Array(
                        items.iter().map(|v| v.to_json_guarded(visiting)).collect(),
                    ),
                };
                visiting.pop();
                json
            }
        }
    }
}

/// Convert a number the way JSON readers expect: integral values as integers.
pub(crate) fn number_to_json(n: f64) -> serde_json::Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (a, b) => match (a.as_target(), b.as_target()) {
                (Some(a), Some(b)) => a.ptr_eq(b),
                _ => false,
            },
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Object(t) => write!(f, "Object({t:?})"),
            Value::Reactive(r) => write!(f, "Reactive({r:?})"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Target> for Value {
    fn from(target: Target) -> Self {
        Value::Object(target)
    }
}

impl From<Reactive> for Value {
    fn from(reactive: Reactive) -> Self {
        Value::Reactive(reactive)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            composite => Value::Object(Target::from(composite)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => number_to_json(*n).serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Object(t) => t.serialize(serializer),
            Value::Reactive(r) => r.raw().serialize(serializer),
        }
    }
}

/// Largest length an array may be grown to by an index or `Length` write.
///
/// Writes that would pad an array past this fail instead of allocating.
pub const MAX_ARRAY_LEN: usize = 1 << 24;

/// The contents of a target.
#[derive(Debug, Clone)]
pub enum Composite {
    /// Named fields, in insertion order.
    Object(IndexMap<String, Value>),

    /// Elements by index.
    Array(Vec<Value>),
}

/// What a write did to a composite.
#[derive(Debug, Clone)]
pub(crate) struct Written {
    /// Whether the key existed before the write.
    pub had_key: bool,

    /// The value the key held before the write (`Null` if it did not exist).
    pub old: Value,

    /// Array length before the write, for arrays.
    pub old_len: Option<usize>,
}

impl Composite {
    pub fn kind(&self) -> TargetKind {
        match self {
            Composite::Object(_) => TargetKind::Object,
            Composite::Array(_) => TargetKind::Array,
        }
    }

    /// Own-key check.
    pub fn contains(&self, key: &Key) -> bool {
        match (self, key) {
            (Composite::Object(fields), Key::Field(name)) => fields.contains_key(name),
            (Composite::Array(items), Key::Index(i)) => *i < items.len(),
            (Composite::Array(_), Key::Length) => true,
            _ => false,
        }
    }

    /// Read a key. Missing or inapplicable keys read as `Null`.
    pub fn read(&self, key: &Key) -> Value {
        match (self, key) {
            (Composite::Object(fields), Key::Field(name)) => {
                fields.get(name).cloned().unwrap_or_default()
            }
            (Composite::Array(items), Key::Index(i)) => items.get(*i).cloned().unwrap_or_default(),
            (Composite::Array(items), Key::Length) => Value::Number(items.len() as f64),
            _ => Value::Null,
        }
    }

    /// Keys in enumeration order.
    pub fn keys(&self) -> Vec<Key> {
        match self {
            Composite::Object(fields) => fields.keys().cloned().map(Key::Field).collect(),
            Composite::Array(items) => (0..items.len()).map(Key::Index).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Composite::Object(fields) => fields.len(),
            Composite::Array(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a key.
    ///
    /// Writing an index past the end of an array pads it with `Null`.
    /// Writing `Length` resizes the array. Neither may grow the array past
    /// [`MAX_ARRAY_LEN`].
    pub(crate) fn write(&mut self, key: &Key, value: Value) -> Result<Written> {
        let value = value.into_raw();
        match (self, key) {
            (Composite::Object(fields), Key::Field(name)) => {
                let old = fields.insert(name.clone(), value);
                Ok(Written {
                    had_key: old.is_some(),
                    old: old.unwrap_or_default(),
                    old_len: None,
                })
            }
            (Composite::Array(items), Key::Index(i)) => {
                let old_len = items.len();
                if *i >= old_len {
                    let new_len = i
                        .checked_add(1)
                        .filter(|len| *len <= MAX_ARRAY_LEN)
                        .ok_or(ReactiveError::IndexOutOfBounds {
                            index: *i,
                            len: old_len,
                        })?;
                    items.resize(new_len, Value::Null);
                }
                let old = std::mem::replace(&mut items[*i], value);
                Ok(Written {
                    had_key: *i < old_len,
                    old,
                    old_len: Some(old_len),
                })
            }
            (Composite::Array(items), Key::Length) => {
                let new_len = match value {
                    Value::Number(n) if n >= 0.0 && n.fract() == 0.0 && n <= MAX_ARRAY_LEN as f64 => {
                        n as usize
                    }
                    Value::Number(n) => return Err(ReactiveError::InvalidLength(n)),
                    _ => return Err(ReactiveError::InvalidLength(f64::NAN)),
                };
                let old_len = items.len();
                items.resize(new_len, Value::Null);
                Ok(Written {
                    had_key: true,
                    old: Value::Number(old_len as f64),
                    old_len: Some(old_len),
                })
            }
            (composite, key) => Err(ReactiveError::InvalidKey {
                key: key.clone(),
                kind: composite.kind().name(),
            }),
        }
    }

    /// Delete a key, returning the removed value if it existed.
    ///
    /// Deleting an array element leaves a `Null` hole and keeps the length.
    pub(crate) fn remove(&mut self, key: &Key) -> Result<Option<Value>> {
        match (self, key) {
            (Composite::Object(fields), Key::Field(name)) => Ok(fields.shift_remove(name)),
            (Composite::Array(items), Key::Index(i)) => Ok(items.get_mut(*i).map(std::mem::take)),
            (composite, key) => Err(ReactiveError::InvalidKey {
                key: key.clone(),
                kind: composite.kind().name(),
            }),
        }
    }
}

struct TargetInner {
    id: TargetId,
    data: RefCell<Composite>,
}

impl Drop for TargetInner {
    fn drop(&mut self) {
        Runtime::forget(self.id);
    }
}

/// A raw, shared composite.
///
/// Cloning a `Target` clones the handle, not the data. Reads and writes made
/// directly on a `Target` are untracked.
///
/// `Serialize` walks the data as-is and does not guard against cycles; use
/// [`Target::to_json`] for graphs that may refer to themselves.
#[derive(Clone)]
pub struct Target {
    inner: Rc<TargetInner>,
}

impl Target {
    fn from_composite(data: Composite) -> Self {
        Self {
            inner: Rc::new(TargetInner {
                id: TargetId::new(),
                data: RefCell::new(data),
            }),
        }
    }

    /// Create an empty object.
    pub fn object() -> Self {
        Self::from_composite(Composite::Object(IndexMap::new()))
    }

    /// Create an empty array.
    pub fn array() -> Self {
        Self::from_composite(Composite::Array(Vec::new()))
    }

    /// Create an object from `(field, value)` pairs.
    pub fn from_fields<K, V, I>(fields: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::from_composite(Composite::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into().into_raw()))
                .collect(),
        ))
    }

    /// Create an array from items.
    pub fn from_items<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self::from_composite(Composite::Array(
            items.into_iter().map(|v| v.into().into_raw()).collect(),
        ))
    }

    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    pub fn kind(&self) -> TargetKind {
        self.inner.data.borrow().kind()
    }

    pub fn is_array(&self) -> bool {
        self.kind() == TargetKind::Array
    }

    /// Whether two handles point at the same composite.
    pub fn ptr_eq(&self, other: &Target) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Untracked read.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        self.inner.data.borrow().read(&key.into())
    }

    /// Untracked write. Nobody is notified.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        self.inner
            .data
            .borrow_mut()
            .write(&key.into(), value.into())
            .map(|_| ())
    }

    pub fn len(&self) -> usize {
        self.inner.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.data.borrow().is_empty()
    }

    /// Untracked conversion to JSON.
    pub fn to_json(&self) -> serde_json::Value {
        Value::Object(self.clone()).to_json()
    }

    pub(crate) fn data(&self) -> Ref<'_, Composite> {
        self.inner.data.borrow()
    }

    pub(crate) fn data_mut(&self) -> RefMut<'_, Composite> {
        self.inner.data.borrow_mut()
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::object()
    }
}

impl Trackable for Target {
    fn target_id(&self) -> TargetId {
        self.inner.id
    }

    fn target_kind(&self) -> TargetKind {
        self.kind()
    }

    fn downgrade(&self) -> Weak<dyn Any> {
        let weak: Weak<TargetInner> = Rc::downgrade(&self.inner);
        weak
    }
}

impl From<serde_json::Value> for Target {
    /// Objects and arrays become targets; any other JSON value becomes an
    /// object holding it under `"value"`.
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Object(fields) => {
                Target::from_fields(fields.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
            serde_json::Value::Array(items) => Target::from_items(items.into_iter().map(Value::from)),
            scalar => Target::from_fields([("value", Value::from(scalar))]),
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.inner.id)
            .field("kind", &self.kind())
            .field("len", &self.len())
            .finish()
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match &*self.data() {
            Composite::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Composite::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for v in items {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
        }
    }
}
