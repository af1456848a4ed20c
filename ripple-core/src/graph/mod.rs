//! Dependency Registry
//!
//! This module stores which subscribers read which `(target, key)` pairs.
//!
//! # Overview
//!
//! The registry is a two-level map:
//!
//! - The outer level is keyed by target identity ([`TargetId`]). It holds only
//!   a weak liveness handle per target, so tracking never extends a target's
//!   lifetime.
//! - The inner level is keyed by [`Key`] and holds a [`Dep`]: the set of
//!   subscribers that read that key.
//!
//! Subscribers keep weak back-references to the [`Dep`]s they belong to, so a
//! disposed or scrubbed subscriber can be removed from every set it joined.

mod dep;
mod registry;
mod target;

pub use dep::Dep;
pub use registry::{TargetEntry, TargetMap};
pub use target::{Key, TargetId, TargetKind, Trackable};
