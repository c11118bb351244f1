//! # Entities
//!
//! Lightweight correlation records tying one logical game object to
//! (optionally) one geometry entry and one physics impostor.
//!
//! ## Design
//!
//! - Struct-of-arrays arena keyed by a stable slot index
//! - `0` is the "no component attached" sentinel for both component ids
//! - Queries are iterators over the arena, not copies

mod entity;

pub use entity::{EntityId, EntityRecord, EntityRegistry, NO_COMPONENT};
