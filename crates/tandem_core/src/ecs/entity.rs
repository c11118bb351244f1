//! # Entity Registry
//!
//! Entities are plain ids. The registry stores their component ids in
//! parallel arrays indexed by slot:
//!
//! ```text
//! slot      0     1     2     3
//! eid       1     2     4     3
//! graphics  7     0     9     0      0 = no geometry
//! physics   3     5     0     0      0 = no impostor
//! alive     T     T     T     F
//! ```
//!
//! Slots are recycled through a free list; entity ids never are.

use std::collections::HashMap;

/// Sentinel component id meaning "not attached".
pub const NO_COMPONENT: u64 = 0;

/// Identifier of a logical game object.
///
/// Assigned sequentially from 1; never reused within a registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Value copy of one entity's correlation record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityRecord {
    /// The entity.
    pub eid: EntityId,
    /// Geometry id, or [`NO_COMPONENT`].
    pub graphics_id: u64,
    /// Impostor id, or [`NO_COMPONENT`].
    pub physics_id: u64,
}

impl EntityRecord {
    /// Whether a geometry entry is attached.
    #[inline]
    #[must_use]
    pub const fn has_graphics(&self) -> bool {
        self.graphics_id != NO_COMPONENT
    }

    /// Whether a physics impostor is attached.
    #[inline]
    #[must_use]
    pub const fn has_physics(&self) -> bool {
        self.physics_id != NO_COMPONENT
    }
}

/// Arena of entity records.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    eids: Vec<EntityId>,
    graphics: Vec<u64>,
    physics: Vec<u64>,
    alive: Vec<bool>,
    /// eid -> slot, live entities only.
    slots: HashMap<EntityId, usize>,
    free_slots: Vec<usize>,
    next_eid: u64,
}

impl EntityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_eid: 1,
            ..Self::default()
        }
    }

    /// Creates a registry with room for `capacity` entities.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            eids: Vec::with_capacity(capacity),
            graphics: Vec::with_capacity(capacity),
            physics: Vec::with_capacity(capacity),
            alive: Vec::with_capacity(capacity),
            slots: HashMap::with_capacity(capacity),
            free_slots: Vec::new(),
            next_eid: 1,
        }
    }

    /// Creates an entity with no components.
    pub fn spawn(&mut self) -> EntityId {
        // `Default` leaves the counter at 0; ids start at 1.
        self.next_eid = self.next_eid.max(1);
        let eid = EntityId(self.next_eid);
        self.next_eid += 1;

        let slot = if let Some(slot) = self.free_slots.pop() {
            self.eids[slot] = eid;
            self.graphics[slot] = NO_COMPONENT;
            self.physics[slot] = NO_COMPONENT;
            self.alive[slot] = true;
            slot
        } else {
            self.eids.push(eid);
            self.graphics.push(NO_COMPONENT);
            self.physics.push(NO_COMPONENT);
            self.alive.push(true);
            self.eids.len() - 1
        };
        self.slots.insert(eid, slot);
        eid
    }

    /// Creates an entity with both component ids set.
    pub fn spawn_with(&mut self, graphics_id: u64, physics_id: u64) -> EntityId {
        let eid = self.spawn();
        let slot = self.slots[&eid];
        self.graphics[slot] = graphics_id;
        self.physics[slot] = physics_id;
        eid
    }

    /// Removes an entity. Returns `false` if it was not alive.
    ///
    /// The component ids are forgotten; the geometry and impostor they named
    /// are owned elsewhere and must be destroyed by their owners.
    pub fn despawn(&mut self, eid: EntityId) -> bool {
        let Some(slot) = self.slots.remove(&eid) else {
            return false;
        };
        self.alive[slot] = false;
        self.graphics[slot] = NO_COMPONENT;
        self.physics[slot] = NO_COMPONENT;
        self.free_slots.push(slot);
        true
    }

    /// Sets the geometry id. Returns `false` for an unknown entity.
    pub fn attach_graphics(&mut self, eid: EntityId, graphics_id: u64) -> bool {
        match self.slots.get(&eid) {
            Some(&slot) => {
                self.graphics[slot] = graphics_id;
                true
            }
            None => false,
        }
    }

    /// Sets the impostor id. Returns `false` for an unknown entity.
    pub fn attach_physics(&mut self, eid: EntityId, physics_id: u64) -> bool {
        match self.slots.get(&eid) {
            Some(&slot) => {
                self.physics[slot] = physics_id;
                true
            }
            None => false,
        }
    }

    /// Returns a copy of the entity's record.
    #[must_use]
    pub fn get(&self, eid: EntityId) -> Option<EntityRecord> {
        self.slots.get(&eid).map(|&slot| self.record(slot))
    }

    /// Whether the entity is alive.
    #[must_use]
    pub fn contains(&self, eid: EntityId) -> bool {
        self.slots.contains_key(&eid)
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether there are no live entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All live entities, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = EntityRecord> + '_ {
        (0..self.alive.len())
            .filter(|&slot| self.alive[slot])
            .map(|slot| self.record(slot))
    }

    /// Live entities with a geometry attached.
    pub fn with_graphics_component(&self) -> impl Iterator<Item = EntityRecord> + '_ {
        self.iter().filter(EntityRecord::has_graphics)
    }

    /// Live entities with an impostor attached.
    pub fn with_physics_component(&self) -> impl Iterator<Item = EntityRecord> + '_ {
        self.iter().filter(EntityRecord::has_physics)
    }

    /// Live entities with both components. This is the transform-sync set.
    pub fn with_physics_and_graphics(&self) -> impl Iterator<Item = EntityRecord> + '_ {
        self.iter().filter(|r| r.has_graphics() && r.has_physics())
    }

    #[inline]
    fn record(&self, slot: usize) -> EntityRecord {
        EntityRecord {
            eid: self.eids[slot],
            graphics_id: self.graphics[slot],
            physics_id: self.physics[slot],
        }
    }
}
