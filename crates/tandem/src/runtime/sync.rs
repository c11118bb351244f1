//! Transform sync: the one point where physics overwrites the scene.
//!
//! Runs after the frame's physics step has finished and before the next
//! batch build reads world transforms. In dual-threaded mode that means
//! after the join.

use tandem_core::EntityRegistry;
use tandem_physics::{DynamicsWorld, ImpostorId};
use tandem_rendering::{GeometryId, Scene};

/// What one sync pass did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Queued scene commands applied.
    pub commands: usize,
    /// World transforms copied from impostors.
    pub synced: usize,
    /// Entities whose impostor or geometry no longer exists.
    pub stale: usize,
}

/// Applies queued scene edits, then copies every impostor transform into
/// the world transform of its entity's geometry.
///
/// Commands go first so that a mesh created this frame already carries
/// the physics pose when it is first drawn.
pub fn sync_transforms(
    scene: &mut Scene,
    world: &DynamicsWorld,
    entities: &EntityRegistry,
) -> SyncStats {
    let mut stats = SyncStats {
        commands: scene.apply_commands(),
        ..SyncStats::default()
    };

    for record in entities.with_physics_and_graphics() {
        let impostor = ImpostorId::from_raw(record.physics_id);
        let geometry = GeometryId::from_raw(record.graphics_id);

        let written = world
            .impostor_transform(impostor)
            .is_some_and(|transform| scene.set_geometry_world_transform(geometry, transform));

        if written {
            stats.synced += 1;
        } else {
            stats.stale += 1;
            tracing::trace!(eid = record.eid.raw(), %impostor, %geometry, "stale entity skipped in sync");
        }
    }

    stats
}
