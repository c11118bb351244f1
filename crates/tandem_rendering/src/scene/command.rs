//! Deferred scene edits from the simulation side.
//!
//! ```text
//! simulation thread                         render thread
//! SceneHandle::create_ghost_geometry() ──>  channel  ──> Scene::apply_commands()
//!        (id reserved now)                                 (at transform sync)
//! ```
//!
//! The simulation side never touches the scene directly. Ids are reserved
//! when the command is issued, so callers can record them immediately.

use crossbeam_channel::Sender;
use glam::{Mat4, Vec3};

use super::geometry::{GeometryId, GeometryIdAllocator};

/// A queued scene edit.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneCommand {
    /// Insert a ghost entry.
    CreateGhost(GeometryId),
    /// Insert an entry drawing `mesh`.
    CreateMesh {
        /// Reserved id.
        id: GeometryId,
        /// Mesh key.
        mesh: String,
        /// Local transform.
        model: Mat4,
    },
    /// Replace the local transform.
    SetModelTransform(GeometryId, Mat4),
    /// Replace the world transform.
    SetWorldTransform(GeometryId, Mat4),
    /// Remove an entry.
    Destroy(GeometryId),
    /// Resize the camera viewport.
    SetViewport {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
    /// Move the camera.
    LookAt {
        /// Eye position.
        eye: Vec3,
        /// Point looked at.
        target: Vec3,
    },
}

/// Cloneable handle for queueing [`SceneCommand`]s.
#[derive(Clone, Debug)]
pub struct SceneHandle {
    tx: Sender<SceneCommand>,
    ids: GeometryIdAllocator,
}

impl SceneHandle {
    pub(crate) fn new(tx: Sender<SceneCommand>, ids: GeometryIdAllocator) -> Self {
        Self { tx, ids }
    }

    /// Queues a raw command.
    pub fn send(&self, command: SceneCommand) {
        if self.tx.send(command).is_err() {
            tracing::warn!("scene dropped, command discarded");
        }
    }

    /// Reserves an id and queues a ghost entry for it.
    pub fn create_ghost_geometry(&self) -> GeometryId {
        let id = self.ids.allocate();
        self.send(SceneCommand::CreateGhost(id));
        id
    }

    /// Reserves an id and queues an entry drawing `mesh`. An unknown mesh
    /// is reported when the command is applied; the id then names a ghost.
    pub fn create_mesh_geometry(&self, mesh: &str, model: Mat4) -> GeometryId {
        let id = self.ids.allocate();
        self.send(SceneCommand::CreateMesh {
            id,
            mesh: mesh.to_owned(),
            model,
        });
        id
    }

    /// Queues a local transform change.
    pub fn set_model_transform(&self, id: GeometryId, model: Mat4) {
        self.send(SceneCommand::SetModelTransform(id, model));
    }

    /// Queues a world transform change. Physics-driven entries are
    /// overwritten by transform sync in the same frame.
    pub fn set_world_transform(&self, id: GeometryId, world: Mat4) {
        self.send(SceneCommand::SetWorldTransform(id, world));
    }

    /// Queues removal of an entry.
    pub fn destroy_geometry(&self, id: GeometryId) {
        self.send(SceneCommand::Destroy(id));
    }

    /// Queues a viewport resize.
    pub fn set_viewport(&self, width: u32, height: u32) {
        self.send(SceneCommand::SetViewport { width, height });
    }

    /// Queues a camera move.
    pub fn look_at(&self, eye: Vec3, target: Vec3) {
        self.send(SceneCommand::LookAt { eye, target });
    }
}
