//! # Application Hooks
//!
//! The only two places game code enters the frame loop:
//!
//! - [`Application::load`] once, after every server is initialized, with
//!   direct access to the scene, the dynamics world and the entity registry.
//! - [`Application::update`] every frame, first in the simulation phase,
//!   before the bus is drained. In dual-threaded mode this runs on the
//!   simulation worker, so the scene is reached through a [`SceneHandle`].

use glam::{Mat4, Vec3};
use parking_lot::Mutex;
use tandem_core::{EntityId, EntityRegistry, MessageSender};
use tandem_physics::{CollisionShape, DynamicsWorld, ImpostorId, PhysicsServer};
use tandem_rendering::{Aabb, Camera, GeometryId, Scene, SceneHandle};

use crate::error::RuntimeResult;
use crate::servers::{Behaviour, ScriptServer};

/// Game-specific content and logic.
pub trait Application: Send {
    /// One-time content setup.
    ///
    /// # Errors
    ///
    /// Fatal: the runtime tears down and `execute` returns the error.
    fn load(&mut self, ctx: &mut LoadContext<'_>) -> RuntimeResult<()>;

    /// Per-frame hook. `time` is the frame's wall time.
    ///
    /// # Errors
    ///
    /// Fatal: the runtime tears down and `execute` returns the error.
    fn update(&mut self, _ctx: &mut UpdateContext<'_>, _dt: f32, _time: f32) -> RuntimeResult<()> {
        Ok(())
    }
}

/// An application with no content.
#[derive(Debug, Default)]
pub struct EmptyApplication;

impl Application for EmptyApplication {
    fn load(&mut self, _ctx: &mut LoadContext<'_>) -> RuntimeResult<()> {
        Ok(())
    }
}

// ============================================================================
// Load
// ============================================================================

/// Everything [`Application::load`] may touch.
pub struct LoadContext<'a> {
    pub(crate) scene: &'a mut Scene,
    pub(crate) world: &'a mut DynamicsWorld,
    pub(crate) entities: &'a mut EntityRegistry,
    pub(crate) script: &'a mut ScriptServer,
    pub(crate) sender: &'a MessageSender,
}

impl LoadContext<'_> {
    /// Registers a mesh by key with its local bounds.
    ///
    /// # Errors
    ///
    /// Duplicate keys and invalid bounds.
    pub fn register_mesh(&mut self, key: &str, bounds: Aabb) -> RuntimeResult<()> {
        Ok(self.scene.register_mesh(key, bounds)?)
    }

    /// Spawns an entity drawn with `mesh` and simulated as `shape` at
    /// `position`. A `mass` of zero makes it static.
    ///
    /// # Errors
    ///
    /// Unknown mesh, invalid mass or shape. Nothing is created on error.
    pub fn spawn_body(
        &mut self,
        mesh: &str,
        shape: CollisionShape,
        position: Vec3,
        mass: f32,
    ) -> RuntimeResult<EntityId> {
        let geometry = self.scene.create_mesh_geometry(mesh, Mat4::IDENTITY)?;
        let impostor = match self.world.create_impostor(shape, position, mass) {
            Ok(id) => id,
            Err(err) => {
                self.scene.destroy_geometry(geometry);
                return Err(err.into());
            }
        };
        if let Some(pose) = self.world.impostor_transform(impostor) {
            self.scene.set_geometry_world_transform(geometry, pose);
        }
        Ok(self.entities.spawn_with(geometry.raw(), impostor.raw()))
    }

    /// Spawns a drawn entity with no physics. Its world transform stays
    /// whatever is set explicitly.
    ///
    /// # Errors
    ///
    /// Unknown mesh.
    pub fn spawn_static_geometry(&mut self, mesh: &str, world: Mat4) -> RuntimeResult<EntityId> {
        let geometry = self.scene.create_mesh_geometry(mesh, Mat4::IDENTITY)?;
        self.scene.set_geometry_world_transform(geometry, world);
        let eid = self.entities.spawn();
        self.entities.attach_graphics(eid, geometry.raw());
        Ok(eid)
    }

    /// Spawns an entity with a transform slot and nothing to draw.
    pub fn spawn_ghost(&mut self) -> EntityId {
        let geometry = self.scene.create_ghost_geometry();
        let eid = self.entities.spawn();
        self.entities.attach_graphics(eid, geometry.raw());
        eid
    }

    /// Attaches a behaviour to the script server.
    pub fn add_behaviour(&mut self, behaviour: impl Behaviour + 'static) {
        self.script.add_behaviour(behaviour);
    }

    /// The scene camera.
    pub fn camera_mut(&mut self) -> &mut Camera {
        self.scene.camera_mut()
    }

    /// Direct scene access.
    pub fn scene(&mut self) -> &mut Scene {
        self.scene
    }

    /// Direct dynamics world access.
    pub fn world(&mut self) -> &mut DynamicsWorld {
        self.world
    }

    /// The entity registry.
    pub fn entities(&mut self) -> &mut EntityRegistry {
        self.entities
    }

    /// Handle for posting to the bus.
    #[must_use]
    pub fn sender(&self) -> &MessageSender {
        self.sender
    }
}

// ============================================================================
// Update
// ============================================================================

/// Everything [`Application::update`] may touch.
pub struct UpdateContext<'a> {
    pub(crate) scene: &'a SceneHandle,
    pub(crate) physics: &'a Mutex<PhysicsServer>,
    pub(crate) entities: &'a mut EntityRegistry,
    pub(crate) sender: &'a MessageSender,
}

impl UpdateContext<'_> {
    /// Queues scene edits. They land at this frame's transform sync.
    #[must_use]
    pub fn scene(&self) -> &SceneHandle {
        self.scene
    }

    /// Runs `f` with the dynamics world locked.
    pub fn with_world<R>(&self, f: impl FnOnce(&mut DynamicsWorld) -> R) -> R {
        f(self.physics.lock().world_mut())
    }

    /// The entity registry.
    pub fn entities(&mut self) -> &mut EntityRegistry {
        self.entities
    }

    /// Handle for posting to the bus.
    #[must_use]
    pub fn sender(&self) -> &MessageSender {
        self.sender
    }

    /// Spawns a physics-driven entity mid-run. The geometry appears at
    /// this frame's sync; an unknown mesh degrades to a ghost there.
    ///
    /// # Errors
    ///
    /// Invalid mass or shape.
    pub fn spawn_body(
        &mut self,
        mesh: &str,
        shape: CollisionShape,
        position: Vec3,
        mass: f32,
    ) -> RuntimeResult<EntityId> {
        let impostor = self.with_world(|world| world.create_impostor(shape, position, mass))?;
        let geometry = self.scene.create_mesh_geometry(mesh, Mat4::IDENTITY);
        Ok(self.entities.spawn_with(geometry.raw(), impostor.raw()))
    }

    /// Removes an entity with its impostor and geometry. Returns `false`
    /// for an unknown entity.
    pub fn despawn(&mut self, eid: EntityId) -> bool {
        let Some(record) = self.entities.get(eid) else {
            return false;
        };
        if record.has_physics() {
            self.with_world(|world| world.destroy_impostor(ImpostorId::from_raw(record.physics_id)));
        }
        if record.has_graphics() {
            self.scene.destroy_geometry(GeometryId::from_raw(record.graphics_id));
        }
        self.entities.despawn(eid)
    }
}
