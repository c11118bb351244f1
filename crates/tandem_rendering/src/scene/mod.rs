//! # Scene
//!
//! The geometry table, the mesh registry and the camera.
//!
//! ```text
//! meshes:      "crate" ─ instances [3, 7]      "ground" ─ instances [4]
//!                           │   │                               │
//! geometries:  1 (ghost)  3 ┘   7 ──────────────  4 ────────────┘
//!              model, world, mesh?
//! ```
//!
//! Every lookup by [`GeometryId`] returns `Option`/`bool`. A mesh instance
//! list may briefly name an id that no longer exists; batch building skips
//! it.

mod batch;
mod camera;
mod command;
mod geometry;

use std::collections::HashMap;

use crossbeam_channel::{unbounded, Receiver};
use glam::Mat4;

pub use batch::{BatchStats, InstanceBatch, InstanceData};
pub use camera::Camera;
pub use command::{SceneCommand, SceneHandle};
pub use geometry::{GeometryId, GeometryIdAllocator, Mesh};

use crate::culling::{Aabb, CullMode, FrustumCuller};
use crate::error::{SceneError, SceneResult};
use geometry::Geometry;

/// Owner of every geometry entry.
pub struct Scene {
    geometries: HashMap<GeometryId, Geometry>,
    meshes: Vec<Mesh>,
    mesh_index: HashMap<String, usize>,
    camera: Camera,
    culler: FrustumCuller,
    ids: GeometryIdAllocator,
    handle: SceneHandle,
    commands: Receiver<SceneCommand>,
    last_stats: BatchStats,
}

impl Scene {
    /// Creates an empty scene using `mode` for instance culling.
    #[must_use]
    pub fn new(mode: CullMode) -> Self {
        let (tx, rx) = unbounded();
        let ids = GeometryIdAllocator::new();
        Self {
            geometries: HashMap::new(),
            meshes: Vec::new(),
            mesh_index: HashMap::new(),
            camera: Camera::default(),
            culler: FrustumCuller::new(mode),
            handle: SceneHandle::new(tx, ids.clone()),
            ids,
            commands: rx,
            last_stats: BatchStats::default(),
        }
    }

    /// A handle for queueing edits from another thread.
    #[must_use]
    pub fn handle(&self) -> SceneHandle {
        self.handle.clone()
    }

    // ========================================================================
    // Meshes
    // ========================================================================

    /// Registers a mesh with its mesh-space bounds.
    ///
    /// # Errors
    ///
    /// [`SceneError::DuplicateMesh`] if the key is taken,
    /// [`SceneError::InvalidBounds`] for inverted or non-finite bounds.
    pub fn register_mesh(&mut self, key: &str, bounds: Aabb) -> SceneResult<()> {
        if self.mesh_index.contains_key(key) {
            return Err(SceneError::DuplicateMesh(key.to_owned()));
        }
        if !bounds.is_valid() {
            return Err(SceneError::InvalidBounds(key.to_owned()));
        }
        self.mesh_index.insert(key.to_owned(), self.meshes.len());
        self.meshes.push(Mesh::new(key.to_owned(), bounds));
        tracing::debug!(mesh = key, "mesh registered");
        Ok(())
    }

    /// Looks up a mesh.
    #[must_use]
    pub fn mesh(&self, key: &str) -> Option<&Mesh> {
        self.mesh_index.get(key).map(|&i| &self.meshes[i])
    }

    /// All meshes, in registration order.
    #[must_use]
    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    // ========================================================================
    // Geometry
    // ========================================================================

    /// Creates an entry with no mesh: a transform slot only.
    pub fn create_ghost_geometry(&mut self) -> GeometryId {
        let id = self.ids.allocate();
        self.geometries.insert(id, Geometry::ghost());
        id
    }

    /// Creates an entry drawing `mesh` and adds it to the mesh's instances.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownMesh`] if `mesh` is not registered. No id is
    /// consumed.
    pub fn create_mesh_geometry(&mut self, mesh: &str, model: Mat4) -> SceneResult<GeometryId> {
        if !self.mesh_index.contains_key(mesh) {
            return Err(SceneError::UnknownMesh(mesh.to_owned()));
        }
        let id = self.ids.allocate();
        self.insert_mesh_geometry(id, mesh, model)?;
        Ok(id)
    }

    fn insert_mesh_geometry(&mut self, id: GeometryId, mesh: &str, model: Mat4) -> SceneResult<()> {
        let &index = self
            .mesh_index
            .get(mesh)
            .ok_or_else(|| SceneError::UnknownMesh(mesh.to_owned()))?;
        self.meshes[index].add_instance(id);
        self.geometries.insert(id, Geometry::with_mesh(mesh, model));
        Ok(())
    }

    /// Removes an entry and drops it from its mesh's instance list.
    /// Returns `false` for an unknown id.
    pub fn destroy_geometry(&mut self, id: GeometryId) -> bool {
        let Some(geometry) = self.geometries.remove(&id) else {
            return false;
        };
        if let Some(&index) = geometry.mesh.as_ref().and_then(|m| self.mesh_index.get(m)) {
            self.meshes[index].remove_instance(id);
        }
        true
    }

    /// Whether `id` names a live entry.
    #[must_use]
    pub fn contains(&self, id: GeometryId) -> bool {
        self.geometries.contains_key(&id)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    /// Whether the scene has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    /// Mesh key of an entry; `Some(None)` for a ghost.
    #[must_use]
    pub fn geometry_mesh(&self, id: GeometryId) -> Option<Option<&str>> {
        self.geometries.get(&id).map(|g| g.mesh.as_deref())
    }

    /// Local transform of an entry.
    #[must_use]
    pub fn geometry_model_transform(&self, id: GeometryId) -> Option<Mat4> {
        self.geometries.get(&id).map(|g| g.model)
    }

    /// Replaces the local transform. Returns `false` for an unknown id.
    pub fn set_geometry_model_transform(&mut self, id: GeometryId, model: Mat4) -> bool {
        match self.geometries.get_mut(&id) {
            Some(g) => {
                g.model = model;
                true
            }
            None => false,
        }
    }

    /// World transform of an entry.
    #[must_use]
    pub fn geometry_world_transform(&self, id: GeometryId) -> Option<Mat4> {
        self.geometries.get(&id).map(|g| g.world)
    }

    /// Replaces the world transform. Returns `false` for an unknown id.
    pub fn set_geometry_world_transform(&mut self, id: GeometryId, world: Mat4) -> bool {
        match self.geometries.get_mut(&id) {
            Some(g) => {
                g.world = world;
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // Camera and culling
    // ========================================================================

    /// The camera.
    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// The camera, mutably.
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// The culling test in use.
    #[must_use]
    pub fn cull_mode(&self) -> CullMode {
        self.culler.mode()
    }

    /// Changes the culling test.
    pub fn set_cull_mode(&mut self, mode: CullMode) {
        self.culler.set_mode(mode);
    }

    // ========================================================================
    // Frame operations
    // ========================================================================

    /// Applies every queued [`SceneCommand`]. Returns how many ran.
    pub fn apply_commands(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, command: SceneCommand) {
        match command {
            SceneCommand::CreateGhost(id) => {
                self.geometries.insert(id, Geometry::ghost());
            }
            SceneCommand::CreateMesh { id, mesh, model } => {
                if let Err(err) = self.insert_mesh_geometry(id, &mesh, model) {
                    tracing::warn!(%id, error = %err, "mesh geometry created as ghost");
                    let mut ghost = Geometry::ghost();
                    ghost.model = model;
                    self.geometries.insert(id, ghost);
                }
            }
            SceneCommand::SetModelTransform(id, model) => {
                if !self.set_geometry_model_transform(id, model) {
                    tracing::debug!(%id, "model transform for unknown geometry");
                }
            }
            SceneCommand::SetWorldTransform(id, world) => {
                if !self.set_geometry_world_transform(id, world) {
                    tracing::debug!(%id, "world transform for unknown geometry");
                }
            }
            SceneCommand::Destroy(id) => {
                self.destroy_geometry(id);
            }
            SceneCommand::SetViewport { width, height } => {
                self.camera.set_viewport(width, height);
            }
            SceneCommand::LookAt { eye, target } => {
                self.camera.eye = eye;
                self.camera.target = target;
            }
        }
    }

    /// Culls every mesh instance against the camera frustum and returns
    /// one batch per mesh with visible instances.
    ///
    /// Reads world transforms; run it after transform sync.
    pub fn build_batches(&mut self) -> Vec<InstanceBatch> {
        self.culler.update(&self.camera.view_projection());

        let mut stats = BatchStats::default();
        let mut batches = Vec::with_capacity(self.meshes.len());

        for mesh in &self.meshes {
            let mut instances = Vec::with_capacity(mesh.instances().len());
            for id in mesh.instances() {
                let Some(geometry) = self.geometries.get(id) else {
                    stats.stale += 1;
                    continue;
                };
                let draw = geometry.draw_matrix();
                if self.culler.test_bounds(mesh.bounds(), &draw) {
                    instances.push(InstanceData::from_matrix(&draw));
                } else {
                    stats.culled += 1;
                }
            }
            if !instances.is_empty() {
                stats.visible += instances.len();
                batches.push(InstanceBatch {
                    mesh: mesh.key().to_owned(),
                    instances,
                });
            }
        }

        stats.batches = batches.len();
        self.last_stats = stats;
        batches
    }

    /// Counters from the last [`build_batches`](Self::build_batches).
    #[must_use]
    pub fn last_batch_stats(&self) -> BatchStats {
        self.last_stats
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(CullMode::default())
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("geometries", &self.geometries.len())
            .field("meshes", &self.meshes.len())
            .field("camera", &self.camera)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn scene_with_crate() -> Scene {
        let mut scene = Scene::default();
        scene
            .register_mesh("crate", Aabb::from_half_extents(Vec3::splat(0.5)))
            .unwrap();
        scene
    }

    #[test]
    fn test_ghost_and_mesh_geometry() {
        let mut scene = scene_with_crate();
        let ghost = scene.create_ghost_geometry();
        let boxed = scene.create_mesh_geometry("crate", Mat4::IDENTITY).unwrap();

        assert_ne!(ghost, boxed);
        assert_eq!(scene.geometry_mesh(ghost), Some(None));
        assert_eq!(scene.geometry_mesh(boxed), Some(Some("crate")));
        assert_eq!(scene.mesh("crate").unwrap().instances(), &[boxed]);
        assert_eq!(
            scene.create_mesh_geometry("barrel", Mat4::IDENTITY),
            Err(SceneError::UnknownMesh("barrel".into()))
        );
    }

    #[test]
    fn test_duplicate_and_invalid_meshes() {
        let mut scene = scene_with_crate();
        assert!(matches!(
            scene.register_mesh("crate", Aabb::default()),
            Err(SceneError::DuplicateMesh(_))
        ));
        assert!(matches!(
            scene.register_mesh("bad", Aabb::new(Vec3::ONE, Vec3::ZERO)),
            Err(SceneError::InvalidBounds(_))
        ));
    }

    #[test]
    fn test_unknown_id_accessors() {
        let mut scene = scene_with_crate();
        let ghost = GeometryId::from_raw(42);
        assert!(scene.geometry_world_transform(ghost).is_none());
        assert!(scene.geometry_model_transform(ghost).is_none());
        assert!(!scene.set_geometry_world_transform(ghost, Mat4::IDENTITY));
        assert!(!scene.set_geometry_model_transform(ghost, Mat4::IDENTITY));
        assert!(!scene.destroy_geometry(ghost));
        assert!(scene.is_empty());
    }

    #[test]
    fn test_destroy_removes_instance() {
        let mut scene = scene_with_crate();
        let a = scene.create_mesh_geometry("crate", Mat4::IDENTITY).unwrap();
        let b = scene.create_mesh_geometry("crate", Mat4::IDENTITY).unwrap();
        assert!(scene.destroy_geometry(a));
        assert_eq!(scene.mesh("crate").unwrap().instances(), &[b]);
        assert_eq!(scene.len(), 1);

        let c = scene.create_ghost_geometry();
        assert!(c.raw() > b.raw());
    }

    #[test]
    fn test_batches_cull_offscreen_instances() {
        let mut scene = scene_with_crate();
        let visible = scene.create_mesh_geometry("crate", Mat4::IDENTITY).unwrap();
        let hidden = scene.create_mesh_geometry("crate", Mat4::IDENTITY).unwrap();
        scene.set_geometry_world_transform(hidden, Mat4::from_translation(Vec3::Z * 100.0));

        let batches = scene.build_batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].instances.len(), 1);
        assert_eq!(
            batches[0].instances[0].matrix(),
            scene.geometry_world_transform(visible).unwrap()
        );
        let stats = scene.last_batch_stats();
        assert_eq!((stats.visible, stats.culled, stats.batches), (1, 1, 1));
    }

    #[test]
    fn test_draw_matrix_combines_world_and_model() {
        let mut scene = scene_with_crate();
        let model = Mat4::from_scale(Vec3::splat(2.0));
        let id = scene.create_mesh_geometry("crate", model).unwrap();
        let world = Mat4::from_translation(Vec3::new(1.0, 2.0, 0.0));
        scene.set_geometry_world_transform(id, world);

        let batches = scene.build_batches();
        assert_eq!(batches[0].instances[0].matrix(), world * model);
    }

    #[test]
    fn test_commands_apply_in_order() {
        let mut scene = scene_with_crate();
        let handle = scene.handle();

        let ghost = handle.create_ghost_geometry();
        let boxed = handle.create_mesh_geometry("crate", Mat4::IDENTITY);
        let orphan = handle.create_mesh_geometry("barrel", Mat4::IDENTITY);
        let moved = Mat4::from_translation(Vec3::Y);
        handle.set_world_transform(boxed, moved);
        handle.destroy_geometry(ghost);
        handle.set_viewport(1000, 500);

        assert!(!scene.contains(boxed));
        assert_eq!(scene.apply_commands(), 6);

        assert!(!scene.contains(ghost));
        assert_eq!(scene.geometry_world_transform(boxed), Some(moved));
        assert_eq!(scene.geometry_mesh(orphan), Some(None));
        assert!((scene.camera().aspect - 2.0).abs() < f32::EPSILON);

        // Ids reserved by the handle and by the scene never collide.
        let direct = scene.create_ghost_geometry();
        assert!(direct.raw() > orphan.raw());
    }

    #[test]
    fn test_stale_instance_skipped() {
        let mut scene = scene_with_crate();
        let handle = scene.handle();
        let id = handle.create_mesh_geometry("crate", Mat4::IDENTITY);
        scene.apply_commands();
        // Remove the entry behind the mesh's back.
        scene.geometries.remove(&id);

        assert!(scene.build_batches().is_empty());
        assert_eq!(scene.last_batch_stats().stale, 1);
    }
}
