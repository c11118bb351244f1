//! Geometry entries, ids and meshes.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::Mat4;

use crate::culling::Aabb;

/// Identifier of a geometry entry in a [`Scene`](crate::Scene).
///
/// Never `0` and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct GeometryId(u64);

impl GeometryId {
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

impl fmt::Display for GeometryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "geometry#{}", self.0)
    }
}

/// Hands out geometry ids. Clones share the counter, so ids reserved on
/// the simulation side never collide with ids the scene assigns itself.
#[derive(Clone, Debug)]
pub struct GeometryIdAllocator {
    next: Arc<AtomicU64>,
}

impl GeometryIdAllocator {
    /// Starts a counter at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Reserves the next id.
    #[inline]
    pub fn allocate(&self) -> GeometryId {
        GeometryId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for GeometryIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// One transform slot in the scene.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Geometry {
    /// Author-time local transform.
    pub(crate) model: Mat4,
    /// Runtime placement, overwritten by transform sync for physics bodies.
    pub(crate) world: Mat4,
    /// Mesh drawn at this slot; `None` for ghosts.
    pub(crate) mesh: Option<String>,
}

impl Geometry {
    pub(crate) fn ghost() -> Self {
        Self {
            model: Mat4::IDENTITY,
            world: Mat4::IDENTITY,
            mesh: None,
        }
    }

    pub(crate) fn with_mesh(mesh: &str, model: Mat4) -> Self {
        Self {
            model,
            world: Mat4::IDENTITY,
            mesh: Some(mesh.to_owned()),
        }
    }

    /// The matrix an instance is drawn with.
    #[inline]
    pub(crate) fn draw_matrix(&self) -> Mat4 {
        self.world * self.model
    }
}

/// A drawable mesh and the geometry ids that instance it.
///
/// The instance list does not own the geometry entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    key: String,
    bounds: Aabb,
    instances: Vec<GeometryId>,
}

impl Mesh {
    pub(crate) fn new(key: String, bounds: Aabb) -> Self {
        Self {
            key,
            bounds,
            instances: Vec::new(),
        }
    }

    /// Registry key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Bounds in mesh space.
    #[must_use]
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Geometry ids drawing this mesh, in creation order.
    #[must_use]
    pub fn instances(&self) -> &[GeometryId] {
        &self.instances
    }

    pub(crate) fn add_instance(&mut self, id: GeometryId) {
        self.instances.push(id);
    }

    pub(crate) fn remove_instance(&mut self, id: GeometryId) {
        self.instances.retain(|&i| i != id);
    }
}
