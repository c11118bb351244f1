//! # TANDEM Rendering
//!
//! Scene state, frustum culling and batch building. No GPU calls: a
//! [`Renderer`] receives the culled batches.
//!
//! ## Frame Flow
//!
//! ```text
//! SceneHandle ──commands──> Scene::apply_commands()      (transform sync)
//!                           Scene::set_geometry_world_transform()
//!                                     │
//!                           Scene::build_batches()        (render)
//!                             camera ─> FrustumCuller ─> per-mesh InstanceBatch
//!                                     │
//!                           Renderer::draw()              (draw)
//! ```

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod culling;
pub mod error;
pub mod renderer;
pub mod scene;
pub mod server;

pub use culling::{Aabb, CullMode, Frustum, FrustumCuller, Plane};
pub use error::{SceneError, SceneResult};
pub use renderer::{DrawStats, HeadlessRenderer, Renderer};
pub use scene::{
    BatchStats, Camera, GeometryId, GeometryIdAllocator, InstanceBatch, InstanceData, Mesh, Scene,
    SceneCommand, SceneHandle,
};
pub use server::GraphicsServer;
