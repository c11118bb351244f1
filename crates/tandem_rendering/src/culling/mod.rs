//! Culling systems.
//!
//! Frustum culling decides, per mesh instance and per frame, whether its
//! world matrix goes into the batch handed to the renderer.

mod frustum;

pub use frustum::{Aabb, CullMode, Frustum, FrustumCuller, Plane};
