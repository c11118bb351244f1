//! Collision shapes handed to the dynamics world by value.

use glam::Vec3;
use rapier3d::prelude::ColliderBuilder;
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, PhysicsResult};

/// A caller-constructed collision shape. Ownership moves into the world
/// when an impostor is created from it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum CollisionShape {
    /// Box given by its half extents.
    Cuboid {
        /// Half size along each axis.
        half_extents: Vec3,
    },
    /// Sphere.
    Ball {
        /// Radius.
        radius: f32,
    },
    /// Y-aligned capsule.
    Capsule {
        /// Half the distance between the two cap centres.
        half_height: f32,
        /// Cap radius.
        radius: f32,
    },
    /// Y-aligned cylinder.
    Cylinder {
        /// Half height.
        half_height: f32,
        /// Radius.
        radius: f32,
    },
}

impl CollisionShape {
    /// Box with the given half extents.
    #[must_use]
    pub const fn cuboid(half_extents: Vec3) -> Self {
        Self::Cuboid { half_extents }
    }

    /// Sphere with the given radius.
    #[must_use]
    pub const fn ball(radius: f32) -> Self {
        Self::Ball { radius }
    }

    fn dimensions(&self) -> [f32; 3] {
        match *self {
            Self::Cuboid { half_extents } => half_extents.to_array(),
            Self::Ball { radius } => [radius; 3],
            Self::Capsule {
                half_height,
                radius,
            }
            | Self::Cylinder {
                half_height,
                radius,
            } => [half_height, radius, radius],
        }
    }

    /// Checks every dimension is finite and positive.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidShape`] naming the first bad dimension.
    pub fn validate(&self) -> PhysicsResult<()> {
        match self.dimensions().into_iter().find(|d| !d.is_finite() || *d <= 0.0) {
            Some(bad) => Err(PhysicsError::InvalidShape(bad)),
            None => Ok(()),
        }
    }

    pub(crate) fn collider_builder(&self) -> ColliderBuilder {
        match *self {
            Self::Cuboid { half_extents: h } => ColliderBuilder::cuboid(h.x, h.y, h.z),
            Self::Ball { radius } => ColliderBuilder::ball(radius),
            Self::Capsule {
                half_height,
                radius,
            } => ColliderBuilder::capsule_y(half_height, radius),
            Self::Cylinder {
                half_height,
                radius,
            } => ColliderBuilder::cylinder(half_height, radius),
        }
    }
}
