//! Rapier-backed rigid-body solver.
//!
//! Everything solver-specific lives here. The dynamics world only sees
//! [`BodyHandle`]s, glam vectors and single fixed steps.

use glam::{Mat4, Quat, Vec3};
use rapier3d::prelude::*;

use crate::shape::CollisionShape;

/// Solver-side body handle.
pub(crate) type BodyHandle = RigidBodyHandle;

pub(crate) struct Solver {
    gravity: Vector<Real>,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    query_pipeline: QueryPipeline,
}

impl Solver {
    pub(crate) fn new(gravity: Vec3, fixed_dt: f32) -> Self {
        let mut params = IntegrationParameters::default();
        params.dt = fixed_dt;

        Self {
            gravity: to_vector(gravity),
            params,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
        }
    }

    /// Advances the simulation by exactly one fixed step.
    pub(crate) fn step(&mut self) {
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    pub(crate) fn gravity(&self) -> Vec3 {
        to_vec3(&self.gravity)
    }

    pub(crate) fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = to_vector(gravity);
    }

    /// Inserts a body at `position` with identity rotation. Zero mass is static.
    pub(crate) fn insert(&mut self, shape: &CollisionShape, position: Vec3, mass: f32) -> BodyHandle {
        let builder = if mass > 0.0 {
            RigidBodyBuilder::dynamic()
        } else {
            RigidBodyBuilder::fixed()
        };
        let handle = self.bodies.insert(builder.translation(to_vector(position)).build());

        let mut collider = shape.collider_builder();
        if mass > 0.0 {
            collider = collider.mass(mass);
        }
        self.colliders
            .insert_with_parent(collider.build(), handle, &mut self.bodies);
        handle
    }

    pub(crate) fn remove(&mut self, handle: BodyHandle) -> bool {
        self.bodies
            .remove(
                handle,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some()
    }

    pub(crate) fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub(crate) fn linear_velocity(&self, handle: BodyHandle) -> Option<Vec3> {
        self.bodies.get(handle).map(|b| to_vec3(b.linvel()))
    }

    pub(crate) fn angular_velocity(&self, handle: BodyHandle) -> Option<Vec3> {
        self.bodies.get(handle).map(|b| to_vec3(b.angvel()))
    }

    /// Writes the velocity and wakes the body: a sleeping body ignores
    /// velocity writes.
    pub(crate) fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec3) -> bool {
        match self.bodies.get_mut(handle) {
            Some(body) => {
                body.wake_up(true);
                body.set_linvel(to_vector(velocity), true);
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_angular_velocity(&mut self, handle: BodyHandle, velocity: Vec3) -> bool {
        match self.bodies.get_mut(handle) {
            Some(body) => {
                body.wake_up(true);
                body.set_angvel(to_vector(velocity), true);
                true
            }
            None => false,
        }
    }

    /// Sets velocities without touching the sleep state.
    pub(crate) fn restore_velocities(&mut self, handle: BodyHandle, linear: Vec3, angular: Vec3) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_linvel(to_vector(linear), false);
            body.set_angvel(to_vector(angular), false);
        }
    }

    /// Locks every axis whose factor is exactly zero.
    pub(crate) fn set_axis_locks(&mut self, handle: BodyHandle, linear: Vec3, angular: Vec3) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_enabled_translations(linear.x != 0.0, linear.y != 0.0, linear.z != 0.0, true);
            body.set_enabled_rotations(angular.x != 0.0, angular.y != 0.0, angular.z != 0.0, true);
        }
    }

    pub(crate) fn is_sleeping(&self, handle: BodyHandle) -> Option<bool> {
        self.bodies.get(handle).map(RigidBody::is_sleeping)
    }

    pub(crate) fn is_dynamic(&self, handle: BodyHandle) -> Option<bool> {
        self.bodies.get(handle).map(RigidBody::is_dynamic)
    }

    /// World transform of the body's centre of mass.
    ///
    /// Every collider is attached without an offset and all shapes are
    /// symmetric, so the centre of mass is the body origin.
    pub(crate) fn center_of_mass_transform(&self, handle: BodyHandle) -> Option<Mat4> {
        let iso = self.bodies.get(handle)?.position();
        let q = iso.rotation.coords;
        Some(Mat4::from_rotation_translation(
            Quat::from_xyzw(q.x, q.y, q.z, q.w),
            to_vec3(&iso.translation.vector),
        ))
    }
}

#[inline]
fn to_vector(v: Vec3) -> Vector<Real> {
    vector![v.x, v.y, v.z]
}

#[inline]
fn to_vec3(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}
