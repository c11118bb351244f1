//! # Dynamics World
//!
//! Fixed-timestep stepper over the rigid-body solver.
//!
//! ```text
//!            step(dt)
//!   Idle ──────────────> Accumulating ──(acc >= FIXED)──> Stepping ─┐
//!    ^                        │  ^                                   │
//!    │                        │  └──────── acc -= FIXED ─────────────┘
//!    └──── acc < FIXED ───────┘
//! ```
//!
//! The accumulator is kept in `f64` so that any partition of the same total
//! time yields the same number of sub-steps. A sub-step taken within
//! epsilon of being due borrows that sliver from the next frame: the
//! residual is carried negative, never rounded up to zero.

use std::collections::HashMap;
use std::fmt;

use glam::{Mat4, Vec3};

use crate::error::{PhysicsError, PhysicsResult};
use crate::shape::CollisionShape;
use crate::solver::{BodyHandle, Solver};

/// Duration of one solver sub-step, in seconds.
pub const FIXED_TIME_STEP: f32 = 1.0 / 60.0;

/// Earth gravity along -Y.
pub const DEFAULT_GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);

/// Slack for summing many small `f32` deltas into whole sub-steps.
const ACCUMULATOR_EPSILON: f64 = 1e-6;

/// Handle to a rigid body owned by a [`DynamicsWorld`].
///
/// Assigned from 1 upward and never reused by the same world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ImpostorId(u64);

impl ImpostorId {
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

impl fmt::Display for ImpostorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "impostor#{}", self.0)
    }
}

/// Where the world is within a [`DynamicsWorld::step`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StepPhase {
    /// Between calls.
    #[default]
    Idle,
    /// Frame time added, deciding whether a sub-step is due.
    Accumulating,
    /// Inside a solver sub-step.
    Stepping,
}

#[derive(Debug)]
struct Impostor {
    body: BodyHandle,
    linear_factor: Vec3,
    angular_factor: Vec3,
}

impl Impostor {
    fn has_partial_factors(&self) -> bool {
        self.linear_factor != Vec3::ONE || self.angular_factor != Vec3::ONE
    }
}

/// The physics world: solver state plus the impostor table.
pub struct DynamicsWorld {
    solver: Solver,
    impostors: HashMap<ImpostorId, Impostor>,
    next_id: u64,
    accumulator: f64,
    phase: StepPhase,
    total_substeps: u64,
    last_substeps: u32,
}

impl DynamicsWorld {
    /// Creates an empty world with [`DEFAULT_GRAVITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_gravity(DEFAULT_GRAVITY)
    }

    /// Creates an empty world with the given gravity.
    #[must_use]
    pub fn with_gravity(gravity: Vec3) -> Self {
        Self {
            solver: Solver::new(gravity, FIXED_TIME_STEP),
            impostors: HashMap::new(),
            next_id: 1,
            accumulator: 0.0,
            phase: StepPhase::Idle,
            total_substeps: 0,
            last_substeps: 0,
        }
    }

    // ========================================================================
    // Stepping
    // ========================================================================

    /// Adds `dt` seconds to the accumulator and runs every whole
    /// [`FIXED_TIME_STEP`] it now contains. Returns the sub-step count.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidTimeStep`] for a negative or non-finite `dt`.
    /// The world is left untouched.
    pub fn step(&mut self, dt: f32) -> PhysicsResult<u32> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(PhysicsError::InvalidTimeStep(dt));
        }

        self.phase = StepPhase::Accumulating;
        self.accumulator += f64::from(dt);

        let fixed = f64::from(FIXED_TIME_STEP);
        let mut substeps = 0u32;
        while self.accumulator + ACCUMULATOR_EPSILON >= fixed {
            self.phase = StepPhase::Stepping;
            self.substep();
            self.accumulator -= fixed;
            substeps += 1;
            self.phase = StepPhase::Accumulating;
        }

        self.phase = StepPhase::Idle;
        self.last_substeps = substeps;
        self.total_substeps += u64::from(substeps);

        if substeps > 1 {
            tracing::trace!(substeps, dt, "physics caught up");
        }
        Ok(substeps)
    }

    fn substep(&mut self) {
        // Velocities before the step, for bodies whose factors scale the change.
        let scaled: Vec<(BodyHandle, Vec3, Vec3, Vec3, Vec3)> = self
            .impostors
            .values()
            .filter(|imp| imp.has_partial_factors())
            .filter_map(|imp| {
                let lin = self.solver.linear_velocity(imp.body)?;
                let ang = self.solver.angular_velocity(imp.body)?;
                Some((imp.body, lin, ang, imp.linear_factor, imp.angular_factor))
            })
            .collect();

        self.solver.step();

        for (body, lin0, ang0, lf, af) in scaled {
            let (Some(lin1), Some(ang1)) = (
                self.solver.linear_velocity(body),
                self.solver.angular_velocity(body),
            ) else {
                continue;
            };
            self.solver
                .restore_velocities(body, lin0 + (lin1 - lin0) * lf, ang0 + (ang1 - ang0) * af);
        }
    }

    /// Simulated time not yet consumed by a sub-step, in seconds.
    ///
    /// Reads as zero while the carried residual is within epsilon below it.
    #[inline]
    #[must_use]
    pub fn accumulator(&self) -> f64 {
        self.accumulator.max(0.0)
    }

    /// Current phase. Always [`StepPhase::Idle`] outside [`step`](Self::step).
    #[inline]
    #[must_use]
    pub fn phase(&self) -> StepPhase {
        self.phase
    }

    /// Sub-steps run since creation.
    #[inline]
    #[must_use]
    pub fn total_substeps(&self) -> u64 {
        self.total_substeps
    }

    /// Sub-steps run by the most recent [`step`](Self::step).
    #[inline]
    #[must_use]
    pub fn last_substeps(&self) -> u32 {
        self.last_substeps
    }

    /// Current gravity.
    #[must_use]
    pub fn gravity(&self) -> Vec3 {
        self.solver.gravity()
    }

    /// Replaces gravity from the next sub-step on.
    pub fn set_gravity(&mut self, gravity: Vec3) {
        tracing::debug!(?gravity, "gravity changed");
        self.solver.set_gravity(gravity);
    }

    // ========================================================================
    // Impostors
    // ========================================================================

    /// Creates a rigid body from `shape` at `position` with identity
    /// rotation. A `mass` of zero makes it static.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidMass`] for a negative or non-finite mass,
    /// [`PhysicsError::InvalidShape`] for a degenerate shape.
    pub fn create_impostor(
        &mut self,
        shape: CollisionShape,
        position: Vec3,
        mass: f32,
    ) -> PhysicsResult<ImpostorId> {
        if !mass.is_finite() || mass < 0.0 {
            return Err(PhysicsError::InvalidMass(mass));
        }
        shape.validate()?;

        let body = self.solver.insert(&shape, position, mass);
        let id = ImpostorId(self.next_id);
        self.next_id += 1;
        self.impostors.insert(
            id,
            Impostor {
                body,
                linear_factor: Vec3::ONE,
                angular_factor: Vec3::ONE,
            },
        );

        tracing::debug!(%id, ?position, mass, "impostor created");
        Ok(id)
    }

    /// Removes an impostor and its body. Returns `false` for an unknown id.
    pub fn destroy_impostor(&mut self, id: ImpostorId) -> bool {
        match self.impostors.remove(&id) {
            Some(imp) => self.solver.remove(imp.body),
            None => false,
        }
    }

    /// Whether `id` names a live impostor.
    #[must_use]
    pub fn contains(&self, id: ImpostorId) -> bool {
        self.impostors.contains_key(&id)
    }

    /// Number of live impostors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.impostors.len()
    }

    /// Whether the world has no impostors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.impostors.is_empty()
    }

    /// Number of bodies held by the solver.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.solver.body_count()
    }

    fn body(&self, id: ImpostorId) -> Option<BodyHandle> {
        self.impostors.get(&id).map(|imp| imp.body)
    }

    /// Linear velocity, or `None` for an unknown id.
    #[must_use]
    pub fn impostor_linear_velocity(&self, id: ImpostorId) -> Option<Vec3> {
        self.solver.linear_velocity(self.body(id)?)
    }

    /// Angular velocity, or `None` for an unknown id.
    #[must_use]
    pub fn impostor_angular_velocity(&self, id: ImpostorId) -> Option<Vec3> {
        self.solver.angular_velocity(self.body(id)?)
    }

    /// Wakes the body and sets its linear velocity. Returns `false` (and
    /// changes nothing) for an unknown id.
    pub fn set_impostor_linear_velocity(&mut self, id: ImpostorId, velocity: Vec3) -> bool {
        match self.body(id) {
            Some(body) => self.solver.set_linear_velocity(body, velocity),
            None => false,
        }
    }

    /// Wakes the body and sets its angular velocity. Returns `false` (and
    /// changes nothing) for an unknown id.
    pub fn set_impostor_angular_velocity(&mut self, id: ImpostorId, velocity: Vec3) -> bool {
        match self.body(id) {
            Some(body) => self.solver.set_angular_velocity(body, velocity),
            None => false,
        }
    }

    /// Per-axis scale on solver-applied linear velocity changes.
    #[must_use]
    pub fn impostor_linear_factor(&self, id: ImpostorId) -> Option<Vec3> {
        self.impostors.get(&id).map(|imp| imp.linear_factor)
    }

    /// Per-axis scale on solver-applied angular velocity changes.
    #[must_use]
    pub fn impostor_angular_factor(&self, id: ImpostorId) -> Option<Vec3> {
        self.impostors.get(&id).map(|imp| imp.angular_factor)
    }

    /// Sets the linear factor. A zero component locks that axis.
    pub fn set_impostor_linear_factor(&mut self, id: ImpostorId, factor: Vec3) -> bool {
        let Some(imp) = self.impostors.get_mut(&id) else {
            return false;
        };
        imp.linear_factor = factor;
        let (body, angular) = (imp.body, imp.angular_factor);
        self.solver.set_axis_locks(body, factor, angular);
        true
    }

    /// Sets the angular factor. A zero component locks that axis.
    pub fn set_impostor_angular_factor(&mut self, id: ImpostorId, factor: Vec3) -> bool {
        let Some(imp) = self.impostors.get_mut(&id) else {
            return false;
        };
        imp.angular_factor = factor;
        let (body, linear) = (imp.body, imp.linear_factor);
        self.solver.set_axis_locks(body, linear, factor);
        true
    }

    /// Halves horizontal (X and Z) linear velocity, keeping Y.
    ///
    /// Locomotion damping for character-style bodies.
    pub fn dampen_impostor(&mut self, id: ImpostorId) -> bool {
        let Some(body) = self.body(id) else {
            return false;
        };
        let (Some(lin), Some(ang)) = (
            self.solver.linear_velocity(body),
            self.solver.angular_velocity(body),
        ) else {
            return false;
        };
        self.solver
            .restore_velocities(body, lin * Vec3::new(0.5, 1.0, 0.5), ang);
        true
    }

    /// World transform of the impostor's centre of mass, or `None` for an
    /// unknown id.
    #[must_use]
    pub fn impostor_transform(&self, id: ImpostorId) -> Option<Mat4> {
        self.solver.center_of_mass_transform(self.body(id)?)
    }

    /// Whether the solver has put the body to sleep.
    #[must_use]
    pub fn is_impostor_sleeping(&self, id: ImpostorId) -> Option<bool> {
        self.solver.is_sleeping(self.body(id)?)
    }

    /// Whether the body is simulated (non-zero mass).
    #[must_use]
    pub fn is_impostor_dynamic(&self, id: ImpostorId) -> Option<bool> {
        self.solver.is_dynamic(self.body(id)?)
    }

    /// Live impostor ids, in no particular order.
    pub fn impostor_ids(&self) -> impl Iterator<Item = ImpostorId> + '_ {
        self.impostors.keys().copied()
    }
}

impl Default for DynamicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DynamicsWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicsWorld")
            .field("impostors", &self.impostors.len())
            .field("accumulator", &self.accumulator)
            .field("total_substeps", &self.total_substeps)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> CollisionShape {
        CollisionShape::cuboid(Vec3::splat(0.5))
    }

    fn height(world: &DynamicsWorld, id: ImpostorId) -> f32 {
        world.impostor_transform(id).unwrap().w_axis.y
    }

    #[test]
    fn test_falling_box() {
        let mut world = DynamicsWorld::new();
        let id = world
            .create_impostor(unit_box(), Vec3::new(0.0, 10.0, 0.0), 1.0)
            .unwrap();
        assert_ne!(id.raw(), 0);

        assert_eq!(world.step(FIXED_TIME_STEP).unwrap(), 1);
        assert!(world.accumulator() < 1e-6);
        assert!(height(&world, id) < 10.0);
        assert_eq!(world.phase(), StepPhase::Idle);
    }

    #[test]
    fn test_substep_count_independent_of_partition() {
        let mut whole = DynamicsWorld::new();
        let mut split = DynamicsWorld::new();

        whole.step(FIXED_TIME_STEP).unwrap();
        for _ in 0..10 {
            split.step(FIXED_TIME_STEP / 10.0).unwrap();
        }
        assert_eq!(whole.total_substeps(), 1);
        assert_eq!(split.total_substeps(), 1);

        let mut uneven = DynamicsWorld::new();
        for dt in [0.001, 0.03, 0.0023, 0.0167] {
            uneven.step(dt).unwrap();
        }
        assert_eq!(uneven.total_substeps(), 3);
    }

    #[test]
    fn test_residual_is_remainder() {
        let mut world = DynamicsWorld::new();
        assert_eq!(world.step(0.02).unwrap(), 1);
        let expected = 0.02 - f64::from(FIXED_TIME_STEP);
        assert!((world.accumulator() - expected).abs() < 1e-6);

        assert_eq!(world.step(0.0).unwrap(), 0);
        assert!((world.accumulator() - expected).abs() < 1e-6);

        assert_eq!(world.step(0.05).unwrap(), 3);
        assert_eq!(world.last_substeps(), 3);
        assert_eq!(world.total_substeps(), 4);
    }

    #[test]
    fn test_short_frames_never_gain_time() {
        let mut world = DynamicsWorld::new();
        let dt = FIXED_TIME_STEP - 5e-7;
        let mut supplied = 0.0f64;
        for _ in 0..30_000 {
            world.step(dt).unwrap();
            supplied += f64::from(dt);
        }

        let fixed = f64::from(FIXED_TIME_STEP);
        let whole = (supplied / fixed).floor();
        assert_eq!(world.total_substeps(), 29_999);
        assert_eq!(world.total_substeps() as f64, whole);
        let residual = supplied - whole * fixed;
        assert!((world.accumulator() - residual).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_step_rejected() {
        let mut world = DynamicsWorld::new();
        assert_eq!(world.step(-1.0), Err(PhysicsError::InvalidTimeStep(-1.0)));
        assert!(world.step(f32::NAN).is_err());
        assert_eq!(world.total_substeps(), 0);
        assert_eq!(world.accumulator(), 0.0);
    }

    #[test]
    fn test_ids_sequential_and_never_reused() {
        let mut world = DynamicsWorld::new();
        let a = world.create_impostor(unit_box(), Vec3::ZERO, 1.0).unwrap();
        let b = world.create_impostor(unit_box(), Vec3::X * 3.0, 1.0).unwrap();
        assert_eq!((a.raw(), b.raw()), (1, 2));

        assert!(world.destroy_impostor(a));
        assert!(!world.destroy_impostor(a));
        assert_eq!(world.body_count(), 1);

        let c = world.create_impostor(unit_box(), Vec3::ZERO, 1.0).unwrap();
        assert_eq!(c.raw(), 3);
        assert!(world.impostor_transform(a).is_none());
    }

    #[test]
    fn test_unknown_handle_is_harmless() {
        let mut world = DynamicsWorld::new();
        let id = world.create_impostor(unit_box(), Vec3::ZERO, 1.0).unwrap();
        let ghost = ImpostorId::from_raw(999);

        assert!(world.impostor_linear_velocity(ghost).is_none());
        assert!(world.impostor_angular_velocity(ghost).is_none());
        assert!(world.impostor_linear_factor(ghost).is_none());
        assert!(world.impostor_transform(ghost).is_none());
        assert!(!world.set_impostor_linear_velocity(ghost, Vec3::ONE));
        assert!(!world.set_impostor_angular_velocity(ghost, Vec3::ONE));
        assert!(!world.set_impostor_linear_factor(ghost, Vec3::ZERO));
        assert!(!world.dampen_impostor(ghost));

        assert_eq!(world.impostor_linear_velocity(id), Some(Vec3::ZERO));
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn test_rejects_bad_mass_and_shape() {
        let mut world = DynamicsWorld::new();
        assert_eq!(
            world.create_impostor(unit_box(), Vec3::ZERO, -1.0),
            Err(PhysicsError::InvalidMass(-1.0))
        );
        assert!(world
            .create_impostor(CollisionShape::ball(0.0), Vec3::ZERO, 1.0)
            .is_err());
        assert!(world.is_empty());
    }

    #[test]
    fn test_zero_mass_is_static() {
        let mut world = DynamicsWorld::new();
        let ground = world
            .create_impostor(unit_box(), Vec3::new(0.0, 10.0, 0.0), 0.0)
            .unwrap();
        for _ in 0..10 {
            world.step(FIXED_TIME_STEP).unwrap();
        }
        assert_eq!(world.is_impostor_dynamic(ground), Some(false));
        assert!((height(&world, ground) - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_velocity_write_and_dampen() {
        let mut world = DynamicsWorld::with_gravity(Vec3::ZERO);
        let id = world.create_impostor(unit_box(), Vec3::ZERO, 1.0).unwrap();

        assert!(world.set_impostor_linear_velocity(id, Vec3::new(4.0, 2.0, -8.0)));
        assert_eq!(world.is_impostor_sleeping(id), Some(false));
        assert!(world.dampen_impostor(id));
        assert_eq!(
            world.impostor_linear_velocity(id),
            Some(Vec3::new(2.0, 2.0, -4.0))
        );

        assert!(world.set_impostor_angular_velocity(id, Vec3::Y));
        assert_eq!(world.impostor_angular_velocity(id), Some(Vec3::Y));
    }

    #[test]
    fn test_zero_linear_factor_locks_axis() {
        let mut world = DynamicsWorld::new();
        let id = world
            .create_impostor(unit_box(), Vec3::new(0.0, 10.0, 0.0), 1.0)
            .unwrap();
        assert!(world.set_impostor_linear_factor(id, Vec3::new(1.0, 0.0, 1.0)));
        assert_eq!(world.impostor_linear_factor(id), Some(Vec3::new(1.0, 0.0, 1.0)));

        for _ in 0..30 {
            world.step(FIXED_TIME_STEP).unwrap();
        }
        assert!((height(&world, id) - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_gravity_round_trip() {
        let mut world = DynamicsWorld::new();
        assert_eq!(world.gravity(), DEFAULT_GRAVITY);
        world.set_gravity(Vec3::new(0.0, -1.62, 0.0));
        assert_eq!(world.gravity(), Vec3::new(0.0, -1.62, 0.0));
    }
}
