//! # TANDEM Physics
//!
//! A fixed-timestep dynamics world over an opaque rigid-body solver.
//!
//! ```text
//! frame dt ──> accumulator ──> N × solver step(FIXED_TIME_STEP) ──> residual
//! ```
//!
//! Physics always advances in uniform [`FIXED_TIME_STEP`] increments, zero
//! or more times per rendered frame. Bodies are addressed by
//! [`ImpostorId`]s; every lookup on an absent id returns `None`/`false`.

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod server;
pub mod shape;
mod solver;
pub mod world;

pub use error::{PhysicsError, PhysicsResult};
pub use server::{PhysicsCommand, PhysicsServer, PHYSICS_COMMAND_KIND};
pub use shape::CollisionShape;
pub use world::{DynamicsWorld, ImpostorId, StepPhase, DEFAULT_GRAVITY, FIXED_TIME_STEP};
