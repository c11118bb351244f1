//! # Physics Error Types

use tandem_core::CoreError;
use thiserror::Error;

/// Errors raised by the dynamics world.
///
/// Unknown impostor ids are not errors; see the accessors on
/// [`DynamicsWorld`](crate::DynamicsWorld).
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum PhysicsError {
    /// Mass must be finite and non-negative. Zero means static.
    #[error("invalid mass: {0}")]
    InvalidMass(f32),

    /// Step durations must be finite and non-negative.
    #[error("invalid time step: {0}")]
    InvalidTimeStep(f32),

    /// Collision shape dimensions must be finite and positive.
    #[error("invalid collision shape dimension: {0}")]
    InvalidShape(f32),
}

impl From<PhysicsError> for CoreError {
    fn from(err: PhysicsError) -> Self {
        CoreError::subsystem("physics", err.to_string())
    }
}

/// Result type for physics operations.
pub type PhysicsResult<T> = Result<T, PhysicsError>;
