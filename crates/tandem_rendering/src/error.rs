//! # Scene Error Types

use tandem_core::CoreError;
use thiserror::Error;

/// Errors raised by the scene and renderers.
///
/// Unknown geometry ids are not errors; see the accessors on
/// [`Scene`](crate::Scene).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    /// No mesh is registered under this key.
    #[error("unknown mesh: {0}")]
    UnknownMesh(String),

    /// A mesh is already registered under this key.
    #[error("mesh already registered: {0}")]
    DuplicateMesh(String),

    /// Mesh bounds must be finite with `min <= max`.
    #[error("invalid bounds for mesh {0}")]
    InvalidBounds(String),

    /// The renderer failed to draw a frame.
    #[error("renderer failed: {0}")]
    Renderer(String),
}

impl From<SceneError> for CoreError {
    fn from(err: SceneError) -> Self {
        CoreError::subsystem("graphics", err.to_string())
    }
}

/// Result type for scene operations.
pub type SceneResult<T> = Result<T, SceneError>;
