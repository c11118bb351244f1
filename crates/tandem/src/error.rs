//! # Runtime Error Types

use std::path::PathBuf;

use tandem_core::CoreError;
use tandem_physics::PhysicsError;
use tandem_rendering::SceneError;
use thiserror::Error;

use crate::runtime::RuntimeState;

/// Errors surfaced by [`Runtime`](crate::Runtime) and its setup.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration text is not valid.
    #[error("invalid configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The log filter could not be parsed or a subscriber was already set.
    #[error("logging setup failed: {0}")]
    Logging(String),

    /// An operation was attempted in the wrong lifecycle state.
    #[error("runtime is {actual:?}, expected {expected:?}")]
    InvalidState {
        /// Required state.
        expected: RuntimeState,
        /// Actual state.
        actual: RuntimeState,
    },

    /// A server failed in `init` or `process`.
    #[error("server `{server}` failed: {source}")]
    Server {
        /// Failing server.
        server: &'static str,
        /// Its error.
        source: CoreError,
    },

    /// An application hook failed.
    #[error("application `{hook}` hook failed: {reason}")]
    Hook {
        /// `load` or `update`.
        hook: &'static str,
        /// Human readable cause.
        reason: String,
    },

    /// Scheduling primitive failure (worker thread, double init).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Physics failure.
    #[error(transparent)]
    Physics(#[from] PhysicsError),

    /// Scene or renderer failure.
    #[error(transparent)]
    Scene(#[from] SceneError),
}

impl RuntimeError {
    /// Shorthand for a failed application hook.
    pub fn hook(hook: &'static str, reason: impl Into<String>) -> Self {
        Self::Hook {
            hook,
            reason: reason.into(),
        }
    }
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
