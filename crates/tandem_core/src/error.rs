//! # Core Error Types
//!
//! Errors raised by the scheduling primitives and by server callbacks.
//!
//! Handle lookups (entities, impostors, geometry) never produce an error;
//! they return `Option`/`bool`. Errors are reserved for programmer mistakes
//! and for subsystems that cannot continue.

use thiserror::Error;

/// Errors that can occur in the core scheduling layer.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A server was initialized a second time.
    #[error("server `{0}` is already initialized")]
    AlreadyInitialized(&'static str),

    /// A server was used before `init`.
    #[error("server `{0}` is not initialized")]
    NotInitialized(&'static str),

    /// A subsystem reported a failure it cannot recover from.
    #[error("subsystem `{name}` failed: {reason}")]
    Subsystem {
        /// Name of the failing subsystem.
        name: &'static str,
        /// Human readable cause.
        reason: String,
    },

    /// The frame worker thread could not be started.
    #[error("failed to spawn frame worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    /// `fork` was called while a frame was already in flight.
    #[error("frame worker already has a frame in flight")]
    WorkerBusy,

    /// `join` was called with no frame in flight.
    #[error("frame worker has no frame in flight")]
    WorkerIdle,

    /// The worker thread exited (panicked) while owning the frame state.
    #[error("frame worker thread terminated unexpectedly")]
    WorkerLost,
}

impl CoreError {
    /// Shorthand for [`CoreError::Subsystem`].
    pub fn subsystem(name: &'static str, reason: impl Into<String>) -> Self {
        Self::Subsystem {
            name,
            reason: reason.into(),
        }
    }
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
