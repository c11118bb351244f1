//! # Runtime Configuration
//!
//! Loaded once at startup from TOML. Every field is optional in the file;
//! missing fields take their [`Default`] value.
//!
//! ```toml
//! scheduling = "dual_threaded"
//! gravity = [0.0, -9.81, 0.0]
//! max_frames = 600
//! max_frame_delta = 0.25
//! target_fps = 60
//! cull_mode = "plane_overlap"
//! log_filter = "info,tandem=debug"
//! console_history = 64
//! quit_key = "Escape"
//! ```

use std::path::Path;
use std::time::Duration;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tandem_core::Key;
use tandem_physics::DEFAULT_GRAVITY;
use tandem_rendering::CullMode;

use crate::error::{RuntimeError, RuntimeResult};
use crate::logging::DEFAULT_FILTER;

/// How simulation and rendering share the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingMode {
    /// process, sync, render, draw on the calling thread.
    SingleThreaded,
    /// process on the worker while render and draw run on the calling
    /// thread; sync after the join. Rendering lags one frame.
    DualThreaded,
}

impl Default for SchedulingMode {
    fn default() -> Self {
        if cfg!(feature = "dual-threaded") {
            Self::DualThreaded
        } else {
            Self::SingleThreaded
        }
    }
}

/// Runtime settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Frame scheduling mode.
    pub scheduling: SchedulingMode,
    /// Initial world gravity.
    pub gravity: Vec3,
    /// Stop after this many frames. `None` runs until quit.
    pub max_frames: Option<u64>,
    /// Clamp on frame delta, in seconds. `None` leaves it unbounded.
    pub max_frame_delta: Option<f32>,
    /// Sleep out the rest of each frame to hold this rate. `None` runs flat out.
    pub target_fps: Option<u32>,
    /// Instance culling test.
    pub cull_mode: CullMode,
    /// `tracing` filter directive.
    pub log_filter: String,
    /// Lines kept by the console.
    pub console_history: usize,
    /// Key that requests quit.
    pub quit_key: Key,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            scheduling: SchedulingMode::default(),
            gravity: DEFAULT_GRAVITY,
            max_frames: None,
            max_frame_delta: None,
            target_fps: None,
            cull_mode: CullMode::default(),
            log_filter: DEFAULT_FILTER.to_owned(),
            console_history: 64,
            quit_key: Key::Escape,
        }
    }
}

impl RuntimeConfig {
    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::ConfigParse`] for malformed TOML or wrong field types.
    pub fn from_toml_str(text: &str) -> RuntimeResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::ConfigRead`] if the file cannot be read, otherwise
    /// as [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> RuntimeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RuntimeError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// The delta clamp as a duration. Non-positive or non-finite values
    /// are ignored.
    #[must_use]
    pub fn max_frame_delta(&self) -> Option<Duration> {
        self.max_frame_delta
            .filter(|s| s.is_finite() && *s > 0.0)
            .map(Duration::from_secs_f32)
    }

    /// Frame budget implied by `target_fps`.
    #[must_use]
    pub fn frame_budget(&self) -> Option<Duration> {
        self.target_fps
            .filter(|&fps| fps > 0)
            .map(|fps| Duration::from_secs(1) / fps)
    }
}
