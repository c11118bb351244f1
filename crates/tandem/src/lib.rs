//! # TANDEM
//!
//! Frame scheduler tying the message bus, physics and rendering together.
//!
//! ```text
//!                       ┌──────────── Runtime ─────────────┐
//!                       │                                  │
//!   Application::load ─>│ console gui input physics        │
//!   Application::update │ graphics script  (Server slots)  │
//!                       │        │                         │
//!                       │  MessageBus ── QuitSignal        │
//!                       │        │                         │
//!                       │ DynamicsWorld ──sync──> Scene ───┼──> Renderer
//!                       └──────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use tandem::{EmptyApplication, Runtime, RuntimeConfig};
//!
//! let config = RuntimeConfig { max_frames: Some(60), ..RuntimeConfig::default() };
//! let mut runtime = Runtime::new(config, EmptyApplication);
//! runtime.execute().expect("frame loop failed");
//! ```

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod servers;

pub use app::{Application, EmptyApplication, LoadContext, UpdateContext};
pub use config::{RuntimeConfig, SchedulingMode};
pub use error::{RuntimeError, RuntimeResult};
pub use runtime::{
    sync_transforms, FrameStats, FrameStatsAccumulator, Runtime, RuntimeBuilder, RuntimeState,
    SyncStats, INIT_ORDER, PROCESS_ORDER,
};
pub use servers::{
    Behaviour, ConsoleServer, GuiServer, InputEvent, InputServer, InputSource, KeyboardState,
    NullInput, ScriptContext, ScriptServer, ScriptedInput,
};
