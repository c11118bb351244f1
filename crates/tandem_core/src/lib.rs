//! # TANDEM Core
//!
//! The primitives every subsystem of the engine is built on:
//!
//! - [`FrameDescriptor`] / [`FrameClock`]: one immutable value per loop iteration
//! - [`Message`] / [`MessageBus`]: broadcast mailbox between servers
//! - [`Server`]: the `init` / `process` / `on_message` lifecycle contract
//! - [`EntityRegistry`]: correlation records tying game objects to
//!   geometry entries and physics impostors
//! - [`FrameWorker`]: persistent fork-join worker used by dual-threaded frames
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  post   ┌──────────────┐ notify  ┌──────────────┐
//! │ Input server │───────> │  MessageBus  │───────> │ all servers  │
//! └──────────────┘         └──────┬───────┘         └──────────────┘
//!                                 │ Quit
//!                                 ▼
//!                          ┌──────────────┐
//!                          │ supervisors  │ (the runtime)
//!                          └──────────────┘
//! ```

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod bus;
pub mod ecs;
pub mod error;
pub mod frame;
pub mod message;
pub mod server;
pub mod sync;

pub use bus::{
    MessageBus, MessageReceiver, MessageSender, NotifyStats, ReceiverId, SharedReceiver,
    Supervisor,
};
pub use ecs::{EntityId, EntityRecord, EntityRegistry};
pub use error::{CoreError, CoreResult};
pub use frame::{FrameClock, FrameDescriptor};
pub use message::{CustomMessage, Key, Message, MessageKind};
pub use server::{AppContext, QuitSignal, Server, ServerContext, ServerSlot};
pub use sync::FrameWorker;
