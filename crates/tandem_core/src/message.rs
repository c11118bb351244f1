//! # Messages
//!
//! The events servers exchange through the [`MessageBus`](crate::MessageBus).
//!
//! Messages are a sum type so that receivers can match exhaustively where
//! they care, and fall through with `_ => {}` for kinds they ignore. The
//! enum is `#[non_exhaustive]`: new kinds may be added without breaking
//! receivers that already ignore unknown messages.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Keyboard keys the input layer forwards to servers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Escape.
    Escape,
    /// Return / Enter.
    Enter,
    /// Space bar.
    Space,
    /// Tab.
    Tab,
    /// Backquote / tilde, conventionally the console key.
    Grave,
    /// Arrow up.
    Up,
    /// Arrow down.
    Down,
    /// Arrow left.
    Left,
    /// Arrow right.
    Right,
    /// A printable character key.
    Char(char),
    /// Function key `F1`..`F24`.
    Function(u8),
    /// Any other key, by backend scancode.
    Other(u32),
}

/// Application-defined message with an opaque payload.
#[derive(Clone)]
pub struct CustomMessage {
    /// Application-chosen discriminator.
    pub kind: u32,
    /// Opaque payload. Receivers downcast to the type they expect.
    pub payload: Arc<dyn Any + Send + Sync>,
}

impl CustomMessage {
    /// Creates a custom message carrying `payload`.
    pub fn new<T: Any + Send + Sync>(kind: u32, payload: T) -> Self {
        Self {
            kind,
            payload: Arc::new(payload),
        }
    }

    /// Creates a custom message without a payload.
    #[must_use]
    pub fn empty(kind: u32) -> Self {
        Self::new(kind, ())
    }

    /// Borrows the payload as `T`, if it has that type.
    #[must_use]
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl fmt::Debug for CustomMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomMessage")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// A message on the bus.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Message {
    /// Terminate the main loop. Routed to supervisors only, never queued.
    Quit,
    /// A key went down.
    KeyPressed(Key),
    /// A key went up.
    KeyReleased(Key),
    /// The window framebuffer changed size.
    WindowResized {
        /// New width in pixels.
        width: u32,
        /// New height in pixels.
        height: u32,
    },
    /// A line typed into (or injected into) the console.
    ConsoleCommand(String),
    /// Show or hide the debug overlay.
    ToggleOverlay,
    /// Application-defined message.
    Custom(CustomMessage),
}

impl Message {
    /// Returns the payload-free discriminant of this message.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Quit => MessageKind::Quit,
            Self::KeyPressed(_) => MessageKind::KeyPressed,
            Self::KeyReleased(_) => MessageKind::KeyReleased,
            Self::WindowResized { .. } => MessageKind::WindowResized,
            Self::ConsoleCommand(_) => MessageKind::ConsoleCommand,
            Self::ToggleOverlay => MessageKind::ToggleOverlay,
            Self::Custom(custom) => MessageKind::Custom(custom.kind),
        }
    }

    /// Returns `true` for [`Message::Quit`].
    #[inline]
    #[must_use]
    pub fn is_quit(&self) -> bool {
        matches!(self, Self::Quit)
    }
}

/// Discriminant of a [`Message`], used for logging and counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// [`Message::Quit`].
    Quit,
    /// [`Message::KeyPressed`].
    KeyPressed,
    /// [`Message::KeyReleased`].
    KeyReleased,
    /// [`Message::WindowResized`].
    WindowResized,
    /// [`Message::ConsoleCommand`].
    ConsoleCommand,
    /// [`Message::ToggleOverlay`].
    ToggleOverlay,
    /// [`Message::Custom`] with its application kind.
    Custom(u32),
}
