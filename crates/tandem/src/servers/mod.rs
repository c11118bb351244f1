//! Standard servers owned by the runtime.
//!
//! Physics and graphics servers live in their own crates; the rest live here.

pub mod console;
pub mod gui;
pub mod input;
pub mod script;

pub use console::ConsoleServer;
pub use gui::GuiServer;
pub use input::{InputEvent, InputServer, InputSource, KeyboardState, NullInput, ScriptedInput};
pub use script::{Behaviour, ScriptContext, ScriptServer};
