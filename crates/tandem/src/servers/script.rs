//! # Script Server
//!
//! Hosts [`Behaviour`]s: compiled game logic attached to the frame loop.
//! Behaviours run after input, so key state read through
//! [`ScriptContext::keys`] already reflects this frame's events.

use tandem_core::{CoreError, CoreResult, Message, MessageReceiver, MessageSender, Server, ServerContext};

use crate::servers::input::KeyboardState;

/// What a behaviour sees during `start` and `update`.
#[derive(Debug)]
pub struct ScriptContext<'a> {
    /// Handle for posting to the bus.
    pub sender: &'a MessageSender,
    /// Keys currently held.
    pub keys: &'a KeyboardState,
    /// Seconds processed by the script server so far.
    pub elapsed: f32,
}

/// A unit of game logic driven by the script server.
pub trait Behaviour: Send {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Called once, at the behaviour's first update.
    ///
    /// # Errors
    ///
    /// Fatal to the frame loop.
    fn start(&mut self, _ctx: &ScriptContext<'_>) -> CoreResult<()> {
        Ok(())
    }

    /// Called every frame with the frame delta.
    ///
    /// # Errors
    ///
    /// Fatal to the frame loop.
    fn update(&mut self, ctx: &ScriptContext<'_>, dt: f32) -> CoreResult<()>;

    /// Called for every broadcast message.
    fn on_message(&mut self, _message: &Message) {}
}

struct Slot {
    behaviour: Box<dyn Behaviour>,
    started: bool,
}

/// Server updating every attached [`Behaviour`] in insertion order.
pub struct ScriptServer {
    behaviours: Vec<Slot>,
    keys: KeyboardState,
    sender: Option<MessageSender>,
    elapsed: f32,
}

impl ScriptServer {
    /// Creates a server whose behaviours read `keys`.
    #[must_use]
    pub fn new(keys: KeyboardState) -> Self {
        Self {
            behaviours: Vec::new(),
            keys,
            sender: None,
            elapsed: 0.0,
        }
    }

    /// Attaches a behaviour. It starts on the next process.
    pub fn add_behaviour(&mut self, behaviour: impl Behaviour + 'static) {
        tracing::debug!(behaviour = behaviour.name(), "behaviour attached");
        self.behaviours.push(Slot {
            behaviour: Box::new(behaviour),
            started: false,
        });
    }

    /// Number of attached behaviours.
    #[must_use]
    pub fn len(&self) -> usize {
        self.behaviours.len()
    }

    /// Whether no behaviour is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.behaviours.is_empty()
    }

    /// Seconds processed so far.
    #[must_use]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }
}

impl std::fmt::Debug for ScriptServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.behaviours.iter().map(|s| s.behaviour.name()).collect();
        f.debug_struct("ScriptServer")
            .field("behaviours", &names)
            .field("elapsed", &self.elapsed)
            .finish_non_exhaustive()
    }
}

impl MessageReceiver for ScriptServer {
    fn receiver_name(&self) -> &str {
        "script"
    }

    fn on_message(&mut self, message: &Message) -> CoreResult<()> {
        for slot in &mut self.behaviours {
            slot.behaviour.on_message(message);
        }
        Ok(())
    }
}

impl Server for ScriptServer {
    fn name(&self) -> &'static str {
        "script"
    }

    fn init(&mut self, ctx: &ServerContext) -> CoreResult<()> {
        self.sender = Some(ctx.sender().clone());
        Ok(())
    }

    fn process(&mut self, dt: f32) -> CoreResult<()> {
        let sender = self.sender.as_ref().ok_or(CoreError::NotInitialized("script"))?;
        self.elapsed += dt;
        let ctx = ScriptContext {
            sender,
            keys: &self.keys,
            elapsed: self.elapsed,
        };

        for slot in &mut self.behaviours {
            let behaviour = &mut slot.behaviour;
            if !slot.started {
                behaviour
                    .start(&ctx)
                    .map_err(|e| CoreError::subsystem("script", format!("{} start: {e}", behaviour.name())))?;
                slot.started = true;
            }
            behaviour
                .update(&ctx, dt)
                .map_err(|e| CoreError::subsystem("script", format!("{}: {e}", behaviour.name())))?;
        }
        Ok(())
    }
}
