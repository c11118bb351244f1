//! # Input Server
//!
//! Polls an [`InputSource`] once per frame and turns what it reports into
//! bus messages and shared key state.
//!
//! ```text
//! InputSource::poll ──> KeyPressed / KeyReleased   ──> bus (next notify)
//!                   ──> Resized                     ──> bus (next notify)
//!                   ──> CloseRequested / quit key   ──> supervisors (now)
//!                   ──> KeyboardState               ──> read by later servers this frame
//! ```

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;
use tandem_core::{CoreResult, Key, Message, MessageReceiver, MessageSender, Server, ServerContext};

/// Something a windowing or device backend reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    /// A key went down.
    KeyPressed(Key),
    /// A key went up.
    KeyReleased(Key),
    /// The window framebuffer changed size.
    Resized {
        /// New width in pixels.
        width: u32,
        /// New height in pixels.
        height: u32,
    },
    /// The user asked to close the window.
    CloseRequested,
}

/// Backend the input server polls each frame.
pub trait InputSource: Send {
    /// Appends every event since the previous poll to `events`.
    fn poll(&mut self, events: &mut Vec<InputEvent>);
}

impl<T: InputSource + ?Sized> InputSource for Box<T> {
    fn poll(&mut self, events: &mut Vec<InputEvent>) {
        (**self).poll(events);
    }
}

/// A source with no device attached.
#[derive(Debug, Default)]
pub struct NullInput;

impl InputSource for NullInput {
    fn poll(&mut self, _events: &mut Vec<InputEvent>) {}
}

/// Plays back a fixed list of events, each on a given poll number.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    script: VecDeque<(u64, InputEvent)>,
    polls: u64,
}

impl ScriptedInput {
    /// Creates a source from `(poll, event)` pairs. Pairs must be sorted
    /// by poll number; poll numbers count from 0.
    #[must_use]
    pub fn new(script: impl IntoIterator<Item = (u64, InputEvent)>) -> Self {
        Self {
            script: script.into_iter().collect(),
            polls: 0,
        }
    }

    /// Events not yet played.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self, events: &mut Vec<InputEvent>) {
        while let Some(&(at, event)) = self.script.front() {
            if at > self.polls {
                break;
            }
            events.push(event);
            self.script.pop_front();
        }
        self.polls += 1;
    }
}

/// Keys currently held, shared with servers that run after input.
#[derive(Clone, Debug, Default)]
pub struct KeyboardState {
    held: Arc<RwLock<HashSet<Key>>>,
}

impl KeyboardState {
    /// Whether `key` is held.
    #[must_use]
    pub fn is_down(&self, key: Key) -> bool {
        self.held.read().contains(&key)
    }

    /// Number of keys held.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.held.read().len()
    }

    fn press(&self, key: Key) -> bool {
        self.held.write().insert(key)
    }

    fn release(&self, key: Key) -> bool {
        self.held.write().remove(&key)
    }
}

/// Server draining an [`InputSource`].
pub struct InputServer {
    source: Box<dyn InputSource>,
    keyboard: KeyboardState,
    quit_key: Key,
    sender: Option<MessageSender>,
    events: Vec<InputEvent>,
}

impl InputServer {
    /// Creates a server polling `source`. Pressing `quit_key` requests quit.
    pub fn new(source: impl InputSource + 'static, quit_key: Key) -> Self {
        Self {
            source: Box::new(source),
            keyboard: KeyboardState::default(),
            quit_key,
            sender: None,
            events: Vec::new(),
        }
    }

    /// Shared key state.
    #[must_use]
    pub fn keyboard(&self) -> KeyboardState {
        self.keyboard.clone()
    }

    fn dispatch(&self, sender: &MessageSender, event: InputEvent) {
        match event {
            InputEvent::KeyPressed(key) => {
                // Auto-repeat reports a held key again; forward the first only.
                if self.keyboard.press(key) {
                    sender.send(Message::KeyPressed(key));
                }
                if key == self.quit_key {
                    tracing::info!(?key, "quit key pressed");
                    sender.quit();
                }
            }
            InputEvent::KeyReleased(key) => {
                if self.keyboard.release(key) {
                    sender.send(Message::KeyReleased(key));
                }
            }
            InputEvent::Resized { width, height } => {
                sender.send(Message::WindowResized { width, height });
            }
            InputEvent::CloseRequested => {
                tracing::info!("window close requested");
                sender.quit();
            }
        }
    }
}

impl std::fmt::Debug for InputServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputServer")
            .field("keyboard", &self.keyboard)
            .field("quit_key", &self.quit_key)
            .finish_non_exhaustive()
    }
}

impl MessageReceiver for InputServer {
    fn receiver_name(&self) -> &str {
        "input"
    }
}

impl Server for InputServer {
    fn name(&self) -> &'static str {
        "input"
    }

    fn init(&mut self, ctx: &ServerContext) -> CoreResult<()> {
        self.sender = Some(ctx.sender().clone());
        Ok(())
    }

    fn process(&mut self, _dt: f32) -> CoreResult<()> {
        let Some(sender) = self.sender.clone() else {
            return Err(tandem_core::CoreError::NotInitialized("input"));
        };
        let mut events = std::mem::take(&mut self.events);
        self.source.poll(&mut events);
        for event in events.drain(..) {
            self.dispatch(&sender, event);
        }
        self.events = events;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tandem_core::{AppContext, MessageBus, MessageKind, QuitSignal, ServerSlot};

    #[derive(Default)]
    struct Kinds(Vec<MessageKind>);

    impl MessageReceiver for Kinds {
        fn on_message(&mut self, message: &Message) -> CoreResult<()> {
            self.0.push(message.kind());
            Ok(())
        }
    }

    fn setup(source: ScriptedInput) -> (MessageBus, QuitSignal, ServerSlot, Arc<Mutex<InputServer>>, Arc<Mutex<Kinds>>) {
        let bus = MessageBus::new();
        let quit = QuitSignal::new();
        bus.supervise(Arc::new(quit.clone()));
        let kinds = Arc::new(Mutex::new(Kinds::default()));
        bus.register(kinds.clone());

        let input = Arc::new(Mutex::new(InputServer::new(source, Key::Escape)));
        let mut slot = ServerSlot::new(Arc::clone(&input));
        slot.init(&bus, &AppContext::new(quit.clone())).unwrap();
        (bus, quit, slot, input, kinds)
    }

    #[test]
    fn test_scripted_events_become_messages() {
        let script = ScriptedInput::new([
            (0, InputEvent::KeyPressed(Key::Space)),
            (0, InputEvent::KeyPressed(Key::Space)),
            (1, InputEvent::Resized { width: 640, height: 480 }),
            (2, InputEvent::KeyReleased(Key::Space)),
        ]);
        let (bus, quit, slot, input, kinds) = setup(script);
        let keyboard = input.lock().keyboard();

        slot.process(0.016).unwrap();
        assert!(keyboard.is_down(Key::Space));
        slot.process(0.016).unwrap();
        slot.process(0.016).unwrap();
        assert!(!keyboard.is_down(Key::Space));

        bus.notify();
        assert_eq!(
            kinds.lock().0,
            vec![
                MessageKind::KeyPressed,
                MessageKind::WindowResized,
                MessageKind::KeyReleased
            ]
        );
        assert!(!quit.is_requested());
    }

    #[test]
    fn test_quit_key_and_close_request() {
        let (bus, quit, slot, _input, _kinds) =
            setup(ScriptedInput::new([(1, InputEvent::KeyPressed(Key::Escape))]));
        slot.process(0.016).unwrap();
        assert!(!quit.is_requested());
        slot.process(0.016).unwrap();
        assert!(quit.is_requested());
        assert_eq!(bus.pending(), 1);

        let (bus, quit, slot, _input, _kinds) =
            setup(ScriptedInput::new([(0, InputEvent::CloseRequested)]));
        slot.process(0.016).unwrap();
        assert!(quit.is_requested());
        assert_eq!(bus.pending(), 0);
    }

    #[test]
    fn test_scripted_source_drains_in_order() {
        let mut source = ScriptedInput::new([
            (0, InputEvent::CloseRequested),
            (3, InputEvent::KeyPressed(Key::Tab)),
        ]);
        let mut events = Vec::new();
        source.poll(&mut events);
        assert_eq!(events, vec![InputEvent::CloseRequested]);
        for _ in 0..3 {
            source.poll(&mut events);
        }
        assert_eq!(events.len(), 2);
        assert_eq!(source.remaining(), 0);
    }
}
