//! # Console Server
//!
//! Text commands, typed at the keyboard or posted as
//! [`Message::ConsoleCommand`].
//!
//! | command            | effect                                  |
//! |--------------------|-----------------------------------------|
//! | `quit`             | request quit                            |
//! | `echo <text>`      | append `<text>` to the history          |
//! | `stats`            | append the bus message count            |
//! | `gravity <x y z>`  | post a physics gravity change           |
//! | `overlay`          | toggle the GUI overlay                  |
//!
//! The grave key opens the console; while open, character keys edit the
//! line and Enter submits it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::Vec3;
use tandem_core::{CoreResult, Key, Message, MessageReceiver, MessageSender, Server, ServerContext};
use tandem_physics::PhysicsCommand;

/// Server interpreting console commands.
#[derive(Debug)]
pub struct ConsoleServer {
    history: VecDeque<String>,
    capacity: usize,
    line: String,
    open: bool,
    messages_seen: Arc<AtomicU64>,
    sender: Option<MessageSender>,
}

impl ConsoleServer {
    /// Creates a console keeping at most `capacity` history lines.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            line: String::new(),
            open: false,
            messages_seen: Arc::new(AtomicU64::new(0)),
            sender: None,
        }
    }

    /// Counter of broadcast messages. The runtime increments it from the
    /// bus's message-sent hook.
    #[must_use]
    pub fn message_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.messages_seen)
    }

    /// History, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    /// Whether the console is accepting keystrokes.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    fn push_history(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(line);
    }

    /// Runs one command line.
    pub fn execute(&mut self, line: &str) {
        let line = line.trim();
        let (command, args) = line.split_once(' ').unwrap_or((line, ""));
        tracing::debug!(command, args, "console command");

        match command {
            "" => {}
            "quit" => {
                if let Some(sender) = &self.sender {
                    sender.quit();
                }
            }
            "echo" => self.push_history(args.to_owned()),
            "stats" => {
                let seen = self.messages_seen.load(Ordering::Relaxed);
                self.push_history(format!("messages: {seen}"));
            }
            "gravity" => match parse_vec3(args) {
                Some(gravity) => self.post(PhysicsCommand::SetGravity(gravity).into_message()),
                None => self.push_history(format!("usage: gravity <x> <y> <z>, got `{args}`")),
            },
            "overlay" => self.post(Message::ToggleOverlay),
            other => {
                tracing::warn!(command = other, "unknown console command");
                self.push_history(format!("unknown command: {other}"));
            }
        }
    }

    fn post(&self, message: Message) {
        if let Some(sender) = &self.sender {
            sender.send(message);
        }
    }

    fn on_key(&mut self, key: Key) {
        match (self.open, key) {
            (_, Key::Grave) => {
                self.open = !self.open;
                self.line.clear();
            }
            (true, Key::Enter) => {
                let line = std::mem::take(&mut self.line);
                self.execute(&line);
            }
            (true, Key::Space) => self.line.push(' '),
            (true, Key::Char(c)) => self.line.push(c),
            _ => {}
        }
    }
}

fn parse_vec3(text: &str) -> Option<Vec3> {
    let mut parts = text.split_whitespace().map(str::parse::<f32>);
    let v = Vec3::new(parts.next()?.ok()?, parts.next()?.ok()?, parts.next()?.ok()?);
    parts.next().is_none().then_some(v)
}

impl MessageReceiver for ConsoleServer {
    fn receiver_name(&self) -> &str {
        "console"
    }

    fn on_message(&mut self, message: &Message) -> CoreResult<()> {
        match message {
            Message::ConsoleCommand(line) => self.execute(line),
            Message::KeyPressed(key) => self.on_key(*key),
            _ => {}
        }
        Ok(())
    }
}

impl Server for ConsoleServer {
    fn name(&self) -> &'static str {
        "console"
    }

    fn init(&mut self, ctx: &ServerContext) -> CoreResult<()> {
        self.sender = Some(ctx.sender().clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tandem_core::{AppContext, MessageBus, QuitSignal, ServerSlot};

    fn console_on_bus(capacity: usize) -> (MessageBus, QuitSignal, Arc<Mutex<ConsoleServer>>) {
        let bus = MessageBus::new();
        let quit = QuitSignal::new();
        bus.supervise(Arc::new(quit.clone()));
        let console = Arc::new(Mutex::new(ConsoleServer::new(capacity)));
        ServerSlot::new(Arc::clone(&console))
            .init(&bus, &AppContext::new(quit.clone()))
            .unwrap();
        (bus, quit, console)
    }

    #[test]
    fn test_quit_command() {
        let (bus, quit, _console) = console_on_bus(4);
        bus.post(Message::ConsoleCommand("quit".into()));
        assert!(!quit.is_requested());
        bus.notify();
        assert!(quit.is_requested());
    }

    #[test]
    fn test_history_is_bounded() {
        let (bus, _quit, console) = console_on_bus(2);
        for word in ["one", "two", "three"] {
            bus.post(Message::ConsoleCommand(format!("echo {word}")));
        }
        bus.notify();
        let history: Vec<_> = console.lock().history().map(str::to_owned).collect();
        assert_eq!(history, vec!["two", "three"]);
    }

    #[test]
    fn test_gravity_posts_physics_command() {
        let (bus, _quit, console) = console_on_bus(4);
        console.lock().execute("gravity 0 -1.5 0");
        assert_eq!(bus.pending(), 1);

        console.lock().execute("gravity up");
        assert_eq!(bus.pending(), 1);
        assert!(console.lock().history().any(|l| l.starts_with("usage")));
    }

    #[test]
    fn test_typed_line() {
        let (bus, _quit, console) = console_on_bus(4);
        for key in [
            Key::Grave,
            Key::Char('e'),
            Key::Char('c'),
            Key::Char('h'),
            Key::Char('o'),
            Key::Space,
            Key::Char('h'),
            Key::Char('i'),
            Key::Enter,
        ] {
            bus.post(Message::KeyPressed(key));
        }
        bus.notify();
        let console = console.lock();
        assert!(console.is_open());
        assert_eq!(console.history().last(), Some("hi"));
    }

    #[test]
    fn test_unknown_command_recorded() {
        let mut console = ConsoleServer::new(4);
        console.execute("frobnicate now");
        assert_eq!(console.history().next(), Some("unknown command: frobnicate"));
    }

    #[test]
    fn test_parse_vec3() {
        assert_eq!(parse_vec3("1 2 3"), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(parse_vec3("1 2"), None);
        assert_eq!(parse_vec3("1 2 3 4"), None);
        assert_eq!(parse_vec3("a b c"), None);
    }
}
