//! # Server Contract
//!
//! Every subsystem that takes part in the frame loop (console, GUI, input,
//! physics, graphics, script) implements [`Server`]. The runtime drives a
//! fixed, ordered list of heterogeneous servers through this one contract
//! without special-casing any of them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::bus::{MessageBus, MessageReceiver, MessageSender, ReceiverId, SharedReceiver, Supervisor};
use crate::error::{CoreError, CoreResult};

/// Lifecycle contract for subsystems.
///
/// Message handling comes from the [`MessageReceiver`] supertrait; its
/// default ignores every message.
pub trait Server: MessageReceiver {
    /// Stable name used for logging and error reports.
    fn name(&self) -> &'static str;

    /// One-time setup. Called after the server is registered with the bus.
    ///
    /// # Errors
    ///
    /// Initialization failures are fatal to the runtime.
    fn init(&mut self, _ctx: &ServerContext) -> CoreResult<()> {
        Ok(())
    }

    /// Advances the subsystem by `dt` seconds.
    ///
    /// # Errors
    ///
    /// Any error terminates the frame loop.
    fn process(&mut self, _dt: f32) -> CoreResult<()> {
        Ok(())
    }
}

/// Cooperative termination flag.
///
/// Registered as the runtime's bus [`Supervisor`]; the loop checks it at the
/// top of every iteration.
#[derive(Clone, Debug, Default)]
pub struct QuitSignal {
    flag: Arc<AtomicBool>,
}

impl QuitSignal {
    /// Creates an unset signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag.
    #[inline]
    pub fn request(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns whether termination was requested.
    #[inline]
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

impl Supervisor for QuitSignal {
    fn on_quit(&self) {
        self.request();
    }
}

/// Back-reference to the owning application, handed to every server.
#[derive(Clone, Debug)]
pub struct AppContext {
    quit: QuitSignal,
}

impl AppContext {
    /// Creates a context around the application's quit signal.
    #[must_use]
    pub fn new(quit: QuitSignal) -> Self {
        Self { quit }
    }

    /// The application's quit signal.
    #[must_use]
    pub fn quit_signal(&self) -> &QuitSignal {
        &self.quit
    }
}

/// What a server receives at `init`.
#[derive(Clone)]
pub struct ServerContext {
    sender: MessageSender,
    app: AppContext,
    receiver_id: ReceiverId,
}

impl ServerContext {
    /// Handle for posting to the bus.
    #[must_use]
    pub fn sender(&self) -> &MessageSender {
        &self.sender
    }

    /// The owning application.
    #[must_use]
    pub fn app(&self) -> &AppContext {
        &self.app
    }

    /// The id the bus assigned to this server.
    #[must_use]
    pub fn receiver_id(&self) -> ReceiverId {
        self.receiver_id
    }
}

/// A server as the runtime holds it: shared with the bus, initialized once.
pub struct ServerSlot {
    name: &'static str,
    server: Arc<Mutex<dyn Server>>,
    receiver: SharedReceiver,
    receiver_id: Option<ReceiverId>,
}

impl ServerSlot {
    /// Wraps a server handle. The caller may keep `server` for typed access.
    pub fn new<S: Server + 'static>(server: Arc<Mutex<S>>) -> Self {
        let name = server.lock().name();
        let receiver: SharedReceiver = server.clone();
        Self {
            name,
            server,
            receiver,
            receiver_id: None,
        }
    }

    /// The server's name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether [`init`](Self::init) has completed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.receiver_id.is_some()
    }

    /// Registers the server with `bus` and runs its `init`.
    ///
    /// # Errors
    ///
    /// [`CoreError::AlreadyInitialized`] on a second call, or whatever the
    /// server's `init` returns.
    pub fn init(&mut self, bus: &MessageBus, app: &AppContext) -> CoreResult<ReceiverId> {
        if self.receiver_id.is_some() {
            return Err(CoreError::AlreadyInitialized(self.name));
        }

        let receiver_id = bus.register(Arc::clone(&self.receiver));
        let ctx = ServerContext {
            sender: bus.sender(),
            app: app.clone(),
            receiver_id,
        };
        self.server.lock().init(&ctx)?;
        self.receiver_id = Some(receiver_id);

        tracing::debug!(server = self.name, receiver_id, "server initialized");
        Ok(receiver_id)
    }

    /// Runs the server's `process`.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotInitialized`] before `init`, otherwise the server's error.
    pub fn process(&self, dt: f32) -> CoreResult<()> {
        if self.receiver_id.is_none() {
            return Err(CoreError::NotInitialized(self.name));
        }
        self.server.lock().process(dt)
    }
}

impl std::fmt::Debug for ServerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSlot")
            .field("name", &self.name)
            .field("receiver_id", &self.receiver_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[derive(Default)]
    struct Counter {
        processed: f32,
        messages: usize,
        sender: Option<MessageSender>,
    }

    impl MessageReceiver for Counter {
        fn on_message(&mut self, message: &Message) -> CoreResult<()> {
            match message {
                Message::ToggleOverlay => self.messages += 1,
                _ => {}
            }
            Ok(())
        }
    }

    impl Server for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        fn init(&mut self, ctx: &ServerContext) -> CoreResult<()> {
            self.sender = Some(ctx.sender().clone());
            Ok(())
        }

        fn process(&mut self, dt: f32) -> CoreResult<()> {
            self.processed += dt;
            Ok(())
        }
    }

    #[test]
    fn test_slot_init_registers_once() {
        let bus = MessageBus::new();
        let app = AppContext::new(QuitSignal::new());
        let server = Arc::new(Mutex::new(Counter::default()));
        let mut slot = ServerSlot::new(Arc::clone(&server));

        assert_eq!(slot.name(), "counter");
        assert!(matches!(slot.process(0.1), Err(CoreError::NotInitialized("counter"))));

        assert_eq!(slot.init(&bus, &app).ok(), Some(0));
        assert!(slot.is_initialized());
        assert!(matches!(
            slot.init(&bus, &app),
            Err(CoreError::AlreadyInitialized("counter"))
        ));
        assert_eq!(bus.receiver_count(), 1);
        assert!(server.lock().sender.is_some());
    }

    #[test]
    fn test_slot_process_and_messages() {
        let bus = MessageBus::new();
        let app = AppContext::new(QuitSignal::new());
        let server = Arc::new(Mutex::new(Counter::default()));
        let mut slot = ServerSlot::new(Arc::clone(&server));
        slot.init(&bus, &app).expect("init");

        slot.process(0.5).expect("process");
        bus.post(Message::ToggleOverlay);
        bus.post(Message::KeyPressed(crate::Key::Tab));
        bus.notify();

        let server = server.lock();
        assert!((server.processed - 0.5).abs() < f32::EPSILON);
        assert_eq!(server.messages, 1);
    }

    #[test]
    fn test_quit_signal_as_supervisor() {
        let bus = MessageBus::new();
        let quit = QuitSignal::new();
        bus.supervise(Arc::new(quit.clone()));
        assert!(!quit.is_requested());

        bus.sender().quit();
        assert!(quit.is_requested());
    }
}
