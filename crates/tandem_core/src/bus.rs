//! # Message Bus
//!
//! Process-wide mailbox that lets servers exchange messages without holding
//! references to each other.
//!
//! ## Delivery model
//!
//! ```text
//! post()            ──> queue ──> notify() ──> every receiver, registration order
//! post_immediate()  ────────────────────────> every receiver, right now
//! Message::Quit     ────────────────────────> supervisors only (never queued)
//! ```
//!
//! - Broadcast, not point-to-point: each message reaches every registered receiver.
//! - FIFO: queued messages are delivered in post order.
//! - A receiver's error is logged and isolated; later receivers still get
//!   the message.
//! - Registering the same receiver twice delivers to it twice.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use crate::error::CoreResult;
use crate::message::Message;

/// Index of a receiver in registration order.
pub type ReceiverId = usize;

/// Anything that reacts to delivered messages.
pub trait MessageReceiver: Send {
    /// Name used in diagnostics.
    fn receiver_name(&self) -> &str {
        "receiver"
    }

    /// Reacts to a delivered message. Unknown kinds are ignored.
    ///
    /// # Errors
    ///
    /// A returned error is logged by the bus and does not stop delivery to
    /// other receivers.
    fn on_message(&mut self, _message: &Message) -> CoreResult<()> {
        Ok(())
    }
}

/// Shared handle to a receiver.
pub type SharedReceiver = Arc<Mutex<dyn MessageReceiver>>;

/// Privileged listener notified of [`Message::Quit`] out of band.
pub trait Supervisor: Send + Sync {
    /// Called once per posted quit message.
    fn on_quit(&self);
}

/// Callback fired after each queued message has been broadcast.
type MessageSentHook = Arc<dyn Fn(&Message) + Send + Sync>;

/// Counters returned by a delivery round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NotifyStats {
    /// Messages taken off the queue (or delivered immediately).
    pub messages: usize,
    /// Successful handler invocations.
    pub deliveries: usize,
    /// Handler invocations that returned an error.
    pub failures: usize,
    /// Receivers skipped because they were busy (re-entrant delivery).
    pub skipped: usize,
    /// Quit messages routed to supervisors.
    pub quits: usize,
}

impl NotifyStats {
    fn merge(&mut self, other: Self) {
        self.messages += other.messages;
        self.deliveries += other.deliveries;
        self.failures += other.failures;
        self.skipped += other.skipped;
        self.quits += other.quits;
    }
}

struct BusShared {
    receivers: RwLock<Vec<SharedReceiver>>,
    supervisors: RwLock<Vec<Arc<dyn Supervisor>>>,
    hooks: RwLock<Vec<MessageSentHook>>,
    queue_tx: Sender<Message>,
    queue_rx: Receiver<Message>,
}

impl BusShared {
    fn post(&self, message: Message) {
        if message.is_quit() {
            self.notify_supervisors();
            return;
        }
        // The receiving half lives in `self`, so the channel cannot be disconnected.
        let _ = self.queue_tx.send(message);
    }

    fn post_immediate(&self, message: &Message) -> NotifyStats {
        if message.is_quit() {
            self.notify_supervisors();
            return NotifyStats {
                messages: 1,
                quits: 1,
                ..NotifyStats::default()
            };
        }
        let mut stats = self.broadcast(message);
        stats.messages = 1;
        stats
    }

    fn notify_supervisors(&self) {
        // Snapshot so a supervisor may register another without deadlocking.
        let supervisors: Vec<_> = self.supervisors.read().clone();
        tracing::debug!(supervisors = supervisors.len(), "routing quit to supervisors");
        for supervisor in supervisors {
            supervisor.on_quit();
        }
    }

    fn broadcast(&self, message: &Message) -> NotifyStats {
        let receivers: Vec<_> = self.receivers.read().clone();
        let mut stats = NotifyStats::default();

        for (id, receiver) in receivers.iter().enumerate() {
            let Some(mut guard) = receiver.try_lock() else {
                // The receiver is executing further up this thread's stack.
                tracing::warn!(receiver = id, kind = ?message.kind(), "receiver busy, message skipped");
                stats.skipped += 1;
                continue;
            };
            match guard.on_message(message) {
                Ok(()) => stats.deliveries += 1,
                Err(err) => {
                    tracing::error!(
                        receiver = id,
                        name = guard.receiver_name(),
                        kind = ?message.kind(),
                        error = %err,
                        "message handler failed"
                    );
                    stats.failures += 1;
                }
            }
        }
        stats
    }
}

/// The message bus.
///
/// Owns the queue. Cheap [`MessageSender`] handles let servers post from
/// anywhere without borrowing the bus.
pub struct MessageBus {
    shared: Arc<BusShared>,
}

impl MessageBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        let (queue_tx, queue_rx) = unbounded();
        Self {
            shared: Arc::new(BusShared {
                receivers: RwLock::new(Vec::new()),
                supervisors: RwLock::new(Vec::new()),
                hooks: RwLock::new(Vec::new()),
                queue_tx,
                queue_rx,
            }),
        }
    }

    /// Appends a receiver and returns its index.
    ///
    /// No de-duplication is performed.
    pub fn register(&self, receiver: SharedReceiver) -> ReceiverId {
        let mut receivers = self.shared.receivers.write();
        receivers.push(receiver);
        receivers.len() - 1
    }

    /// Registers a supervisor that receives quit messages.
    pub fn supervise(&self, supervisor: Arc<dyn Supervisor>) {
        self.shared.supervisors.write().push(supervisor);
    }

    /// Installs a callback fired after each queued message is broadcast.
    ///
    /// The callback only observes; anything it posts is delivered on the
    /// next [`notify`](Self::notify).
    pub fn on_message_sent<F>(&self, hook: F)
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.shared.hooks.write().push(Arc::new(hook));
    }

    /// Returns a sender handle for this bus.
    #[must_use]
    pub fn sender(&self) -> MessageSender {
        MessageSender {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Enqueues a message for the next [`notify`](Self::notify).
    ///
    /// [`Message::Quit`] is routed to supervisors immediately instead.
    pub fn post(&self, message: Message) {
        self.shared.post(message);
    }

    /// Delivers a message to every receiver now, on the calling thread.
    pub fn post_immediate(&self, message: &Message) -> NotifyStats {
        self.shared.post_immediate(message)
    }

    /// Drains the queue in FIFO order, broadcasting each message.
    ///
    /// Only messages queued before the call are delivered; messages posted
    /// by handlers during this call wait for the next one.
    pub fn notify(&self) -> NotifyStats {
        let pending = self.shared.queue_rx.len();
        let mut stats = NotifyStats::default();

        for _ in 0..pending {
            let Ok(message) = self.shared.queue_rx.try_recv() else {
                break;
            };
            let mut round = self.shared.broadcast(&message);
            round.messages = 1;
            stats.merge(round);

            let hooks: Vec<_> = self.shared.hooks.read().clone();
            for hook in hooks {
                hook(&message);
            }
        }

        if stats.messages > 0 {
            tracing::trace!(
                messages = stats.messages,
                deliveries = stats.deliveries,
                failures = stats.failures,
                "bus notified"
            );
        }
        stats
    }

    /// Number of queued messages.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.queue_rx.len()
    }

    /// Number of registrations (duplicates included).
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.shared.receivers.read().len()
    }

    /// Number of registered supervisors.
    #[must_use]
    pub fn supervisor_count(&self) -> usize {
        self.shared.supervisors.read().len()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("receivers", &self.receiver_count())
            .field("supervisors", &self.supervisor_count())
            .field("pending", &self.pending())
            .finish()
    }
}

/// Handle for posting to a [`MessageBus`].
#[derive(Clone)]
pub struct MessageSender {
    shared: Arc<BusShared>,
}

impl MessageSender {
    /// Enqueues a message. See [`MessageBus::post`].
    #[inline]
    pub fn send(&self, message: Message) {
        self.shared.post(message);
    }

    /// Delivers a message now. See [`MessageBus::post_immediate`].
    ///
    /// The calling server is busy while it runs, so it does not receive
    /// its own immediate message.
    pub fn send_immediate(&self, message: &Message) -> NotifyStats {
        self.shared.post_immediate(message)
    }

    /// Requests loop termination.
    #[inline]
    pub fn quit(&self) {
        self.shared.post(Message::Quit);
    }
}

impl std::fmt::Debug for MessageSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSender")
            .field("pending", &self.shared.queue_rx.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::message::{CustomMessage, MessageKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Recorder {
        id: usize,
        log: Arc<Mutex<Vec<(usize, MessageKind)>>>,
    }

    impl MessageReceiver for Recorder {
        fn on_message(&mut self, message: &Message) -> CoreResult<()> {
            self.log.lock().push((self.id, message.kind()));
            Ok(())
        }
    }

    struct Failing;

    impl MessageReceiver for Failing {
        fn on_message(&mut self, _message: &Message) -> CoreResult<()> {
            Err(CoreError::subsystem("failing", "always fails"))
        }
    }

    #[derive(Default)]
    struct QuitCounter(AtomicUsize);

    impl Supervisor for QuitCounter {
        fn on_quit(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn recorder(id: usize, log: &Arc<Mutex<Vec<(usize, MessageKind)>>>) -> SharedReceiver {
        Arc::new(Mutex::new(Recorder {
            id,
            log: Arc::clone(log),
        }))
    }

    #[test]
    fn test_three_receivers_notified_in_order() {
        let bus = MessageBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for id in 0..3 {
            assert_eq!(bus.register(recorder(id, &log)), id);
        }

        bus.post(Message::Custom(CustomMessage::empty(1)));
        let stats = bus.notify();

        assert_eq!(stats.messages, 1);
        assert_eq!(stats.deliveries, 3);
        assert_eq!(
            *log.lock(),
            vec![
                (0, MessageKind::Custom(1)),
                (1, MessageKind::Custom(1)),
                (2, MessageKind::Custom(1)),
            ]
        );
        assert_eq!(bus.pending(), 0);
    }

    #[test]
    fn test_fifo_across_messages() {
        let bus = MessageBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.register(recorder(0, &log));

        bus.post(Message::KeyPressed(crate::Key::Space));
        bus.post(Message::ToggleOverlay);
        bus.notify();

        let kinds: Vec<_> = log.lock().iter().map(|(_, k)| *k).collect();
        assert_eq!(kinds, vec![MessageKind::KeyPressed, MessageKind::ToggleOverlay]);
    }

    #[test]
    fn test_duplicate_registration_delivers_twice() {
        let bus = MessageBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let r = recorder(9, &log);
        bus.register(Arc::clone(&r));
        bus.register(r);

        bus.post_immediate(&Message::ToggleOverlay);
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn test_quit_goes_to_supervisors_not_queue() {
        let bus = MessageBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.register(recorder(0, &log));
        let a = Arc::new(QuitCounter::default());
        let b = Arc::new(QuitCounter::default());
        bus.supervise(a.clone());
        bus.supervise(b.clone());

        bus.post(Message::Quit);
        assert_eq!(bus.pending(), 0);
        assert_eq!(a.0.load(Ordering::SeqCst), 1);
        assert_eq!(b.0.load(Ordering::SeqCst), 1);

        let stats = bus.post_immediate(&Message::Quit);
        assert_eq!(stats.quits, 1);
        assert_eq!(a.0.load(Ordering::SeqCst), 2);

        bus.notify();
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_failing_receiver_does_not_starve_others() {
        let bus = MessageBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.register(Arc::new(Mutex::new(Failing)));
        bus.register(recorder(1, &log));

        bus.post(Message::ToggleOverlay);
        let stats = bus.notify();

        assert_eq!(stats.failures, 1);
        assert_eq!(stats.deliveries, 1);
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_messages_posted_during_notify_wait_for_next_round() {
        struct Echo(MessageSender);
        impl MessageReceiver for Echo {
            fn on_message(&mut self, message: &Message) -> CoreResult<()> {
                if let Message::KeyPressed(key) = message {
                    self.0.send(Message::KeyReleased(*key));
                }
                Ok(())
            }
        }

        let bus = MessageBus::new();
        bus.register(Arc::new(Mutex::new(Echo(bus.sender()))));
        bus.post(Message::KeyPressed(crate::Key::Enter));

        assert_eq!(bus.notify().messages, 1);
        assert_eq!(bus.pending(), 1);
        assert_eq!(bus.notify().messages, 1);
        assert_eq!(bus.pending(), 0);
    }

    #[test]
    fn test_message_sent_hook_fires_per_message() {
        let bus = MessageBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        bus.on_message_sent(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        bus.post(Message::ToggleOverlay);
        bus.post(Message::ToggleOverlay);
        bus.notify();
        assert_eq!(count.load(Ordering::SeqCst), 2);

        // Immediate delivery bypasses the queue and its hook.
        bus.post_immediate(&Message::ToggleOverlay);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_busy_receiver_is_skipped() {
        let bus = MessageBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let r = recorder(0, &log);
        bus.register(Arc::clone(&r));

        let _held = r.lock();
        let stats = bus.post_immediate(&Message::ToggleOverlay);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.deliveries, 0);
    }
}
