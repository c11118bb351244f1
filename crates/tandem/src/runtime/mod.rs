//! # Runtime
//!
//! The frame scheduler. Owns every server, the scene and the renderer, and
//! runs them in a fixed order.
//!
//! ```text
//! Uninitialized ──initialize──> Initializing ──> Running ──quit──> Quitting ──> Terminated
//!                                     │              │                              ▲
//!                                     └──── error ───┴──────── error ───────────────┘
//! ```
//!
//! ## One frame
//!
//! ```text
//! single-threaded:  process ─> sync ─> render ─> draw
//!
//! dual-threaded:    fork ─┬─ worker: process ─────────┬─ join ─> sync
//!                         └─ caller: render ─> draw ──┘
//! ```
//!
//! `process` = application update, bus notify, then console, input, script,
//! physics, graphics. In dual-threaded mode the caller draws transforms
//! synced at the end of the previous frame while the worker simulates this
//! one; sync happens only after the join, so it never races the physics
//! step that produced its input.

pub mod stats;
pub mod sync;

pub use stats::{FrameStats, FrameStatsAccumulator, DEFAULT_FRAME_BUDGET};
pub use sync::{sync_transforms, SyncStats};

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tandem_core::{
    AppContext, CoreError, EntityRegistry, FrameClock, FrameDescriptor, FrameWorker, MessageBus,
    MessageSender, QuitSignal, ServerSlot,
};
use tandem_physics::{DynamicsWorld, PhysicsServer};
use tandem_rendering::{BatchStats, GraphicsServer, HeadlessRenderer, Renderer, Scene, SceneHandle};

use crate::app::{Application, LoadContext, UpdateContext};
use crate::config::{RuntimeConfig, SchedulingMode};
use crate::error::{RuntimeError, RuntimeResult};
use crate::servers::{
    ConsoleServer, GuiServer, InputServer, InputSource, KeyboardState, NullInput, ScriptServer,
};
use stats::micros;

/// Servers in the order they are initialized (and registered on the bus).
pub const INIT_ORDER: [&str; 6] = ["console", "gui", "input", "physics", "graphics", "script"];

/// Servers in the order they are processed each frame.
pub const PROCESS_ORDER: [&str; 5] = ["console", "input", "script", "physics", "graphics"];

/// Lifecycle of a [`Runtime`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeState {
    /// Built, servers not initialized.
    Uninitialized,
    /// Servers initializing and content loading.
    Initializing,
    /// Accepting frames.
    Running,
    /// Quit observed; tearing down.
    Quitting,
    /// Torn down. Terminal.
    Terminated,
}

// ============================================================================
// Simulation half
// ============================================================================

#[derive(Clone, Copy, Debug, Default)]
struct ProcessReport {
    elapsed: Duration,
    messages: usize,
    substeps: u64,
}

/// Everything `process` touches. Owned by exactly one thread at a time:
/// the caller between frames, the worker during a dual-threaded frame.
struct Simulation {
    bus: MessageBus,
    sender: MessageSender,
    servers: Vec<ServerSlot>,
    app: Box<dyn Application>,
    entities: EntityRegistry,
    scene: SceneHandle,
    physics: Arc<Mutex<PhysicsServer>>,
    report: ProcessReport,
}

impl Simulation {
    fn process(&mut self, frame: &FrameDescriptor) -> RuntimeResult<()> {
        let started = Instant::now();
        let dt = frame.delta_time;
        let substeps_before = self.physics.lock().world().total_substeps();

        let mut ctx = UpdateContext {
            scene: &self.scene,
            physics: &*self.physics,
            entities: &mut self.entities,
            sender: &self.sender,
        };
        self.app.update(&mut ctx, dt, frame.wall_time)?;

        let delivered = self.bus.notify();

        for slot in &self.servers {
            slot.process(dt).map_err(|source| RuntimeError::Server {
                server: slot.name(),
                source,
            })?;
        }

        let substeps_after = self.physics.lock().world().total_substeps();
        self.report = ProcessReport {
            elapsed: started.elapsed(),
            messages: delivered.messages,
            substeps: substeps_after - substeps_before,
        };
        Ok(())
    }
}

/// Culls, batches and draws. Reads world transforms as of the last sync.
fn render(
    scene: &mut Scene,
    renderer: &mut dyn Renderer,
    frame: &FrameDescriptor,
) -> RuntimeResult<BatchStats> {
    let batches = scene.build_batches();
    renderer.draw(frame, scene.camera(), &batches)?;
    Ok(scene.last_batch_stats())
}

#[inline]
fn saturate(n: impl TryInto<u32>) -> u32 {
    n.try_into().unwrap_or(u32::MAX)
}

// ============================================================================
// Builder
// ============================================================================

/// Assembles a [`Runtime`] from configuration and pluggable backends.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    input: Box<dyn InputSource>,
    renderer: Box<dyn Renderer>,
}

impl RuntimeBuilder {
    /// Starts from `config` with no input device and a silent headless
    /// renderer.
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            input: Box::new(NullInput),
            renderer: Box::new(HeadlessRenderer::new(0)),
        }
    }

    /// Input backend polled by the input server.
    #[must_use]
    pub fn input(mut self, source: impl InputSource + 'static) -> Self {
        self.input = Box::new(source);
        self
    }

    /// Renderer fed by the draw phase.
    #[must_use]
    pub fn renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    /// Builds an uninitialized runtime around `app`.
    pub fn build(self, app: impl Application + 'static) -> Runtime {
        let config = self.config;
        let quit = QuitSignal::new();
        let bus = MessageBus::new();
        let sender = bus.sender();
        let scene = Scene::new(config.cull_mode);

        let input = InputServer::new(self.input, config.quit_key);
        let keyboard = input.keyboard();
        let physics = Arc::new(Mutex::new(PhysicsServer::new(DynamicsWorld::with_gravity(
            config.gravity,
        ))));

        let clock = FrameClock::new().with_max_delta(config.max_frame_delta());
        let stats = config
            .frame_budget()
            .map_or_else(FrameStatsAccumulator::new, FrameStatsAccumulator::with_budget);

        let sim = Simulation {
            bus,
            sender: sender.clone(),
            servers: Vec::new(),
            app: Box::new(app),
            entities: EntityRegistry::new(),
            scene: scene.handle(),
            physics: Arc::clone(&physics),
            report: ProcessReport::default(),
        };

        Runtime {
            state: RuntimeState::Uninitialized,
            quit: quit.clone(),
            app_ctx: AppContext::new(quit),
            sender,
            console: Arc::new(Mutex::new(ConsoleServer::new(config.console_history))),
            gui: Arc::new(Mutex::new(GuiServer::new().with_toggle_key(tandem_core::Key::Function(3)))),
            input: Arc::new(Mutex::new(input)),
            graphics: Arc::new(Mutex::new(GraphicsServer::new(scene.handle()))),
            script: Arc::new(Mutex::new(ScriptServer::new(keyboard.clone()))),
            physics,
            keyboard,
            scene: Some(scene),
            renderer: self.renderer,
            sim: Some(Box::new(sim)),
            worker: None,
            clock,
            stats,
            initialized: Vec::with_capacity(INIT_ORDER.len()),
            config,
        }
    }
}

// ============================================================================
// Runtime
// ============================================================================

/// The frame scheduler.
pub struct Runtime {
    config: RuntimeConfig,
    state: RuntimeState,
    quit: QuitSignal,
    app_ctx: AppContext,
    sender: MessageSender,

    console: Arc<Mutex<ConsoleServer>>,
    gui: Arc<Mutex<GuiServer>>,
    input: Arc<Mutex<InputServer>>,
    physics: Arc<Mutex<PhysicsServer>>,
    graphics: Arc<Mutex<GraphicsServer>>,
    script: Arc<Mutex<ScriptServer>>,
    keyboard: KeyboardState,

    scene: Option<Scene>,
    renderer: Box<dyn Renderer>,
    sim: Option<Box<Simulation>>,
    worker: Option<FrameWorker<Simulation, RuntimeError>>,

    clock: FrameClock,
    stats: FrameStatsAccumulator,
    initialized: Vec<&'static str>,
}

impl Runtime {
    /// Shorthand for `RuntimeBuilder::new(config).build(app)`.
    pub fn new(config: RuntimeConfig, app: impl Application + 'static) -> Self {
        RuntimeBuilder::new(config).build(app)
    }

    /// Starts a builder.
    #[must_use]
    pub fn builder(config: RuntimeConfig) -> RuntimeBuilder {
        RuntimeBuilder::new(config)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Initializes every server in [`INIT_ORDER`], then runs
    /// [`Application::load`].
    ///
    /// # Errors
    ///
    /// [`RuntimeError::InvalidState`] unless uninitialized. Any server
    /// or load failure tears the runtime down and is returned.
    pub fn initialize(&mut self) -> RuntimeResult<()> {
        self.expect_state(RuntimeState::Uninitialized)?;
        self.state = RuntimeState::Initializing;
        tracing::info!(scheduling = ?self.config.scheduling, "initializing runtime");

        if let Err(err) = self.init_and_load() {
            tracing::error!(error = %err, "initialization failed");
            self.teardown();
            self.state = RuntimeState::Terminated;
            return Err(err);
        }

        // Frame 0 measures from here, not from construction or load.
        self.clock = FrameClock::new().with_max_delta(self.config.max_frame_delta());
        self.state = RuntimeState::Running;
        Ok(())
    }

    fn init_and_load(&mut self) -> RuntimeResult<()> {
        let sim = self
            .sim
            .as_deref_mut()
            .ok_or(RuntimeError::Core(CoreError::WorkerLost))?;

        sim.bus.supervise(Arc::new(self.quit.clone()));
        let counter = self.console.lock().message_counter();
        sim.bus.on_message_sent(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        let mut slots = [
            ServerSlot::new(Arc::clone(&self.console)),
            ServerSlot::new(Arc::clone(&self.gui)),
            ServerSlot::new(Arc::clone(&self.input)),
            ServerSlot::new(Arc::clone(&self.physics)),
            ServerSlot::new(Arc::clone(&self.graphics)),
            ServerSlot::new(Arc::clone(&self.script)),
        ];
        for slot in &mut slots {
            slot.init(&sim.bus, &self.app_ctx)
                .map_err(|source| RuntimeError::Server {
                    server: slot.name(),
                    source,
                })?;
            self.initialized.push(slot.name());
        }
        // The GUI takes messages but has no per-frame work.
        let [console, _gui, input, physics, graphics, script] = slots;
        sim.servers = vec![console, input, script, physics, graphics];

        let scene = self
            .scene
            .as_mut()
            .ok_or(RuntimeError::InvalidState {
                expected: RuntimeState::Initializing,
                actual: RuntimeState::Terminated,
            })?;
        {
            let mut physics = self.physics.lock();
            let mut script = self.script.lock();
            let mut ctx = LoadContext {
                scene: &mut *scene,
                world: physics.world_mut(),
                entities: &mut sim.entities,
                script: &mut *script,
                sender: &sim.sender,
            };
            sim.app.load(&mut ctx)?;
        }
        tracing::info!(
            entities = sim.entities.len(),
            geometries = scene.len(),
            meshes = scene.meshes().len(),
            "content loaded"
        );

        if self.config.scheduling == SchedulingMode::DualThreaded {
            self.worker = Some(FrameWorker::spawn(
                "tandem-sim",
                |sim: &mut Simulation, frame| sim.process(&frame),
            )?);
        }
        Ok(())
    }

    /// Requests a cooperative quit. The loop stops at the top of its next
    /// iteration; the frame in progress completes.
    pub fn quit(&self) {
        self.quit.request();
    }

    /// Runs the frame loop until quit or `max_frames`, then shuts down.
    /// Initializes first if needed.
    ///
    /// # Errors
    ///
    /// The first initialization or per-frame error. The runtime is
    /// `Terminated` afterwards either way.
    pub fn execute(&mut self) -> RuntimeResult<()> {
        if self.state == RuntimeState::Uninitialized {
            self.initialize()?;
        }
        self.expect_state(RuntimeState::Running)?;

        let budget = self.config.frame_budget();
        tracing::info!(max_frames = ?self.config.max_frames, ?budget, "entering frame loop");

        loop {
            if self.quit.is_requested() {
                tracing::info!(frames = self.stats.frames_recorded, "quit requested");
                break;
            }
            if self
                .config
                .max_frames
                .is_some_and(|max| self.stats.frames_recorded >= max)
            {
                tracing::info!(frames = self.stats.frames_recorded, "frame limit reached");
                break;
            }

            let started = Instant::now();
            let frame = self.clock.next_frame();
            self.run_frame_with(frame)?;

            if let Some(rest) = budget.and_then(|b| b.checked_sub(started.elapsed())) {
                std::thread::sleep(rest);
            }
        }

        self.shutdown()
    }

    /// Runs one frame timed by the runtime's clock.
    ///
    /// # Errors
    ///
    /// As [`run_frame_with`](Self::run_frame_with).
    pub fn run_frame(&mut self) -> RuntimeResult<FrameStats> {
        self.expect_state(RuntimeState::Running)?;
        let frame = self.clock.next_frame();
        self.run_frame_with(frame)
    }

    /// Runs one frame described by `frame`.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::InvalidState`] unless running. Any server, hook or
    /// renderer error is logged, the runtime is torn down, and the error
    /// returned.
    pub fn run_frame_with(&mut self, frame: FrameDescriptor) -> RuntimeResult<FrameStats> {
        self.expect_state(RuntimeState::Running)?;

        match self.frame(frame) {
            Ok(stats) => {
                self.stats.record(stats);
                self.gui.lock().record_frame_stats(&self.stats);
                Ok(stats)
            }
            Err(err) => {
                tracing::error!(tick = frame.clock_tick, error = %err, "frame failed, tearing down");
                self.teardown();
                self.state = RuntimeState::Terminated;
                Err(err)
            }
        }
    }

    fn frame(&mut self, frame: FrameDescriptor) -> RuntimeResult<FrameStats> {
        let started = Instant::now();
        let scene = self.scene.as_mut().ok_or(RuntimeError::InvalidState {
            expected: RuntimeState::Running,
            actual: RuntimeState::Terminated,
        })?;

        let (sim, render_time, sync_time, batch) = match self.config.scheduling {
            SchedulingMode::SingleThreaded => {
                let sim = self
                    .sim
                    .as_deref_mut()
                    .ok_or(RuntimeError::Core(CoreError::WorkerLost))?;
                sim.process(&frame)?;

                let sync_started = Instant::now();
                let synced = sync_transforms(scene, self.physics.lock().world(), &sim.entities);
                let sync_time = sync_started.elapsed();
                tracing::trace!(?synced, "transforms synced");

                let render_started = Instant::now();
                let batch = render(scene, &mut *self.renderer, &frame)?;
                (&*sim, render_started.elapsed(), sync_time, batch)
            }
            SchedulingMode::DualThreaded => {
                let worker = self
                    .worker
                    .as_mut()
                    .ok_or(RuntimeError::Core(CoreError::WorkerLost))?;
                let sim = self.sim.take().ok_or(RuntimeError::Core(CoreError::WorkerLost))?;
                worker.fork(sim, frame)?;

                let render_started = Instant::now();
                let rendered = render(scene, &mut *self.renderer, &frame);
                let render_time = render_started.elapsed();

                let (sim, processed) = worker.join()?;
                let sim: &Simulation = self.sim.insert(sim);
                processed?;
                let batch = rendered?;

                let sync_started = Instant::now();
                let synced = sync_transforms(scene, self.physics.lock().world(), &sim.entities);
                let sync_time = sync_started.elapsed();
                tracing::trace!(?synced, "transforms synced");
                (sim, render_time, sync_time, batch)
            }
        };

        let report = sim.report;
        Ok(FrameStats {
            frame: frame.clock_tick,
            total_us: micros(started.elapsed()),
            process_us: micros(report.elapsed),
            sync_us: micros(sync_time),
            render_us: micros(render_time),
            messages: saturate(report.messages),
            substeps: saturate(report.substeps),
            visible: saturate(batch.visible),
            culled: saturate(batch.culled),
        })
    }

    /// Tears down and moves to `Terminated`. A no-op once terminated.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::InvalidState`] while initializing.
    pub fn shutdown(&mut self) -> RuntimeResult<()> {
        match self.state {
            RuntimeState::Terminated => return Ok(()),
            RuntimeState::Initializing => {
                return Err(RuntimeError::InvalidState {
                    expected: RuntimeState::Running,
                    actual: self.state,
                })
            }
            _ => {}
        }

        self.state = RuntimeState::Quitting;
        self.stats.log_summary();
        self.teardown();
        self.state = RuntimeState::Terminated;
        tracing::info!("runtime terminated");
        Ok(())
    }

    /// Stops the worker, then drops the simulation, the impostors and the
    /// scene, in that order.
    fn teardown(&mut self) {
        // Dropping the worker closes its queue and joins the thread.
        self.worker = None;

        let entities = self.sim.take().map_or(0, |sim| sim.entities.len());
        let bodies = {
            let mut physics = self.physics.lock();
            let ids: Vec<_> = physics.world().impostor_ids().collect();
            for &id in &ids {
                physics.world_mut().destroy_impostor(id);
            }
            ids.len()
        };
        let geometries = self.scene.take().map_or(0, |scene| scene.len());

        tracing::info!(entities, bodies, geometries, "runtime torn down");
    }

    fn expect_state(&self, expected: RuntimeState) -> RuntimeResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(RuntimeError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> RuntimeState {
        self.state
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Names of servers initialized so far, in order.
    #[must_use]
    pub fn initialized_servers(&self) -> &[&'static str] {
        &self.initialized
    }

    /// The scene. `None` after teardown.
    #[must_use]
    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    /// The scene, mutably. `None` after teardown.
    pub fn scene_mut(&mut self) -> Option<&mut Scene> {
        self.scene.as_mut()
    }

    /// The entity registry. `None` after teardown.
    #[must_use]
    pub fn entities(&self) -> Option<&EntityRegistry> {
        self.sim.as_deref().map(|sim| &sim.entities)
    }

    /// Physics server, which owns the dynamics world.
    #[must_use]
    pub fn physics(&self) -> &Arc<Mutex<PhysicsServer>> {
        &self.physics
    }

    /// Console server.
    #[must_use]
    pub fn console(&self) -> &Arc<Mutex<ConsoleServer>> {
        &self.console
    }

    /// GUI server.
    #[must_use]
    pub fn gui(&self) -> &Arc<Mutex<GuiServer>> {
        &self.gui
    }

    /// Input server.
    #[must_use]
    pub fn input(&self) -> &Arc<Mutex<InputServer>> {
        &self.input
    }

    /// Graphics server.
    #[must_use]
    pub fn graphics(&self) -> &Arc<Mutex<GraphicsServer>> {
        &self.graphics
    }

    /// Script server.
    #[must_use]
    pub fn script(&self) -> &Arc<Mutex<ScriptServer>> {
        &self.script
    }

    /// Keys held, as last polled.
    #[must_use]
    pub fn keyboard(&self) -> &KeyboardState {
        &self.keyboard
    }

    /// Handle for posting to the bus.
    #[must_use]
    pub fn sender(&self) -> &MessageSender {
        &self.sender
    }

    /// The quit flag the loop checks.
    #[must_use]
    pub fn quit_signal(&self) -> &QuitSignal {
        &self.quit
    }

    /// Timing statistics so far.
    #[must_use]
    pub fn stats(&self) -> &FrameStatsAccumulator {
        &self.stats
    }

    /// Name of the active renderer.
    #[must_use]
    pub fn renderer_name(&self) -> &str {
        self.renderer.name()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("state", &self.state)
            .field("scheduling", &self.config.scheduling)
            .field("frames", &self.stats.frames_recorded)
            .field("renderer", &self.renderer.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{Application, EmptyApplication, LoadContext};

    struct SlowLoad;

    impl Application for SlowLoad {
        fn load(&mut self, _ctx: &mut LoadContext<'_>) -> RuntimeResult<()> {
            std::thread::sleep(Duration::from_millis(150));
            Ok(())
        }
    }

    fn frame(tick: u64, dt: f32) -> FrameDescriptor {
        FrameDescriptor {
            clock_tick: tick,
            wall_time: tick as f32 * dt,
            delta_time: dt,
        }
    }

    #[test]
    fn test_lifecycle_states() {
        let mut runtime = Runtime::new(RuntimeConfig::default(), EmptyApplication);
        assert_eq!(runtime.state(), RuntimeState::Uninitialized);
        assert!(matches!(
            runtime.run_frame(),
            Err(RuntimeError::InvalidState {
                expected: RuntimeState::Running,
                actual: RuntimeState::Uninitialized
            })
        ));

        runtime.initialize().unwrap();
        assert_eq!(runtime.state(), RuntimeState::Running);
        assert!(runtime.initialize().is_err());

        runtime.run_frame_with(frame(0, 1.0 / 60.0)).unwrap();
        runtime.shutdown().unwrap();
        assert_eq!(runtime.state(), RuntimeState::Terminated);
        assert!(runtime.scene().is_none());
        assert!(runtime.entities().is_none());
        runtime.shutdown().unwrap();
    }

    #[test]
    fn test_servers_initialized_in_order() {
        let mut runtime = Runtime::new(RuntimeConfig::default(), EmptyApplication);
        runtime.initialize().unwrap();
        assert_eq!(runtime.initialized_servers(), INIT_ORDER);
    }

    #[test]
    fn test_frame_stats_count_substeps() {
        let mut runtime = Runtime::new(RuntimeConfig::default(), EmptyApplication);
        runtime.initialize().unwrap();
        let stats = runtime.run_frame_with(frame(0, 2.0 / 60.0)).unwrap();
        assert_eq!(stats.substeps, 2);
        assert_eq!(runtime.stats().frames_recorded, 1);
        assert!(runtime.gui().lock().status().contains("1 frames"));
    }

    #[test]
    fn test_first_frame_excludes_load_time() {
        let mut runtime = Runtime::new(RuntimeConfig::default(), SlowLoad);
        runtime.initialize().unwrap();
        let stats = runtime.run_frame().unwrap();
        assert!(stats.substeps <= 1, "caught up {} sub-steps", stats.substeps);
    }

    #[test]
    fn test_execute_stops_at_max_frames() {
        for scheduling in [SchedulingMode::SingleThreaded, SchedulingMode::DualThreaded] {
            let config = RuntimeConfig {
                scheduling,
                max_frames: Some(5),
                ..RuntimeConfig::default()
            };
            let mut runtime = Runtime::new(config, EmptyApplication);
            runtime.execute().unwrap();
            assert_eq!(runtime.stats().frames_recorded, 5);
            assert_eq!(runtime.state(), RuntimeState::Terminated);
        }
    }

    #[test]
    fn test_quit_before_loop_runs_no_frames() {
        let mut runtime = Runtime::new(RuntimeConfig::default(), EmptyApplication);
        runtime.initialize().unwrap();
        runtime.quit();
        runtime.execute().unwrap();
        assert_eq!(runtime.stats().frames_recorded, 0);
        assert_eq!(runtime.state(), RuntimeState::Terminated);
    }
}
