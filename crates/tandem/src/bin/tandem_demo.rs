//! # TANDEM Demo
//!
//! Headless falling-box scene. Boxes drop onto a static ground slab, a
//! skybox spins analytically, and a scripted input stream resizes the
//! window, kicks a box, types into the console and finally presses the
//! quit key.
//!
//! ```bash
//! tandem_demo                     # defaults
//! tandem_demo config/demo.toml    # with a config file
//! RUST_LOG=tandem=debug tandem_demo
//! ```

use std::process::ExitCode;

use glam::{Mat4, Quat, Vec3};
use tandem::{
    Application, Behaviour, InputEvent, LoadContext, Runtime, RuntimeConfig, RuntimeResult,
    ScriptContext, ScriptedInput, UpdateContext,
};
use tandem_core::{CoreResult, EntityId, Key, Message};
use tandem_physics::{CollisionShape, ImpostorId, PhysicsCommand};
use tandem_rendering::{Aabb, GeometryId, HeadlessRenderer};

/// Frames run when the config sets no limit and nothing quits earlier.
const FALLBACK_FRAMES: u64 = 600;

/// Launches the kicked box. Never produced by typing a console line.
const KICK_KEY: Key = Key::Up;

struct FallingBoxes {
    sky: Option<EntityId>,
}

impl Application for FallingBoxes {
    fn load(&mut self, ctx: &mut LoadContext<'_>) -> RuntimeResult<()> {
        ctx.register_mesh("cube", Aabb::default())?;
        ctx.register_mesh("slab", Aabb::from_half_extents(Vec3::new(10.0, 0.5, 10.0)))?;
        ctx.register_mesh("sky", Aabb::from_half_extents(Vec3::splat(100.0)))?;

        ctx.spawn_body(
            "slab",
            CollisionShape::cuboid(Vec3::new(10.0, 0.5, 10.0)),
            Vec3::new(0.0, -0.5, 0.0),
            0.0,
        )?;

        let mut first = None;
        for i in 0..8u8 {
            let x = f32::from(i % 4) * 1.5 - 2.25;
            let y = 4.0 + f32::from(i) * 1.25;
            let shape = CollisionShape::cuboid(Vec3::splat(0.5));
            let eid = ctx.spawn_body("cube", shape, Vec3::new(x, y, 0.0), 1.0)?;
            if first.is_none() {
                first = Some(eid);
            }
        }

        self.sky = Some(ctx.spawn_static_geometry("sky", Mat4::IDENTITY)?);

        if let Some(record) = first.and_then(|eid| ctx.entities().get(eid)) {
            ctx.add_behaviour(Kicker {
                target: ImpostorId::from_raw(record.physics_id),
                kicks_pending: 0,
            });
        }
        ctx.camera_mut().eye = Vec3::new(0.0, 6.0, 18.0);
        Ok(())
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>, _dt: f32, time: f32) -> RuntimeResult<()> {
        let Some(record) = self.sky.and_then(|eid| ctx.entities().get(eid)) else {
            return Ok(());
        };
        let spin = Mat4::from_quat(Quat::from_rotation_y(time * 0.05));
        ctx.scene().set_world_transform(GeometryId::from_raw(record.graphics_id), spin);
        Ok(())
    }
}

/// Launches its box upward whenever [`KICK_KEY`] goes down.
struct Kicker {
    target: ImpostorId,
    kicks_pending: u32,
}

impl Behaviour for Kicker {
    fn name(&self) -> &str {
        "kicker"
    }

    fn update(&mut self, ctx: &ScriptContext<'_>, _dt: f32) -> CoreResult<()> {
        for _ in 0..std::mem::take(&mut self.kicks_pending) {
            tracing::info!(impostor = %self.target, "kick");
            ctx.sender.send(
                PhysicsCommand::SetLinearVelocity {
                    id: self.target,
                    velocity: Vec3::new(0.0, 8.0, 0.0),
                }
                .into_message(),
            );
        }
        Ok(())
    }

    fn on_message(&mut self, message: &Message) {
        if matches!(message, Message::KeyPressed(key) if *key == KICK_KEY) {
            self.kicks_pending += 1;
        }
    }
}

/// Press-release pairs typing `line` into the console, one key per poll,
/// starting at poll `at`.
fn type_console_line(at: u64, line: &str) -> Vec<(u64, InputEvent)> {
    let mut poll = at;
    let mut events = Vec::new();
    let keys = std::iter::once(Key::Grave)
        .chain(line.chars().map(|c| if c == ' ' { Key::Space } else { Key::Char(c) }))
        .chain([Key::Enter, Key::Grave]);
    for key in keys {
        events.push((poll, InputEvent::KeyPressed(key)));
        events.push((poll + 1, InputEvent::KeyReleased(key)));
        poll += 2;
    }
    events
}

fn load_config() -> RuntimeResult<RuntimeConfig> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };
    if config.max_frames.is_none() {
        config.max_frames = Some(FALLBACK_FRAMES);
    }
    Ok(config)
}

fn run() -> RuntimeResult<()> {
    let config = load_config()?;
    tandem::logging::init(&config.log_filter)?;

    let mut events = vec![
        (5, InputEvent::Resized { width: 1920, height: 1080 }),
        (30, InputEvent::KeyPressed(KICK_KEY)),
        (31, InputEvent::KeyReleased(KICK_KEY)),
    ];
    events.extend(type_console_line(60, "echo boxes dropped"));
    events.extend(type_console_line(120, "stats"));
    events.push((300, InputEvent::KeyPressed(config.quit_key)));
    let script = ScriptedInput::new(events);

    let mut runtime = Runtime::builder(config)
        .input(script)
        .renderer(HeadlessRenderer::new(60))
        .build(FallingBoxes { sky: None });
    runtime.execute()?;

    let console = runtime.console().lock();
    for line in console.history() {
        tracing::info!(line, "console");
    }
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "demo failed");
            eprintln!("tandem_demo: {err}");
            ExitCode::FAILURE
        }
    }
}
