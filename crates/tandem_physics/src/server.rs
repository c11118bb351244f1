//! # Physics Server
//!
//! Runs the [`DynamicsWorld`] as part of the frame loop and applies
//! [`PhysicsCommand`]s arriving over the bus.

use glam::Vec3;
use tandem_core::{CoreResult, CustomMessage, Message, MessageReceiver, Server, ServerContext};

use crate::world::{DynamicsWorld, ImpostorId};

/// `CustomMessage::kind` carrying a [`PhysicsCommand`] payload.
pub const PHYSICS_COMMAND_KIND: u32 = 0x5048_5953; // "PHYS"

/// Requests other servers may post to the physics server.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PhysicsCommand {
    /// Wake the body and set its linear velocity.
    SetLinearVelocity {
        /// Target impostor.
        id: ImpostorId,
        /// New velocity.
        velocity: Vec3,
    },
    /// Wake the body and set its angular velocity.
    SetAngularVelocity {
        /// Target impostor.
        id: ImpostorId,
        /// New velocity.
        velocity: Vec3,
    },
    /// Halve horizontal velocity.
    Dampen(ImpostorId),
    /// Replace world gravity.
    SetGravity(Vec3),
    /// Stop or resume stepping. Paused frames do not accumulate time.
    Pause(bool),
}

impl PhysicsCommand {
    /// Wraps the command in a bus message.
    #[must_use]
    pub fn into_message(self) -> Message {
        Message::Custom(CustomMessage::new(PHYSICS_COMMAND_KIND, self))
    }
}

/// Server owning the dynamics world.
#[derive(Debug, Default)]
pub struct PhysicsServer {
    world: DynamicsWorld,
    paused: bool,
}

impl PhysicsServer {
    /// Creates a server around an existing world.
    #[must_use]
    pub fn new(world: DynamicsWorld) -> Self {
        Self {
            world,
            paused: false,
        }
    }

    /// The dynamics world.
    #[inline]
    #[must_use]
    pub fn world(&self) -> &DynamicsWorld {
        &self.world
    }

    /// The dynamics world, mutably.
    #[inline]
    pub fn world_mut(&mut self) -> &mut DynamicsWorld {
        &mut self.world
    }

    /// Whether stepping is suspended.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Applies one command. Commands naming an unknown impostor are
    /// dropped with a warning.
    pub fn apply(&mut self, command: PhysicsCommand) {
        let applied = match command {
            PhysicsCommand::SetLinearVelocity { id, velocity } => {
                self.world.set_impostor_linear_velocity(id, velocity)
            }
            PhysicsCommand::SetAngularVelocity { id, velocity } => {
                self.world.set_impostor_angular_velocity(id, velocity)
            }
            PhysicsCommand::Dampen(id) => self.world.dampen_impostor(id),
            PhysicsCommand::SetGravity(gravity) => {
                self.world.set_gravity(gravity);
                true
            }
            PhysicsCommand::Pause(paused) => {
                self.paused = paused;
                true
            }
        };
        if !applied {
            tracing::warn!(?command, "physics command for unknown impostor ignored");
        }
    }
}

impl MessageReceiver for PhysicsServer {
    fn receiver_name(&self) -> &str {
        "physics"
    }

    fn on_message(&mut self, message: &Message) -> CoreResult<()> {
        if let Message::Custom(custom) = message {
            if custom.kind == PHYSICS_COMMAND_KIND {
                if let Some(command) = custom.payload::<PhysicsCommand>() {
                    self.apply(*command);
                }
            }
        }
        Ok(())
    }
}

impl Server for PhysicsServer {
    fn name(&self) -> &'static str {
        "physics"
    }

    fn init(&mut self, _ctx: &ServerContext) -> CoreResult<()> {
        tracing::info!(gravity = ?self.world.gravity(), "physics server ready");
        Ok(())
    }

    fn process(&mut self, dt: f32) -> CoreResult<()> {
        if self.paused {
            return Ok(());
        }
        self.world.step(dt)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::CollisionShape;
    use crate::world::FIXED_TIME_STEP;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tandem_core::{AppContext, MessageBus, QuitSignal, ServerSlot};

    #[test]
    fn test_process_steps_world() {
        let mut server = PhysicsServer::default();
        server.process(FIXED_TIME_STEP * 2.0).unwrap();
        assert_eq!(server.world().total_substeps(), 2);
    }

    #[test]
    fn test_negative_dt_is_an_error() {
        let mut server = PhysicsServer::default();
        assert!(server.process(-0.5).is_err());
    }

    #[test]
    fn test_commands_over_bus() {
        let bus = MessageBus::new();
        let physics = Arc::new(Mutex::new(PhysicsServer::default()));
        let mut slot = ServerSlot::new(Arc::clone(&physics));
        slot.init(&bus, &AppContext::new(QuitSignal::new())).unwrap();

        let id = physics
            .lock()
            .world_mut()
            .create_impostor(CollisionShape::ball(0.5), Vec3::ZERO, 1.0)
            .unwrap();

        bus.post(PhysicsCommand::SetGravity(Vec3::ZERO).into_message());
        bus.post(
            PhysicsCommand::SetLinearVelocity {
                id,
                velocity: Vec3::new(2.0, 0.0, 0.0),
            }
            .into_message(),
        );
        bus.post(PhysicsCommand::Pause(true).into_message());
        bus.notify();

        let mut server = physics.lock();
        assert_eq!(server.world().gravity(), Vec3::ZERO);
        assert_eq!(
            server.world().impostor_linear_velocity(id),
            Some(Vec3::new(2.0, 0.0, 0.0))
        );
        assert!(server.is_paused());
        server.process(1.0).unwrap();
        assert_eq!(server.world().total_substeps(), 0);
    }
}
