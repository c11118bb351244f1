//! # Graphics Server
//!
//! The graphics side of the frame loop that lives with the simulation.
//! It never touches the scene; it queues [`SceneCommand`]s through a
//! [`SceneHandle`].
//!
//! [`SceneCommand`]: crate::SceneCommand

use tandem_core::{CoreResult, Message, MessageReceiver, Server};

use crate::scene::SceneHandle;

/// Server forwarding window events to the scene.
#[derive(Debug)]
pub struct GraphicsServer {
    scene: SceneHandle,
    viewport: (u32, u32),
    elapsed: f32,
}

impl GraphicsServer {
    /// Creates a server queueing edits through `scene`.
    #[must_use]
    pub fn new(scene: SceneHandle) -> Self {
        Self {
            scene,
            viewport: (0, 0),
            elapsed: 0.0,
        }
    }

    /// Handle for queueing scene edits.
    #[must_use]
    pub fn scene(&self) -> &SceneHandle {
        &self.scene
    }

    /// Last viewport size seen, `(0, 0)` before any resize.
    #[must_use]
    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Simulated seconds processed.
    #[must_use]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }
}

impl MessageReceiver for GraphicsServer {
    fn receiver_name(&self) -> &str {
        "graphics"
    }

    fn on_message(&mut self, message: &Message) -> CoreResult<()> {
        if let Message::WindowResized { width, height } = *message {
            self.viewport = (width, height);
            self.scene.set_viewport(width, height);
            tracing::debug!(width, height, "viewport resized");
        }
        Ok(())
    }
}

impl Server for GraphicsServer {
    fn name(&self) -> &'static str {
        "graphics"
    }

    fn process(&mut self, dt: f32) -> CoreResult<()> {
        self.elapsed += dt;
        Ok(())
    }
}
