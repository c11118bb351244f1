//! # Renderer Boundary
//!
//! The scene hands a renderer culled per-mesh batches. Everything past
//! this trait (GPU buffers, pipelines, presentation) belongs to the
//! implementation.

use tandem_core::FrameDescriptor;

use crate::error::SceneResult;
use crate::scene::{Camera, InstanceBatch};

/// Consumer of culled instance batches.
pub trait Renderer: Send {
    /// Name used in diagnostics.
    fn name(&self) -> &str {
        "renderer"
    }

    /// Draws one frame.
    ///
    /// # Errors
    ///
    /// Any error terminates the frame loop.
    fn draw(
        &mut self,
        frame: &FrameDescriptor,
        camera: &Camera,
        batches: &[InstanceBatch],
    ) -> SceneResult<()>;
}

/// Counters kept by [`HeadlessRenderer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    /// Frames drawn.
    pub frames: u64,
    /// Batches in the last frame.
    pub last_batches: usize,
    /// Instances in the last frame.
    pub last_instances: usize,
    /// Instances drawn since creation.
    pub total_instances: u64,
}

/// A renderer with no output device. Logs each frame and keeps counters.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    stats: DrawStats,
    log_every: u64,
}

impl HeadlessRenderer {
    /// Creates a renderer logging a summary every `log_every` frames
    /// (`0` disables logging).
    #[must_use]
    pub fn new(log_every: u64) -> Self {
        Self {
            stats: DrawStats::default(),
            log_every,
        }
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> DrawStats {
        self.stats
    }
}

impl Renderer for HeadlessRenderer {
    fn name(&self) -> &str {
        "headless"
    }

    fn draw(
        &mut self,
        frame: &FrameDescriptor,
        camera: &Camera,
        batches: &[InstanceBatch],
    ) -> SceneResult<()> {
        let instances: usize = batches.iter().map(|b| b.instances.len()).sum();
        self.stats.frames += 1;
        self.stats.last_batches = batches.len();
        self.stats.last_instances = instances;
        self.stats.total_instances += instances as u64;

        if self.log_every > 0 && frame.clock_tick % self.log_every == 0 {
            tracing::info!(
                tick = frame.clock_tick,
                batches = batches.len(),
                instances,
                eye = ?camera.eye,
                "frame drawn"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::InstanceData;

    #[test]
    fn test_headless_counts_instances() {
        let mut renderer = HeadlessRenderer::new(0);
        let batches = vec![
            InstanceBatch {
                mesh: "a".into(),
                instances: vec![InstanceData::default(); 3],
            },
            InstanceBatch {
                mesh: "b".into(),
                instances: vec![InstanceData::default()],
            },
        ];
        let frame = FrameDescriptor::default();
        renderer.draw(&frame, &Camera::default(), &batches).unwrap();
        renderer.draw(&frame, &Camera::default(), &batches[..1]).unwrap();

        let stats = renderer.stats();
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.last_batches, 1);
        assert_eq!(stats.last_instances, 3);
        assert_eq!(stats.total_instances, 7);
    }
}
