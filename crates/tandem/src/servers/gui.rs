//! GUI overlay server.
//!
//! Holds the overlay visibility and the text it would show. Drawing the
//! overlay is the renderer's business.

use tandem_core::{CoreResult, Key, Message, MessageReceiver, Server};

use crate::runtime::FrameStatsAccumulator;

/// Overlay state driven by messages and frame statistics.
#[derive(Debug, Default)]
pub struct GuiServer {
    overlay_visible: bool,
    toggle_key: Option<Key>,
    status: String,
    toggles: u64,
}

impl GuiServer {
    /// Creates a hidden overlay with no toggle key.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also toggles the overlay when `key` is pressed.
    #[must_use]
    pub fn with_toggle_key(mut self, key: Key) -> Self {
        self.toggle_key = Some(key);
        self
    }

    /// Whether the overlay is shown.
    #[must_use]
    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible
    }

    /// Current overlay text.
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Refreshes the overlay text from frame statistics.
    pub fn record_frame_stats(&mut self, stats: &FrameStatsAccumulator) {
        self.status = format!(
            "{:.1} fps | {:.2} ms | {} frames",
            stats.avg_fps(),
            stats.avg_frame_ms(),
            stats.frames_recorded
        );
    }

    fn toggle(&mut self) {
        self.overlay_visible = !self.overlay_visible;
        self.toggles += 1;
        tracing::debug!(visible = self.overlay_visible, "overlay toggled");
    }
}

impl MessageReceiver for GuiServer {
    fn receiver_name(&self) -> &str {
        "gui"
    }

    fn on_message(&mut self, message: &Message) -> CoreResult<()> {
        match message {
            Message::ToggleOverlay => self.toggle(),
            Message::KeyPressed(key) if Some(*key) == self.toggle_key => self.toggle(),
            _ => {}
        }
        Ok(())
    }
}

impl Server for GuiServer {
    fn name(&self) -> &'static str {
        "gui"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::FrameStats;

    #[test]
    fn test_overlay_toggles() {
        let mut gui = GuiServer::new().with_toggle_key(Key::Function(3));
        assert!(!gui.overlay_visible());

        gui.on_message(&Message::ToggleOverlay).unwrap();
        assert!(gui.overlay_visible());
        gui.on_message(&Message::KeyPressed(Key::Function(3))).unwrap();
        assert!(!gui.overlay_visible());
        gui.on_message(&Message::KeyPressed(Key::Function(4))).unwrap();
        assert!(!gui.overlay_visible());
        assert_eq!(gui.toggles, 2);
    }

    #[test]
    fn test_status_text() {
        let mut gui = GuiServer::new();
        let mut stats = FrameStatsAccumulator::new();
        stats.record(FrameStats { total_us: 10_000, ..FrameStats::default() });
        gui.record_frame_stats(&stats);
        assert_eq!(gui.status(), "100.0 fps | 10.00 ms | 1 frames");
    }
}
