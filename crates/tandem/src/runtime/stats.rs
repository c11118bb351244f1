//! Frame timing statistics.

use std::time::Duration;

/// Frame budget used when no target rate is configured (60 FPS).
pub const DEFAULT_FRAME_BUDGET: Duration = Duration::from_micros(16_666);

/// Timings of one loop iteration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frame number.
    pub frame: u64,
    /// Whole iteration, in microseconds.
    pub total_us: u64,
    /// Server processing (and application update), in microseconds.
    pub process_us: u64,
    /// Transform sync, in microseconds.
    pub sync_us: u64,
    /// Batch building and draw, in microseconds.
    pub render_us: u64,
    /// Messages delivered by this frame's notify.
    pub messages: u32,
    /// Physics sub-steps taken.
    pub substeps: u32,
    /// Instances drawn.
    pub visible: u32,
    /// Instances rejected by culling.
    pub culled: u32,
}

/// Running totals over recorded frames.
#[derive(Clone, Debug)]
pub struct FrameStatsAccumulator {
    /// Frames recorded.
    pub frames_recorded: u64,
    /// Sum of total frame times.
    pub total_us_sum: u64,
    /// Sum of process times.
    pub process_us_sum: u64,
    /// Sum of sync times.
    pub sync_us_sum: u64,
    /// Sum of render times.
    pub render_us_sum: u64,
    /// Shortest frame.
    pub min_frame_us: u64,
    /// Longest frame.
    pub max_frame_us: u64,
    /// Frames longer than the budget.
    pub frames_over_budget: u64,
    /// Messages delivered.
    pub messages: u64,
    /// Physics sub-steps taken.
    pub substeps: u64,
    budget_us: u64,
    last: Option<FrameStats>,
}

impl FrameStatsAccumulator {
    /// Creates an accumulator measuring against [`DEFAULT_FRAME_BUDGET`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_budget(DEFAULT_FRAME_BUDGET)
    }

    /// Creates an accumulator measuring against `budget`.
    #[must_use]
    pub fn with_budget(budget: Duration) -> Self {
        Self {
            frames_recorded: 0,
            total_us_sum: 0,
            process_us_sum: 0,
            sync_us_sum: 0,
            render_us_sum: 0,
            min_frame_us: u64::MAX,
            max_frame_us: 0,
            frames_over_budget: 0,
            messages: 0,
            substeps: 0,
            budget_us: u64::try_from(budget.as_micros()).unwrap_or(u64::MAX),
            last: None,
        }
    }

    /// Records one frame.
    pub fn record(&mut self, stats: FrameStats) {
        self.frames_recorded += 1;
        self.total_us_sum += stats.total_us;
        self.process_us_sum += stats.process_us;
        self.sync_us_sum += stats.sync_us;
        self.render_us_sum += stats.render_us;
        self.min_frame_us = self.min_frame_us.min(stats.total_us);
        self.max_frame_us = self.max_frame_us.max(stats.total_us);
        self.messages += u64::from(stats.messages);
        self.substeps += u64::from(stats.substeps);

        if stats.total_us > self.budget_us {
            self.frames_over_budget += 1;
            tracing::debug!(
                frame = stats.frame,
                total_ms = stats.total_us as f64 / 1000.0,
                budget_ms = self.budget_us as f64 / 1000.0,
                "frame exceeded budget"
            );
        }
        self.last = Some(stats);
    }

    /// The most recently recorded frame.
    #[must_use]
    pub fn last(&self) -> Option<FrameStats> {
        self.last
    }

    /// Average frame time in milliseconds.
    #[must_use]
    pub fn avg_frame_ms(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        (self.total_us_sum as f64 / self.frames_recorded as f64) / 1000.0
    }

    /// Average frames per second.
    #[must_use]
    pub fn avg_fps(&self) -> f64 {
        let avg_ms = self.avg_frame_ms();
        if avg_ms <= 0.0 {
            return 0.0;
        }
        1000.0 / avg_ms
    }

    /// Fraction of frames over budget.
    #[must_use]
    pub fn over_budget_ratio(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        self.frames_over_budget as f64 / self.frames_recorded as f64
    }

    fn avg_ms(&self, sum: u64) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        (sum as f64 / self.frames_recorded as f64) / 1000.0
    }

    /// Logs a summary at info level.
    pub fn log_summary(&self) {
        if self.frames_recorded == 0 {
            tracing::info!("no frames recorded");
            return;
        }
        tracing::info!(
            frames = self.frames_recorded,
            avg_ms = self.avg_frame_ms(),
            avg_fps = self.avg_fps(),
            min_ms = self.min_frame_us as f64 / 1000.0,
            max_ms = self.max_frame_us as f64 / 1000.0,
            over_budget = self.frames_over_budget,
            "frame timing"
        );
        tracing::info!(
            process_ms = self.avg_ms(self.process_us_sum),
            sync_ms = self.avg_ms(self.sync_us_sum),
            render_ms = self.avg_ms(self.render_us_sum),
            messages = self.messages,
            substeps = self.substeps,
            "frame breakdown"
        );
    }
}

impl Default for FrameStatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Microseconds in `d`, saturating.
#[inline]
pub(crate) fn micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator() {
        let mut acc = FrameStatsAccumulator::new();
        for i in 0..100 {
            acc.record(FrameStats {
                frame: i,
                total_us: 10_000 + i * 100,
                process_us: 5000,
                sync_us: 500,
                render_us: 2000,
                messages: 2,
                substeps: 1,
                ..FrameStats::default()
            });
        }

        assert_eq!(acc.frames_recorded, 100);
        assert!(acc.avg_fps() > 50.0);
        assert!(acc.avg_fps() < 100.0);
        assert_eq!(acc.min_frame_us, 10_000);
        assert_eq!(acc.max_frame_us, 19_900);
        assert_eq!(acc.messages, 200);
        assert_eq!(acc.last().map(|s| s.frame), Some(99));
        // 16_666us budget: frames 67..=99 are over.
        assert_eq!(acc.frames_over_budget, 33);
    }

    #[test]
    fn test_empty_accumulator() {
        let acc = FrameStatsAccumulator::default();
        assert!(acc.avg_frame_ms().abs() < f64::EPSILON);
        assert!(acc.avg_fps().abs() < f64::EPSILON);
        assert!(acc.over_budget_ratio().abs() < f64::EPSILON);
        assert!(acc.last().is_none());
    }

    #[test]
    fn test_custom_budget() {
        let mut acc = FrameStatsAccumulator::with_budget(Duration::from_millis(5));
        acc.record(FrameStats { total_us: 6000, ..FrameStats::default() });
        acc.record(FrameStats { total_us: 4000, ..FrameStats::default() });
        assert!((acc.over_budget_ratio() - 0.5).abs() < f64::EPSILON);
    }
}
