use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub tps: f32,
    pub frame_time_ms: f32,
    pub catch_up_passes: u32,
    pub catch_up_ticks: u32,
}

/// Tallies loop activity between snapshots. Timestamps share the game loop's
/// epoch so the accumulator never reads the wall clock itself.
#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Duration,
    interval: Duration,
    frames: u32,
    ticks: u32,
    catch_up_passes: u32,
    catch_up_ticks: u32,
    frame_time_sum: Duration,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration, start: Duration) -> Self {
        Self {
            interval_start: start,
            interval,
            frames: 0,
            ticks: 0,
            catch_up_passes: 0,
            catch_up_ticks: 0,
            frame_time_sum: Duration::ZERO,
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration) {
        self.frames = self.frames.saturating_add(1);
        self.frame_time_sum = self.frame_time_sum.saturating_add(frame_dt);
    }

    pub(crate) fn record_tick(&mut self) {
        self.ticks = self.ticks.saturating_add(1);
    }

    pub(crate) fn record_catch_up(&mut self, ticks: u32) {
        self.catch_up_passes = self.catch_up_passes.saturating_add(1);
        self.catch_up_ticks = self.catch_up_ticks.saturating_add(ticks);
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Duration) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_sub(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = if self.frames == 0 {
            0.0
        } else {
            (self.frame_time_sum.as_secs_f32() / self.frames as f32) * 1000.0
        };

        let snapshot = LoopMetricsSnapshot {
            fps: self.frames as f32 / elapsed_seconds,
            tps: self.ticks as f32 / elapsed_seconds,
            frame_time_ms,
            catch_up_passes: self.catch_up_passes,
            catch_up_ticks: self.catch_up_ticks,
        };

        self.interval_start = now;
        self.frames = 0;
        self.ticks = 0;
        self.catch_up_passes = 0;
        self.catch_up_ticks = 0;
        self.frame_time_sum = Duration::ZERO;

        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_computes_expected_values() {
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1), Duration::ZERO);

        accumulator.record_frame(Duration::from_millis(16));
        accumulator.record_frame(Duration::from_millis(16));
        accumulator.record_tick();
        accumulator.record_tick();
        accumulator.record_tick();
        accumulator.record_tick();
        accumulator.record_catch_up(3);

        let snapshot = accumulator
            .maybe_snapshot(Duration::from_secs(1))
            .expect("snapshot should be emitted");

        assert!((snapshot.fps - 2.0).abs() < 0.001);
        assert!((snapshot.tps - 4.0).abs() < 0.001);
        assert!((snapshot.frame_time_ms - 16.0).abs() < 0.001);
        assert_eq!(snapshot.catch_up_passes, 1);
        assert_eq!(snapshot.catch_up_ticks, 3);
    }

    #[test]
    fn snapshot_waits_for_interval_and_resets() {
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1), Duration::ZERO);
        accumulator.record_frame(Duration::from_millis(10));

        assert!(accumulator
            .maybe_snapshot(Duration::from_millis(999))
            .is_none());
        assert!(accumulator.maybe_snapshot(Duration::from_secs(1)).is_some());

        let empty = accumulator
            .maybe_snapshot(Duration::from_secs(2))
            .expect("second interval");
        assert_eq!(empty.fps, 0.0);
        assert_eq!(empty.frame_time_ms, 0.0);
    }
}
