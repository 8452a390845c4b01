use std::time::Duration;

/// Backlog, in tick periods, past which the watchdog forces a catch-up pass.
pub const CATCH_UP_TICK_PERIODS: u32 = 3;

const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(50);
const DEFAULT_ANIM_PERIOD: Duration = Duration::from_millis(100);
const DEFAULT_FPS_DISPLAY_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeConfig {
    pub tick_period: Duration,
    pub anim_period: Duration,
    pub fps_display_interval: Duration,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            tick_period: DEFAULT_TICK_PERIOD,
            anim_period: DEFAULT_ANIM_PERIOD,
            fps_display_interval: DEFAULT_FPS_DISPLAY_INTERVAL,
        }
    }
}

/// Converts frame timestamps into fixed simulation ticks and animation ticks.
///
/// Timestamps are offsets from an arbitrary epoch (the loop start). Ticks are
/// handed out one at a time: callers loop on [`TimeController::consume_tick_if_due`]
/// and run exactly one simulation step per `true`.
#[derive(Debug, Clone)]
pub struct TimeController {
    tick_period: Duration,
    anim_period: Duration,
    fps_display_interval: Duration,
    last_time: Duration,
    tick_accumulator: Duration,
    anim_accumulator: Duration,
    tick_count: u64,
    anim_count: u64,
    fps: u32,
    last_fps_update: Option<Duration>,
}

impl TimeController {
    pub fn new(config: TimeConfig, start: Duration) -> Self {
        Self {
            tick_period: normalize_non_zero_duration(config.tick_period, DEFAULT_TICK_PERIOD),
            anim_period: normalize_non_zero_duration(config.anim_period, DEFAULT_ANIM_PERIOD),
            fps_display_interval: normalize_non_zero_duration(
                config.fps_display_interval,
                DEFAULT_FPS_DISPLAY_INTERVAL,
            ),
            last_time: start,
            tick_accumulator: Duration::ZERO,
            anim_accumulator: Duration::ZERO,
            tick_count: 0,
            anim_count: 0,
            fps: 0,
            last_fps_update: None,
        }
    }

    /// Re-anchors the clock at game start so the first frame sees a zero delta.
    pub fn reset_last_time(&mut self, start: Duration) {
        self.last_time = start;
    }

    pub fn advance(&mut self, timestamp: Duration) -> Duration {
        // A timestamp behind the last one (clock skew) yields zero, never a negative delta.
        let delta = timestamp.saturating_sub(self.last_time);
        self.last_time = self.last_time.max(timestamp);
        self.tick_accumulator = self.tick_accumulator.saturating_add(delta);
        self.anim_accumulator = self.anim_accumulator.saturating_add(delta);
        delta
    }

    pub fn consume_tick_if_due(&mut self) -> bool {
        if self.tick_accumulator < self.tick_period {
            return false;
        }
        self.tick_accumulator -= self.tick_period;
        self.tick_count = self.tick_count.saturating_add(1);
        true
    }

    pub fn consume_anim_if_due(&mut self) -> bool {
        if self.anim_accumulator < self.anim_period {
            return false;
        }
        self.anim_accumulator -= self.anim_period;
        // At most one anim tick per call; whole periods still owed are dropped.
        if self.anim_accumulator >= self.anim_period {
            let remainder = self.anim_accumulator.as_nanos() % self.anim_period.as_nanos();
            self.anim_accumulator = Duration::from_nanos(remainder as u64);
        }
        self.anim_count = self.anim_count.saturating_add(1);
        true
    }

    /// Fraction of the next tick already elapsed, in `[0, 1)`.
    pub fn interpolation_factor(&self) -> f32 {
        let factor = self.tick_accumulator.as_secs_f64() / self.tick_period.as_secs_f64();
        factor.clamp(0.0, 0.999_999) as f32
    }

    pub fn needs_catch_up(&self, timestamp: Duration) -> bool {
        let projected = self
            .tick_accumulator
            .saturating_add(timestamp.saturating_sub(self.last_time));
        projected >= self.tick_period.saturating_mul(CATCH_UP_TICK_PERIODS)
    }

    /// Refreshes the FPS estimate at most once per display interval.
    /// Returns `true` when the displayed value changed.
    pub fn record_frame(&mut self, timestamp: Duration, delta: Duration) -> bool {
        if delta.is_zero() {
            return false;
        }
        let due = match self.last_fps_update {
            Some(last) => timestamp.saturating_sub(last) >= self.fps_display_interval,
            None => true,
        };
        if !due {
            return false;
        }
        self.last_fps_update = Some(timestamp);
        let fps = (1000.0 / (delta.as_secs_f64() * 1000.0)).round() as u32;
        let changed = fps != self.fps;
        self.fps = fps;
        changed
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn anim_count(&self) -> u64 {
        self.anim_count
    }

    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    pub fn anim_period(&self) -> Duration {
        self.anim_period
    }

    pub fn last_time(&self) -> Duration {
        self.last_time
    }
}

pub(crate) fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
