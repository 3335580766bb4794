//! Animation clock shared by the render loop, tweens and rotations.
//!
//! Every animation in vislab is driven by elapsed seconds rather than frame
//! counts, so behaviour stays consistent under variable frame rate.
//!
//! # Example
//!
//! ```ignore
//! use vislab::time::Clock;
//!
//! let mut clock = Clock::new();
//!
//! // Once per frame:
//! let (elapsed, delta) = clock.tick();
//! println!("{:.2}s (+{:.4}s), {:.1} fps", elapsed, delta, clock.fps());
//! ```

use std::time::{Duration, Instant};

/// Longest delta handed to experiments, in seconds.
///
/// A minimized or dragged window can stall for seconds; tweens and
/// integrators see at most this much.
pub const MAX_DELTA: f32 = 0.1;

const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Frames counted over a fixed wall-clock window.
#[derive(Debug, Clone, Copy)]
struct FpsMeter {
    since: Instant,
    frames: u32,
    value: f32,
}

impl FpsMeter {
    fn new(now: Instant) -> Self {
        Self {
            since: now,
            frames: 0,
            value: 0.0,
        }
    }

    /// Count a frame. Returns the new rate when a window closes.
    fn count(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        let span = now.duration_since(self.since);
        if span < FPS_WINDOW {
            return None;
        }
        self.value = self.frames as f32 / span.as_secs_f32();
        self.frames = 0;
        self.since = now;
        Some(self.value)
    }
}

/// Elapsed/delta time source for one experiment.
#[derive(Debug)]
pub struct Clock {
    last_tick: Instant,
    elapsed: f32,
    delta: f32,
    frame: u64,
    meter: FpsMeter,
    paused: bool,
    /// When set, every tick advances by exactly this much.
    step: Option<f32>,
    scale: f32,
}

impl Clock {
    /// Create a clock starting now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_tick: now,
            elapsed: 0.0,
            delta: 0.0,
            frame: 0,
            meter: FpsMeter::new(now),
            paused: false,
            step: None,
            scale: 1.0,
        }
    }

    /// Create a clock that advances by `delta` seconds per tick, independent
    /// of wall time.
    pub fn fixed(delta: f32) -> Self {
        Self {
            step: Some(delta),
            ..Self::new()
        }
    }

    /// Advance the clock. Call once per frame.
    ///
    /// Returns `(elapsed, delta)` in seconds.
    pub fn tick(&mut self) -> (f32, f32) {
        let now = Instant::now();
        let wall = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;

        self.delta = if self.paused {
            0.0
        } else {
            self.step.unwrap_or_else(|| wall.min(MAX_DELTA)) * self.scale
        };
        if !self.paused {
            self.elapsed += self.delta;
            self.frame += 1;
            if let Some(fps) = self.meter.count(now) {
                log::trace!("Frame rate {:.1}", fps);
            }
        }
        (self.elapsed, self.delta)
    }

    /// Seconds of animated time since the clock started.
    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Seconds between the last two ticks.
    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta
    }

    /// Number of unpaused ticks so far.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Frames per second over the last full second of wall time.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.meter.value
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn time_scale(&self) -> f32 {
        self.scale
    }

    /// Stop animated time. `delta()` reads 0 until resumed.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Force a fixed step per tick, or `None` for wall-clock timing.
    pub fn set_fixed_delta(&mut self, delta: Option<f32>) {
        self.step = delta;
    }

    /// Playback speed multiplier, `1.0` is real time. Negative clamps to 0.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.scale = scale.max(0.0);
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_wall_clock_delta_is_capped() {
        let mut clock = Clock::new();
        thread::sleep(Duration::from_millis(150));
        let (elapsed, delta) = clock.tick();
        assert_eq!(delta, MAX_DELTA);
        assert_eq!(elapsed, MAX_DELTA);
        assert_eq!(clock.frame(), 1);
    }

    #[test]
    fn test_fixed_clock_ignores_wall_time() {
        let mut clock = Clock::fixed(0.25);
        thread::sleep(Duration::from_millis(20));
        for _ in 0..4 {
            clock.tick();
        }
        assert_eq!(clock.delta(), 0.25);
        assert!((clock.elapsed() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pause_freezes_elapsed_and_frames() {
        let mut clock = Clock::fixed(0.1);
        clock.tick();
        clock.pause();
        clock.tick();
        assert_eq!(clock.delta(), 0.0);
        assert_eq!(clock.frame(), 1);

        clock.resume();
        clock.tick();
        assert!((clock.elapsed() - 0.2).abs() < 1e-6);
        assert_eq!(clock.frame(), 2);
    }

    #[test]
    fn test_time_scale() {
        let mut clock = Clock::fixed(0.1);
        clock.set_time_scale(2.0);
        clock.tick();
        assert!((clock.delta() - 0.2).abs() < 1e-6);

        clock.set_time_scale(-1.0);
        assert_eq!(clock.time_scale(), 0.0);
    }

    #[test]
    fn test_fps_meter_reports_per_window() {
        let start = Instant::now();
        let mut meter = FpsMeter::new(start);
        for i in 1..30 {
            assert_eq!(meter.count(start + Duration::from_millis(i * 20)), None);
        }
        let fps = meter.count(start + Duration::from_secs(1)).unwrap();
        assert!((fps - 30.0).abs() < 1e-3);
        assert_eq!(meter.frames, 0);
    }
}
