//! Frame timing utilities

use std::time::{Duration, Instant};

/// Wall-clock frame pacing over a run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PacingStats {
    pub frames: u64,
    pub avg_ms: f32,
    pub min_ms: f32,
    pub max_ms: f32,
}

/// Produces the simulation step for each frame and records pacing.
///
/// With a fixed step every tick returns that step regardless of wall time;
/// otherwise the step is the wall-clock time since the previous tick.
pub struct FrameTimer {
    last_frame: Instant,
    fixed_step: Option<f32>,
    sim_time: f64,
    frame_count: u64,
    total: Duration,
    min: Duration,
    max: Duration,
}

impl FrameTimer {
    /// Wall-clock stepping
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            fixed_step: None,
            sim_time: 0.0,
            frame_count: 0,
            total: Duration::ZERO,
            min: Duration::MAX,
            max: Duration::ZERO,
        }
    }

    /// Fixed stepping, `step` seconds per frame
    pub fn fixed(step: f32) -> Self {
        Self {
            fixed_step: Some(step),
            ..Self::new()
        }
    }

    /// Call once per frame. Returns the step to simulate, in seconds.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let elapsed = now - self.last_frame;
        self.last_frame = now;

        self.frame_count += 1;
        self.total += elapsed;
        self.min = self.min.min(elapsed);
        self.max = self.max.max(elapsed);

        let step = self.fixed_step.unwrap_or_else(|| elapsed.as_secs_f32());
        self.sim_time += step as f64;
        step
    }

    /// Simulated seconds so far
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed_step.is_some()
    }

    pub fn pacing(&self) -> PacingStats {
        if self.frame_count == 0 {
            return PacingStats::default();
        }
        let ms = |d: Duration| d.as_secs_f32() * 1000.0;
        PacingStats {
            frames: self.frame_count,
            avg_ms: ms(self.total) / self.frame_count as f32,
            min_ms: ms(self.min),
            max_ms: ms(self.max),
        }
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}
