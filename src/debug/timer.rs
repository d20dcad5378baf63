use instant::Instant;

/// Which part of a frame is being timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SystemPhase {
    Body = 0,
    Gaze = 1,
    Flame = 2,
    Tessellate = 3,
    Upload = 4,
    Render = 5,
}

pub const PHASE_COUNT: usize = 6;

impl SystemPhase {
    pub const ALL: [SystemPhase; PHASE_COUNT] = [
        Self::Body,
        Self::Gaze,
        Self::Flame,
        Self::Tessellate,
        Self::Upload,
        Self::Render,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Body => "Body",
            Self::Gaze => "Gaze/Blink",
            Self::Flame => "Flame",
            Self::Tessellate => "Tessellate",
            Self::Upload => "GPU Upload",
            Self::Render => "Render",
        }
    }
}

/// Per-phase timing with exponential moving average smoothing.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimers {
    /// EMA-smoothed duration in microseconds per phase.
    pub durations_us: [f64; PHASE_COUNT],
    /// Timestamp when `begin()` was called.
    start: Instant,
}

const EMA_ALPHA: f64 = 0.1;

impl SystemTimers {
    pub fn new() -> Self {
        Self {
            durations_us: [0.0; PHASE_COUNT],
            start: Instant::now(),
        }
    }

    /// Call before a phase runs.
    pub fn begin(&mut self) {
        self.start = Instant::now();
    }

    /// Call after a phase finishes. Records elapsed time for `phase`.
    pub fn end(&mut self, phase: SystemPhase) {
        let elapsed_us = self.start.elapsed().as_secs_f64() * 1_000_000.0;
        self.record(phase, elapsed_us);
    }

    /// Fold a measured duration into the average for `phase`.
    pub fn record(&mut self, phase: SystemPhase, elapsed_us: f64) {
        let idx = phase as usize;
        self.durations_us[idx] = self.durations_us[idx] * (1.0 - EMA_ALPHA) + elapsed_us * EMA_ALPHA;
    }

    /// Sum of all phase durations (microseconds).
    pub fn total_us(&self) -> f64 {
        self.durations_us.iter().sum()
    }
}

impl Default for SystemTimers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_smooths_toward_sample() {
        let mut timers = SystemTimers::new();
        timers.record(SystemPhase::Flame, 100.0);
        assert!((timers.durations_us[SystemPhase::Flame as usize] - 10.0).abs() < 1e-9);
        for _ in 0..200 {
            timers.record(SystemPhase::Flame, 100.0);
        }
        assert!((timers.durations_us[SystemPhase::Flame as usize] - 100.0).abs() < 1e-3);
        assert_eq!(timers.durations_us[SystemPhase::Body as usize], 0.0);
    }

    #[test]
    fn phases_index_their_slot() {
        for (i, phase) in SystemPhase::ALL.iter().enumerate() {
            assert_eq!(*phase as usize, i);
        }
    }
}
