use glam::Vec2;

/// Fraction of the remaining distance covered per tick.
pub const EYE_LERP: f32 = 0.10;
/// Max horizontal eye offset (px).
pub const MAX_EYE_OFFSET_X: f32 = 28.0;
/// Max vertical eye offset (px).
pub const MAX_EYE_OFFSET_Y: f32 = 22.0;
/// Pointer distance at which the eye offset saturates (px).
const POINTER_SATURATION_DIST: f32 = 320.0;

/// Where the eyes should be looking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GazeSource {
    /// Follow a pointer at this position (same space as the center).
    Pointer(Vec2),
    /// Look toward an explicit offset.
    Target(Vec2),
}

/// Smooths the displayed eye offset toward a target.
#[derive(Debug, Clone, Copy, Default)]
pub struct GazeTracker {
    target: Vec2,
    current: Vec2,
}

impl GazeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Vec2 {
        self.target
    }

    pub fn current(&self) -> Vec2 {
        self.current
    }

    /// Replace the desired look direction. Takes effect on the next advance.
    pub fn set_target(&mut self, target: Vec2) {
        self.target = clamp_to_ellipse(target);
    }

    /// Retarget from a gaze source relative to the emitter `center`.
    pub fn aim(&mut self, source: GazeSource, center: Vec2) {
        match source {
            GazeSource::Pointer(pointer) => self.target = pointer_target(pointer, center),
            GazeSource::Target(target) => self.set_target(target),
        }
    }

    /// Exponential approach toward the target.
    pub fn advance(&mut self) {
        self.current += (self.target - self.current) * EYE_LERP;
    }
}

/// Eye offset for a pointer, normalized by distance and capped.
pub fn pointer_target(pointer: Vec2, center: Vec2) -> Vec2 {
    let d = pointer - center;
    let dist = match d.length() {
        l if l > 0.0 => l,
        _ => 1.0,
    };
    let scale = dist.min(POINTER_SATURATION_DIST) / POINTER_SATURATION_DIST;
    Vec2::new(
        d.x / dist * MAX_EYE_OFFSET_X * scale,
        d.y / dist * MAX_EYE_OFFSET_Y * scale,
    )
}

/// Keep explicit targets inside the same ellipse pointer mode can reach.
fn clamp_to_ellipse(v: Vec2) -> Vec2 {
    let n = Vec2::new(v.x / MAX_EYE_OFFSET_X, v.y / MAX_EYE_OFFSET_Y);
    let len = n.length();
    if len > 1.0 {
        v / len
    } else {
        v
    }
}

/// Minimum seconds between blinks.
const BLINK_MIN_INTERVAL: f64 = 2.0;
/// Random extra seconds added to the minimum interval.
const BLINK_INTERVAL_SPREAD: f64 = 3.0;
/// How long the eyes stay closed (seconds).
pub const BLINK_DURATION: f64 = 0.13;
/// Vertical eye scale while closed.
pub const BLINK_SCALE_Y: f32 = 0.06;

/// Self-rescheduling blink timer driven by explicit timestamps.
pub struct BlinkTimer {
    rng: fastrand::Rng,
    next_fire: Option<f64>,
    open_at: Option<f64>,
}

impl BlinkTimer {
    pub fn new() -> Self {
        Self::with_rng(fastrand::Rng::new())
    }

    pub fn with_rng(rng: fastrand::Rng) -> Self {
        Self {
            rng,
            next_fire: None,
            open_at: None,
        }
    }

    /// Schedule the first blink relative to `now`.
    pub fn arm(&mut self, now: f64) {
        let at = now + self.draw_interval();
        self.next_fire = Some(at);
    }

    /// Cancel the pending blink. A blink already in flight still reopens.
    pub fn disarm(&mut self) {
        self.next_fire = None;
    }

    pub fn is_armed(&self) -> bool {
        self.next_fire.is_some()
    }

    pub fn next_fire(&self) -> Option<f64> {
        self.next_fire
    }

    pub fn is_closed(&self) -> bool {
        self.open_at.is_some()
    }

    /// Close the eyes now. No-op while a blink is already in flight.
    pub fn fire(&mut self, now: f64) -> bool {
        if self.open_at.is_some() {
            return false;
        }
        self.open_at = Some(now + BLINK_DURATION);
        log::trace!("blink at {:.2}s", now);
        true
    }

    /// Advance to `now`: reopen finished blinks and fire due ones.
    pub fn advance(&mut self, now: f64) {
        if let Some(open_at) = self.open_at {
            if now >= open_at {
                self.open_at = None;
            }
        }
        if let Some(at) = self.next_fire {
            if now >= at {
                self.fire(now);
                self.next_fire = Some(now + self.draw_interval());
            }
        }
    }

    /// Eye vertical scale for the current blink state.
    pub fn eye_scale_y(&self) -> f32 {
        if self.is_closed() {
            BLINK_SCALE_Y
        } else {
            1.0
        }
    }

    fn draw_interval(&mut self) -> f64 {
        BLINK_MIN_INTERVAL + self.rng.f64() * BLINK_INTERVAL_SPREAD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_without_overshoot() {
        let mut gaze = GazeTracker::new();
        gaze.set_target(Vec2::new(20.0, -15.0));
        let mut steps = 0;
        while (gaze.current() - gaze.target()).length() > 1e-3 {
            let prev = gaze.current();
            gaze.advance();
            // Moves toward the target, never past it.
            assert!(gaze.current().x >= prev.x && gaze.current().x <= 20.0);
            assert!(gaze.current().y <= prev.y && gaze.current().y >= -15.0);
            steps += 1;
            assert!(steps < 200, "did not converge");
        }
    }

    #[test]
    fn pointer_target_is_capped() {
        let center = Vec2::new(100.0, 100.0);
        let far = pointer_target(Vec2::new(10_000.0, 100.0), center);
        assert!((far.x - MAX_EYE_OFFSET_X).abs() < 1e-4);
        assert!(far.y.abs() < 1e-4);

        let below = pointer_target(Vec2::new(100.0, 5_000.0), center);
        assert!((below.y - MAX_EYE_OFFSET_Y).abs() < 1e-4);
    }

    #[test]
    fn pointer_target_scales_with_distance() {
        let center = Vec2::ZERO;
        let near = pointer_target(Vec2::new(160.0, 0.0), center);
        assert!((near.x - MAX_EYE_OFFSET_X * 0.5).abs() < 1e-4);
    }

    #[test]
    fn pointer_on_center_looks_straight() {
        assert_eq!(pointer_target(Vec2::splat(5.0), Vec2::splat(5.0)), Vec2::ZERO);
    }

    #[test]
    fn explicit_target_is_clamped() {
        let mut gaze = GazeTracker::new();
        gaze.set_target(Vec2::new(500.0, 0.0));
        assert!((gaze.target().x - MAX_EYE_OFFSET_X).abs() < 1e-4);
    }

    #[test]
    fn switching_source_does_not_jump() {
        let mut gaze = GazeTracker::new();
        gaze.aim(GazeSource::Pointer(Vec2::new(1_000.0, 0.0)), Vec2::ZERO);
        for _ in 0..30 {
            gaze.advance();
        }
        let before = gaze.current();
        gaze.aim(GazeSource::Target(Vec2::new(-28.0, 0.0)), Vec2::ZERO);
        assert_eq!(gaze.current(), before);
        gaze.advance();
        let step = (gaze.current() - before).length();
        let gap = (gaze.target() - before).length();
        assert!(step <= gap * EYE_LERP + 1e-4);
    }

    #[test]
    fn blink_fires_inside_interval_window() {
        let mut blink = BlinkTimer::with_rng(fastrand::Rng::with_seed(7));
        blink.arm(0.0);
        let at = blink.next_fire().unwrap();
        assert!((2.0..5.0).contains(&at));

        blink.advance(at - 0.01);
        assert!(!blink.is_closed());
        blink.advance(at);
        assert!(blink.is_closed());
        assert_eq!(blink.eye_scale_y(), BLINK_SCALE_Y);

        let next = blink.next_fire().unwrap();
        assert!(next - at >= 2.0 && next - at < 5.0);

        blink.advance(at + BLINK_DURATION);
        assert!(!blink.is_closed());
        assert_eq!(blink.eye_scale_y(), 1.0);
    }

    #[test]
    fn fire_while_closed_is_ignored() {
        let mut blink = BlinkTimer::with_rng(fastrand::Rng::with_seed(1));
        assert!(blink.fire(1.0));
        assert!(!blink.fire(1.05));
        // Reopens on the original schedule, not the ignored one.
        blink.advance(1.0 + BLINK_DURATION);
        assert!(!blink.is_closed());
    }

    #[test]
    fn disarmed_timer_never_fires() {
        let mut blink = BlinkTimer::with_rng(fastrand::Rng::with_seed(3));
        blink.arm(0.0);
        blink.disarm();
        blink.advance(100.0);
        assert!(!blink.is_closed());
        assert!(!blink.is_armed());
    }

    #[test]
    fn same_seed_same_schedule() {
        let mut a = BlinkTimer::with_rng(fastrand::Rng::with_seed(9));
        let mut b = BlinkTimer::with_rng(fastrand::Rng::with_seed(9));
        a.arm(0.0);
        b.arm(0.0);
        assert_eq!(a.next_fire(), b.next_fire());
    }
}
