use glam::Vec2;

use crate::body::{BodyPose, BodySpring, EyeDisplay, SPHERE_RADIUS};
use crate::config::{ConfigBridge, InputSnapshot};
use crate::debug::timer::{SystemPhase, SystemTimers};
use crate::flame::{FlameFrame, FlameRenderer};
use crate::gaze::{BlinkTimer, GazeSource, GazeTracker};
use crate::mood::ExpressionBlend;
use crate::render::target::RenderTarget;

/// Body simulation step (seconds per tick).
pub const TICK_RATE: f64 = 1.0 / 60.0;
/// Max accumulated time before we clamp (prevents spiral of death).
const MAX_ACCUMULATOR: f64 = 0.25;

/// One tick cadence fed by the shared display-refresh clock.
///
/// A fixed driver runs as many whole steps as the accumulated time allows;
/// a per-frame driver runs exactly one step per feed.
#[derive(Debug, Clone)]
pub struct TickDriver {
    step: Option<f64>,
    accumulator: f64,
    due: bool,
    clock: f64,
    ticks: u64,
    enabled: bool,
}

impl TickDriver {
    pub fn fixed(step: f64) -> Self {
        Self::with_step(Some(step))
    }

    pub fn per_frame() -> Self {
        Self::with_step(None)
    }

    fn with_step(step: Option<f64>) -> Self {
        Self {
            step,
            accumulator: 0.0,
            due: false,
            clock: 0.0,
            ticks: 0,
            enabled: false,
        }
    }

    /// Add elapsed wall time. Ignored while disabled.
    pub fn feed(&mut self, dt: f64) {
        if !self.enabled {
            return;
        }
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.accumulator = (self.accumulator + dt).min(MAX_ACCUMULATOR);
        self.due = true;
    }

    /// Consume one step if one is due, advancing the driver clock.
    pub fn step(&mut self) -> bool {
        if !self.enabled {
            return false;
        }
        match self.step {
            Some(step) => {
                if self.accumulator < step {
                    return false;
                }
                self.accumulator -= step;
                self.clock += step;
            }
            None => {
                if !self.due {
                    return false;
                }
                self.clock += self.accumulator;
                self.accumulator = 0.0;
                self.due = false;
            }
        }
        self.ticks += 1;
        true
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.accumulator = 0.0;
            self.due = false;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Simulated seconds consumed so far.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

/// What one call to [`AnimationLoop::frame`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub body_ticks: u32,
    pub drawn: bool,
}

/// Drives the body and flame cadences from a single refresh callback.
///
/// The body driver advances the springs, gaze, blink and expression at a
/// fixed rate; the flame driver rebuilds the flame once per frame. Both read
/// the latest [`ConfigBridge`] snapshot at the start of their tick.
pub struct AnimationLoop {
    bridge: ConfigBridge,
    body_driver: TickDriver,
    flame_driver: TickDriver,

    body: BodySpring,
    gaze: GazeTracker,
    blink: BlinkTimer,
    expression: ExpressionBlend,
    flame: FlameRenderer,

    inputs: InputSnapshot,
    pose: BodyPose,
    timers: SystemTimers,
    warned_missing_target: bool,
}

impl AnimationLoop {
    pub fn new(bridge: ConfigBridge) -> Self {
        let mut rng = fastrand::Rng::new();
        Self::with_rng(bridge, &mut rng)
    }

    /// Deterministic constructor: noise permutation and blink schedule are
    /// drawn from `rng`.
    pub fn with_rng(bridge: ConfigBridge, rng: &mut fastrand::Rng) -> Self {
        let inputs = bridge.snapshot();
        let flame = FlameRenderer::with_rng(SPHERE_RADIUS * inputs.sphere_scale, rng);
        let blink = BlinkTimer::with_rng(rng.fork());
        let body = BodySpring::new();
        let pose = body.pose(inputs.sphere_scale, inputs.sphere_opacity);
        Self {
            bridge,
            body_driver: TickDriver::fixed(TICK_RATE),
            flame_driver: TickDriver::per_frame(),
            body,
            gaze: GazeTracker::new(),
            blink,
            expression: ExpressionBlend::new(inputs.mood),
            flame,
            inputs,
            pose,
            timers: SystemTimers::new(),
            warned_missing_target: false,
        }
    }

    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        self.body_driver.set_enabled(true);
        self.flame_driver.set_enabled(true);
        self.blink.arm(self.body_driver.clock());
        log::info!("animation loop started");
    }

    /// Halt both drivers and the blink schedule together.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        self.body_driver.set_enabled(false);
        self.flame_driver.set_enabled(false);
        self.blink.disarm();
        log::info!(
            "animation loop stopped after {} body ticks",
            self.body_driver.ticks()
        );
    }

    pub fn is_running(&self) -> bool {
        self.body_driver.is_enabled() || self.flame_driver.is_enabled()
    }

    /// Latest body transform.
    pub fn pose(&self) -> &BodyPose {
        &self.pose
    }

    /// Inputs seen by the most recent body tick.
    pub fn inputs(&self) -> &InputSnapshot {
        &self.inputs
    }

    pub fn body(&self) -> &BodySpring {
        &self.body
    }

    pub fn gaze(&self) -> &GazeTracker {
        &self.gaze
    }

    pub fn blink(&self) -> &BlinkTimer {
        &self.blink
    }

    pub fn flame_frame(&self) -> &FlameFrame {
        self.flame.frame()
    }

    pub fn body_ticks(&self) -> u64 {
        self.body_driver.ticks()
    }

    pub fn timers(&self) -> &SystemTimers {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut SystemTimers {
        &mut self.timers
    }

    /// Whether a host-space point is on the body, using the anchor from the
    /// latest snapshot.
    pub fn hit_test(&self, point: Vec2) -> bool {
        self.pose.contains(point - self.bridge.snapshot().anchor)
    }

    /// Advance by `dt` seconds of wall time and draw into `target`.
    ///
    /// With no target the simulation still advances; only drawing is skipped.
    pub fn frame(&mut self, dt: f64, target: Option<&mut dyn RenderTarget>) -> FrameReport {
        let mut report = FrameReport::default();
        if !self.is_running() {
            return report;
        }

        self.body_driver.feed(dt);
        while self.body_driver.step() {
            self.body_tick();
            report.body_ticks += 1;
        }

        self.flame_driver.feed(dt);
        if self.flame_driver.step() {
            self.timers.begin();
            let inputs = self.bridge.snapshot();
            self.flame.set_radius(SPHERE_RADIUS * inputs.sphere_scale);
            self.flame.build(&inputs.flame, self.flame_driver.clock());
            self.timers.end(SystemPhase::Flame);
        }

        match target {
            Some(target) => {
                self.timers.begin();
                target.begin_flame();
                FlameRenderer::draw(self.flame.frame(), target);
                target.apply_pose(&self.pose);
                self.timers.end(SystemPhase::Tessellate);
                self.warned_missing_target = false;
                report.drawn = true;
            }
            None => {
                if !self.warned_missing_target {
                    log::debug!("no render target, skipping draw");
                    self.warned_missing_target = true;
                }
            }
        }

        report
    }

    fn body_tick(&mut self) {
        self.timers.begin();
        let inputs = self.bridge.snapshot();
        self.inputs = inputs;
        let now = self.body_driver.clock();

        for _ in 0..self.bridge.take_triggers() {
            if self.body.trigger() {
                self.bridge.notify_click();
            }
        }
        self.body.advance();
        self.timers.end(SystemPhase::Body);

        self.timers.begin();
        let center = inputs.anchor + Vec2::new(0.0, self.body.state().vertical_position);
        let source = match (inputs.follow_pointer, inputs.pointer, inputs.look_target) {
            (true, Some(pointer), _) => Some(GazeSource::Pointer(pointer)),
            (_, _, Some(target)) => Some(GazeSource::Target(target)),
            _ => None,
        };
        if let Some(source) = source {
            self.gaze.aim(source, center);
        }
        self.gaze.advance();
        self.blink.advance(now);
        self.expression.set_mood(inputs.mood, now);
        self.timers.end(SystemPhase::Gaze);

        self.pose = self.compose_pose(&inputs, now);
    }

    fn compose_pose(&self, inputs: &InputSnapshot, now: f64) -> BodyPose {
        let mut pose = self.body.pose(inputs.sphere_scale, inputs.sphere_opacity);
        let shape = self.expression.shape_at(now);
        pose.left_eye = EyeDisplay {
            top_clip: shape.top_clip_left / 100.0,
            bottom_clip: shape.bottom_clip / 100.0,
            corner_radius: shape.corner_radius,
        };
        pose.right_eye = EyeDisplay {
            top_clip: shape.top_clip_right / 100.0,
            ..pose.left_eye
        };
        pose.eye_offset = self.gaze.current();
        pose.eye_scale_y = self.blink.eye_scale_y();
        pose
    }
}
