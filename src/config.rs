use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;

use crate::mood::Mood;

/// Smallest accepted noise scale / spread.
const MIN_POSITIVE: f32 = 0.01;
/// Eye offset parked on when pointer following is switched off.
pub const IDLE_LOOK: Vec2 = Vec2::new(-20.0, -14.0);

/// Flame shaping parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlameParameters {
    /// Spike height of the flame tips (px).
    pub amplitude: f32,
    /// Brightness multiplier; 0 makes the flame invisible.
    pub intensity: f32,
    /// Noise scroll speed; 0 freezes the flame shape.
    pub drift: f32,
    /// Spatial frequency of the outline noise.
    pub noise_scale: f32,
    /// How strongly side flames bend upward.
    pub upward_bias: f32,
    /// Taper exponent; higher narrows the flame toward the crown.
    pub spread: f32,
}

impl Default for FlameParameters {
    fn default() -> Self {
        Self {
            amplitude: 40.0,
            intensity: 1.0,
            drift: 1.0,
            noise_scale: 1.5,
            upward_bias: 0.85,
            spread: 2.2,
        }
    }
}

impl FlameParameters {
    /// Copy with every field forced into its valid range. Non-finite values
    /// fall back to the default.
    pub fn sanitized(&self) -> Self {
        let d = Self::default();
        let fix = |v: f32, fallback: f32, min: f32| {
            if v.is_finite() {
                v.max(min)
            } else {
                fallback
            }
        };
        Self {
            amplitude: fix(self.amplitude, d.amplitude, 0.0),
            intensity: fix(self.intensity, d.intensity, 0.0),
            drift: fix(self.drift, d.drift, 0.0),
            noise_scale: fix(self.noise_scale, d.noise_scale, MIN_POSITIVE),
            upward_bias: fix(self.upward_bias, d.upward_bias, 0.0),
            spread: fix(self.spread, d.spread, MIN_POSITIVE),
        }
    }
}

/// Named look bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Default,
    Ghost,
    Dramatic,
    Minimal,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Preset::Default, Preset::Ghost, Preset::Dramatic, Preset::Minimal];

    pub fn label(self) -> &'static str {
        match self {
            Preset::Default => "Default",
            Preset::Ghost => "Ghost",
            Preset::Dramatic => "Dramatic",
            Preset::Minimal => "Minimal",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Preset::Default => Preset::Ghost,
            Preset::Ghost => Preset::Dramatic,
            Preset::Dramatic => Preset::Minimal,
            Preset::Minimal => Preset::Default,
        }
    }

    /// (flame, mood, sphere scale, sphere opacity)
    fn values(self) -> (FlameParameters, Mood, f32, f32) {
        let flame = |amplitude, intensity, drift, noise_scale, upward_bias, spread| FlameParameters {
            amplitude,
            intensity,
            drift,
            noise_scale,
            upward_bias,
            spread,
        };
        match self {
            Preset::Default => (FlameParameters::default(), Mood::Neutral, 1.0, 1.0),
            Preset::Ghost => (flame(30.0, 1.8, 0.5, 1.5, 0.85, 2.2), Mood::Sleepy, 1.0, 0.3),
            Preset::Dramatic => (flame(70.0, 2.0, 2.5, 2.0, 1.2, 1.8), Mood::Excited, 1.5, 1.0),
            Preset::Minimal => (flame(20.0, 0.5, 0.5, 1.0, 0.6, 3.0), Mood::Neutral, 0.8, 1.0),
        }
    }
}

/// Latest external inputs, copied out once per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSnapshot {
    pub flame: FlameParameters,
    pub mood: Mood,
    pub sphere_scale: f32,
    pub sphere_opacity: f32,
    /// Resting sphere center in host coordinates.
    pub anchor: Vec2,
    pub pointer: Option<Vec2>,
    pub look_target: Option<Vec2>,
    pub follow_pointer: bool,
}

impl Default for InputSnapshot {
    fn default() -> Self {
        Self {
            flame: FlameParameters::default(),
            mood: Mood::Neutral,
            sphere_scale: 1.0,
            sphere_opacity: 1.0,
            anchor: Vec2::ZERO,
            pointer: None,
            look_target: None,
            follow_pointer: true,
        }
    }
}

type ClickListener = Box<dyn FnMut()>;

#[derive(Default)]
struct Shared {
    inputs: InputSnapshot,
    pending_triggers: u32,
    listeners: Vec<ClickListener>,
}

/// The only write surface into a running engine.
///
/// Clones share the same cell. Writes are plain last-write-wins stores; the
/// engine copies a snapshot at the start of each tick, so nothing written
/// here is seen halfway through a tick.
#[derive(Clone, Default)]
pub struct ConfigBridge {
    shared: Rc<RefCell<Shared>>,
}

impl ConfigBridge {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, f: impl FnOnce(&mut InputSnapshot)) {
        f(&mut self.shared.borrow_mut().inputs);
    }

    pub fn set_flame(&self, flame: FlameParameters) {
        self.update(|i| i.flame = flame);
    }

    pub fn set_amplitude(&self, v: f32) {
        self.update(|i| i.flame.amplitude = v);
    }

    pub fn set_intensity(&self, v: f32) {
        self.update(|i| i.flame.intensity = v);
    }

    pub fn set_drift(&self, v: f32) {
        self.update(|i| i.flame.drift = v);
    }

    pub fn set_noise_scale(&self, v: f32) {
        self.update(|i| i.flame.noise_scale = v);
    }

    pub fn set_upward_bias(&self, v: f32) {
        self.update(|i| i.flame.upward_bias = v);
    }

    pub fn set_spread(&self, v: f32) {
        self.update(|i| i.flame.spread = v);
    }

    pub fn set_mood(&self, mood: Mood) {
        self.update(|i| i.mood = mood);
    }

    /// Sphere size multiplier; clamped to [0, 4].
    pub fn set_sphere_scale(&self, v: f32) {
        let v = if v.is_finite() { v.clamp(0.0, 4.0) } else { 1.0 };
        self.update(|i| i.sphere_scale = v);
    }

    /// Sphere body opacity; clamped to [0, 1].
    pub fn set_sphere_opacity(&self, v: f32) {
        let v = if v.is_finite() { v.clamp(0.0, 1.0) } else { 1.0 };
        self.update(|i| i.sphere_opacity = v);
    }

    pub fn set_anchor(&self, anchor: Vec2) {
        self.update(|i| i.anchor = anchor);
    }

    /// Pointer position in host coordinates, or `None` when it leaves.
    pub fn set_pointer(&self, pointer: Option<Vec2>) {
        self.update(|i| i.pointer = pointer);
    }

    /// Explicit eye offset used when not following the pointer.
    pub fn look_at(&self, target: Option<Vec2>) {
        self.update(|i| i.look_target = target);
    }

    /// Follow-mode flag. Switching it off parks the eyes on [`IDLE_LOOK`]
    /// until [`look_at`](Self::look_at) picks another target.
    pub fn set_follow_mode(&self, follow: bool) {
        self.update(|i| {
            i.follow_pointer = follow;
            if !follow {
                i.look_target = Some(IDLE_LOOK);
            }
        });
        log::debug!("follow pointer: {follow}");
    }

    pub fn apply_preset(&self, preset: Preset) {
        let (flame, mood, scale, opacity) = preset.values();
        self.update(|i| {
            i.flame = flame;
            i.mood = mood;
        });
        self.set_sphere_scale(scale);
        self.set_sphere_opacity(opacity);
        log::info!("preset: {}", preset.label());
    }

    /// Queue an interaction; the next body tick consumes it.
    pub fn trigger(&self) {
        self.shared.borrow_mut().pending_triggers += 1;
    }

    /// Register a callback run once per accepted bounce.
    pub fn on_click(&self, listener: impl FnMut() + 'static) {
        self.shared.borrow_mut().listeners.push(Box::new(listener));
    }

    pub fn snapshot(&self) -> InputSnapshot {
        self.shared.borrow().inputs
    }

    /// Drain queued triggers, returning how many arrived since the last call.
    pub fn take_triggers(&self) -> u32 {
        std::mem::take(&mut self.shared.borrow_mut().pending_triggers)
    }

    /// Run click listeners. Listeners may write back into the bridge.
    pub fn notify_click(&self) {
        let mut listeners = std::mem::take(&mut self.shared.borrow_mut().listeners);
        for listener in listeners.iter_mut() {
            listener();
        }
        // Keep any listeners registered during the callbacks.
        let mut shared = self.shared.borrow_mut();
        listeners.append(&mut shared.listeners);
        shared.listeners = listeners;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn sanitize_clamps_out_of_range() {
        let bad = FlameParameters {
            amplitude: -5.0,
            intensity: -1.0,
            drift: -0.5,
            noise_scale: 0.0,
            upward_bias: -2.0,
            spread: -3.0,
        };
        let s = bad.sanitized();
        assert_eq!(s.amplitude, 0.0);
        assert_eq!(s.intensity, 0.0);
        assert_eq!(s.drift, 0.0);
        assert_eq!(s.noise_scale, MIN_POSITIVE);
        assert_eq!(s.upward_bias, 0.0);
        assert_eq!(s.spread, MIN_POSITIVE);
    }

    #[test]
    fn sanitize_replaces_non_finite() {
        let p = FlameParameters {
            amplitude: f32::NAN,
            spread: f32::INFINITY,
            ..FlameParameters::default()
        };
        let s = p.sanitized();
        assert_eq!(s, FlameParameters::default());
    }

    #[test]
    fn writes_are_visible_to_later_snapshots_only() {
        let bridge = ConfigBridge::new();
        let before = bridge.snapshot();
        bridge.set_intensity(0.0);
        assert_eq!(before.flame.intensity, 1.0);
        assert_eq!(bridge.snapshot().flame.intensity, 0.0);
    }

    #[test]
    fn follow_mode_off_parks_the_eyes() {
        let bridge = ConfigBridge::new();
        bridge.set_pointer(Some(Vec2::new(10.0, 10.0)));
        bridge.set_follow_mode(false);
        let s = bridge.snapshot();
        assert!(!s.follow_pointer);
        assert_eq!(s.look_target, Some(IDLE_LOOK));

        bridge.set_follow_mode(true);
        let s = bridge.snapshot();
        assert!(s.follow_pointer);
        assert_eq!(s.pointer, Some(Vec2::new(10.0, 10.0)));
    }

    #[test]
    fn clones_share_state() {
        let a = ConfigBridge::new();
        let b = a.clone();
        b.set_mood(Mood::Happy);
        assert_eq!(a.snapshot().mood, Mood::Happy);
    }

    #[test]
    fn triggers_drain_once() {
        let bridge = ConfigBridge::new();
        bridge.trigger();
        bridge.trigger();
        assert_eq!(bridge.take_triggers(), 2);
        assert_eq!(bridge.take_triggers(), 0);
    }

    #[test]
    fn click_listener_can_write_back() {
        let bridge = ConfigBridge::new();
        let count = Rc::new(Cell::new(0));
        let (c, b) = (count.clone(), bridge.clone());
        bridge.on_click(move || {
            c.set(c.get() + 1);
            b.set_mood(Mood::Excited);
        });
        bridge.notify_click();
        bridge.notify_click();
        assert_eq!(count.get(), 2);
        assert_eq!(bridge.snapshot().mood, Mood::Excited);
    }

    #[test]
    fn preset_applies_bundle() {
        let bridge = ConfigBridge::new();
        bridge.apply_preset(Preset::Ghost);
        let s = bridge.snapshot();
        assert_eq!(s.mood, Mood::Sleepy);
        assert_eq!(s.sphere_opacity, 0.3);
        assert_eq!(s.flame.intensity, 1.8);
    }

    #[test]
    fn preset_cycle_wraps() {
        let mut p = Preset::Default;
        for _ in 0..Preset::ALL.len() {
            p = p.next();
        }
        assert_eq!(p, Preset::Default);
    }
}
