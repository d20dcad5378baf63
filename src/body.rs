use glam::Vec2;

/// Downward acceleration per tick (px/tick²).
pub const GRAVITY: f32 = 2.8;
/// Peak height a bounce is launched toward (px).
pub const BOUNCE_HEIGHT: f32 = 90.0;
/// Rest level of the vertical position.
pub const GROUND_Y: f32 = 0.0;

/// Landing speed (px/tick) below which no squash is injected.
const IMPACT_MIN_SPEED: f32 = 3.0;
/// Squash velocity gained per unit of landing speed.
const IMPACT_GAIN: f32 = 0.018;
/// Cap on squash velocity injected by a single landing.
const IMPACT_CAP: f32 = 0.30;

const SQUASH_STIFFNESS: f32 = 0.30;
const SQUASH_DAMPING: f32 = 0.54;
const JELLY_STIFFNESS: f32 = 0.28;
const JELLY_DAMPING: f32 = 0.52;
/// Jelly spring velocity set by each accepted trigger.
const JELLY_KICK: f32 = 0.18;

/// Exaggeration of squash velocity in the horizontal scale.
const SQUASH_VELOCITY_GAIN: f32 = 1.2;
/// Smallest horizontal squash used when deriving the reciprocal.
const MIN_SQUASH: f32 = 0.6;

/// Sphere radius at scale 1.0 (px).
pub const SPHERE_RADIUS: f32 = 80.0;

/// Damped oscillator around an equilibrium of 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Oscillator {
    pub position: f32,
    pub velocity: f32,
    stiffness: f32,
    damping: f32,
}

impl Oscillator {
    pub const fn new(stiffness: f32, damping: f32) -> Self {
        Self {
            position: 1.0,
            velocity: 0.0,
            stiffness,
            damping,
        }
    }

    /// One step: accelerate toward 1.0, damp, integrate.
    pub fn step(&mut self) {
        self.velocity += -(self.position - 1.0) * self.stiffness;
        self.velocity *= self.damping;
        self.position += self.velocity;
    }
}

/// Discrete bounce phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Grounded,
    Airborne,
}

/// Full physical state of the body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub phase: Phase,
    /// Displacement from rest; negative is up.
    pub vertical_position: f32,
    pub vertical_velocity: f32,
    pub squash: Oscillator,
    pub jelly: Oscillator,
}

impl Default for BodyState {
    fn default() -> Self {
        Self {
            phase: Phase::Grounded,
            vertical_position: GROUND_Y,
            vertical_velocity: 0.0,
            squash: Oscillator::new(SQUASH_STIFFNESS, SQUASH_DAMPING),
            jelly: Oscillator::new(JELLY_STIFFNESS, JELLY_DAMPING),
        }
    }
}

/// Bounce, squash/stretch and jelly springs for the sphere.
#[derive(Debug, Clone, Default)]
pub struct BodySpring {
    state: BodyState,
}

impl BodySpring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &BodyState {
        &self.state
    }

    pub fn is_airborne(&self) -> bool {
        self.state.phase == Phase::Airborne
    }

    /// Launch a bounce. Ignored while airborne. Returns whether it was accepted.
    pub fn trigger(&mut self) -> bool {
        if self.is_airborne() {
            return false;
        }
        let s = &mut self.state;
        s.phase = Phase::Airborne;
        s.vertical_position = GROUND_Y;
        s.vertical_velocity = launch_velocity();
        s.jelly.velocity = JELLY_KICK;
        log::debug!("bounce launched (vy = {:.2})", s.vertical_velocity);
        true
    }

    /// Advance one fixed tick.
    pub fn advance(&mut self) {
        let s = &mut self.state;

        if s.phase == Phase::Airborne {
            s.vertical_velocity += GRAVITY;
            s.vertical_position += s.vertical_velocity;

            if s.vertical_position >= GROUND_Y {
                let impact = s.vertical_velocity.abs();
                s.vertical_position = GROUND_Y;
                s.vertical_velocity = 0.0;
                s.phase = Phase::Grounded;
                if impact > IMPACT_MIN_SPEED {
                    s.squash.velocity += (impact * IMPACT_GAIN).min(IMPACT_CAP);
                }
                log::debug!("landed (impact {:.2} px/tick)", impact);
            }
        }

        // Springs decay every tick regardless of phase.
        s.squash.step();
        s.jelly.step();
    }

    /// Visual transform for the current state.
    pub fn pose(&self, sphere_scale: f32, sphere_opacity: f32) -> BodyPose {
        let s = &self.state;
        let squash_x = 1.0 + s.squash.velocity * SQUASH_VELOCITY_GAIN + (s.squash.position - 1.0);
        let squash_y = 1.0 / squash_x.max(MIN_SQUASH);
        let jelly_x = s.jelly.position;
        let jelly_y = 2.0 - s.jelly.position;

        let height_ratio = (-s.vertical_position / BOUNCE_HEIGHT).clamp(0.0, 1.0);
        let grounded = 1.0 - height_ratio;

        BodyPose {
            offset_y: s.vertical_position,
            scale: Vec2::new(squash_x * jelly_x * sphere_scale, squash_y * jelly_y * sphere_scale),
            radius: SPHERE_RADIUS,
            opacity: sphere_opacity,
            core_glow: 0.12 + grounded * 0.10,
            shadow: Shadow {
                width: 60.0 + grounded * 80.0,
                height: 10.0 + grounded * 14.0,
                opacity: 0.15 + grounded * 0.65,
                blur: 14.0 + grounded * 18.0,
                drop: -s.vertical_position + SPHERE_RADIUS + 18.0,
            },
            eye_offset: Vec2::ZERO,
            left_eye: EyeDisplay::OPEN,
            right_eye: EyeDisplay::OPEN,
            eye_scale_y: 1.0,
        }
    }
}

/// Initial upward speed that would peak at `BOUNCE_HEIGHT` in continuous time.
pub fn launch_velocity() -> f32 {
    -(2.0 * GRAVITY * BOUNCE_HEIGHT).sqrt()
}

/// Ground shadow under the body. Sizes in px, `drop` measured downward
/// from the body center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub width: f32,
    pub height: f32,
    pub opacity: f32,
    pub blur: f32,
    pub drop: f32,
}

/// Per-eye clip extents as fractions of eye height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeDisplay {
    pub top_clip: f32,
    pub bottom_clip: f32,
    pub corner_radius: f32,
}

impl EyeDisplay {
    pub const OPEN: EyeDisplay = EyeDisplay {
        top_clip: 0.0,
        bottom_clip: 0.0,
        corner_radius: 10.0,
    };
}

/// Everything a render target needs to place the body for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyPose {
    /// Vertical translation of the whole character (flame included).
    pub offset_y: f32,
    /// Horizontal/vertical scale of the sphere (squash, jelly and size).
    pub scale: Vec2,
    /// Unscaled sphere radius.
    pub radius: f32,
    /// Sphere body opacity; eyes are unaffected.
    pub opacity: f32,
    /// Alpha of the inner rim glow.
    pub core_glow: f32,
    pub shadow: Shadow,
    /// Displayed eye-pair offset from its rest position.
    pub eye_offset: Vec2,
    pub left_eye: EyeDisplay,
    pub right_eye: EyeDisplay,
    /// Vertical eye scale; near zero while blinking.
    pub eye_scale_y: f32,
}

impl BodyPose {
    /// Whether `point` (relative to the resting sphere center) lies inside the
    /// deformed sphere.
    pub fn contains(&self, point: Vec2) -> bool {
        let rx = self.radius * self.scale.x.abs();
        let ry = self.radius * self.scale.y.abs();
        if rx <= f32::EPSILON || ry <= f32::EPSILON {
            return false;
        }
        let d = point - Vec2::new(0.0, self.offset_y);
        (d.x / rx).powi(2) + (d.y / ry).powi(2) <= 1.0
    }
}
