/// Mood expression. Controls eye shape only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mood {
    /// Round, fully open eyes.
    #[default]
    Neutral,
    /// Bottom-clipped smile eyes.
    Happy,
    /// Wide open, softer corners.
    Surprised,
    /// Top-clipped, half closed.
    Sleepy,
    /// Slightly bottom-clipped, tighter corners.
    Excited,
    /// Asymmetric top clip (side-eye).
    Suspicious,
    /// Flat top clip, sharp corners.
    Angry,
    /// Drooping lids with a slight bottom clip.
    Sad,
    /// One lid lowered, eyes narrowed from below.
    Thinking,
}

impl Mood {
    pub const ALL: [Mood; 9] = [
        Mood::Neutral,
        Mood::Happy,
        Mood::Surprised,
        Mood::Sleepy,
        Mood::Excited,
        Mood::Suspicious,
        Mood::Angry,
        Mood::Sad,
        Mood::Thinking,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Mood::Neutral => "Neutral",
            Mood::Happy => "Happy",
            Mood::Surprised => "Surprised",
            Mood::Sleepy => "Sleepy",
            Mood::Excited => "Excited",
            Mood::Suspicious => "Suspicious",
            Mood::Angry => "Angry",
            Mood::Sad => "Sad",
            Mood::Thinking => "Thinking",
        }
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|&m| m == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

/// Clip parameters for one pair of eyes.
///
/// Clip values are percentages of eye height hidden from the top (per eye)
/// and from the bottom (shared). `corner_radius` is in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeShape {
    pub top_clip_left: f32,
    pub top_clip_right: f32,
    pub bottom_clip: f32,
    pub corner_radius: f32,
}

impl EyeShape {
    const fn new(top_clip_left: f32, top_clip_right: f32, bottom_clip: f32, corner_radius: f32) -> Self {
        Self {
            top_clip_left,
            top_clip_right,
            bottom_clip,
            corner_radius,
        }
    }

    pub fn lerp(self, other: EyeShape, t: f32) -> EyeShape {
        let mix = |a: f32, b: f32| a * (1.0 - t) + b * t;
        EyeShape {
            top_clip_left: mix(self.top_clip_left, other.top_clip_left),
            top_clip_right: mix(self.top_clip_right, other.top_clip_right),
            bottom_clip: mix(self.bottom_clip, other.bottom_clip),
            corner_radius: mix(self.corner_radius, other.corner_radius),
        }
    }
}

/// Eye width in pixels.
pub const EYE_WIDTH: f32 = 18.0;
/// Eye height in pixels.
pub const EYE_HEIGHT: f32 = 30.0;
/// Horizontal gap between the two eyes.
pub const EYE_GAP: f32 = 20.0;
/// How far the eye pair sits above the sphere center.
pub const EYE_RAISE: f32 = 12.0;

/// Static mood to eye-shape mapping.
pub struct ExpressionTable;

impl ExpressionTable {
    pub fn lookup(mood: Mood) -> EyeShape {
        match mood {
            Mood::Neutral => EyeShape::new(0.0, 0.0, 0.0, 10.0),
            Mood::Happy => EyeShape::new(0.0, 0.0, 48.0, 10.0),
            Mood::Surprised => EyeShape::new(0.0, 0.0, 0.0, 14.0),
            Mood::Sleepy => EyeShape::new(50.0, 50.0, 0.0, 10.0),
            Mood::Excited => EyeShape::new(0.0, 0.0, 10.0, 8.0),
            Mood::Suspicious => EyeShape::new(35.0, 48.0, 0.0, 10.0),
            Mood::Angry => EyeShape::new(30.0, 30.0, 0.0, 6.0),
            Mood::Sad => EyeShape::new(22.0, 22.0, 12.0, 12.0),
            Mood::Thinking => EyeShape::new(0.0, 28.0, 18.0, 10.0),
        }
    }
}

/// Crossfade duration between mood shapes (seconds).
pub const CROSSFADE_SECS: f64 = 0.32;

/// Crossfades the displayed eye shape whenever the mood changes.
///
/// A change mid-transition restarts from whatever is currently shown, so the
/// displayed shape never jumps.
#[derive(Debug, Clone, Copy)]
pub struct ExpressionBlend {
    mood: Mood,
    from: EyeShape,
    to: EyeShape,
    started: f64,
}

impl ExpressionBlend {
    pub fn new(mood: Mood) -> Self {
        let shape = ExpressionTable::lookup(mood);
        Self {
            mood,
            from: shape,
            to: shape,
            started: f64::NEG_INFINITY,
        }
    }

    pub fn mood(&self) -> Mood {
        self.mood
    }

    /// Retarget to `mood` at time `now`. No-op if already targeting it.
    pub fn set_mood(&mut self, mood: Mood, now: f64) {
        if mood == self.mood {
            return;
        }
        self.from = self.shape_at(now);
        self.to = ExpressionTable::lookup(mood);
        self.mood = mood;
        self.started = now;
        log::debug!("mood -> {}", mood.label());
    }

    /// Displayed shape at time `now`.
    pub fn shape_at(&self, now: f64) -> EyeShape {
        let t = ((now - self.started) / CROSSFADE_SECS).clamp(0.0, 1.0) as f32;
        self.from.lerp(self.to, ease_standard(t))
    }
}

/// cubic-bezier(0.4, 0, 0.2, 1). Monotonic, stays in [0, 1].
pub fn ease_standard(t: f32) -> f32 {
    cubic_bezier(0.4, 0.0, 0.2, 1.0, t)
}

/// Evaluate a CSS-style cubic bezier timing curve at progress `x`.
fn cubic_bezier(x1: f32, y1: f32, x2: f32, y2: f32, x: f32) -> f32 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let bez = |a: f32, b: f32, s: f32| {
        let inv = 1.0 - s;
        3.0 * inv * inv * s * a + 3.0 * inv * s * s * b + s * s * s
    };
    // x(s) is monotonic for control x in [0, 1]; bisect for s.
    let (mut lo, mut hi) = (0.0f32, 1.0f32);
    for _ in 0..32 {
        let mid = (lo + hi) * 0.5;
        if bez(x1, x2, mid) < x {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    bez(y1, y2, (lo + hi) * 0.5).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_mood_has_a_distinct_shape() {
        for (i, &a) in Mood::ALL.iter().enumerate() {
            for &b in &Mood::ALL[i + 1..] {
                assert_ne!(
                    ExpressionTable::lookup(a),
                    ExpressionTable::lookup(b),
                    "{} and {} share a shape",
                    a.label(),
                    b.label()
                );
            }
        }
    }

    #[test]
    fn shapes_are_within_eye_bounds() {
        for mood in Mood::ALL {
            let s = ExpressionTable::lookup(mood);
            assert!(s.top_clip_left + s.bottom_clip < 100.0);
            assert!(s.top_clip_right + s.bottom_clip < 100.0);
            assert!(s.corner_radius > 0.0);
        }
    }

    #[test]
    fn next_cycles_through_all_moods() {
        let mut m = Mood::Neutral;
        for _ in 0..Mood::ALL.len() {
            m = m.next();
        }
        assert_eq!(m, Mood::Neutral);
    }

    #[test]
    fn easing_is_monotonic_and_bounded() {
        let mut prev = 0.0;
        for i in 0..=100 {
            let y = ease_standard(i as f32 / 100.0);
            assert!((0.0..=1.0).contains(&y));
            assert!(y >= prev - 1e-6);
            prev = y;
        }
        assert!(ease_standard(0.0).abs() < 1e-4);
        assert!((ease_standard(1.0) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn crossfade_settles_on_target() {
        let mut blend = ExpressionBlend::new(Mood::Neutral);
        blend.set_mood(Mood::Happy, 1.0);
        assert_eq!(blend.shape_at(1.0), ExpressionTable::lookup(Mood::Neutral));
        assert_eq!(blend.shape_at(1.0 + CROSSFADE_SECS), ExpressionTable::lookup(Mood::Happy));
    }

    #[test]
    fn round_trip_inside_window_never_overshoots() {
        let neutral = ExpressionTable::lookup(Mood::Neutral);
        let surprised = ExpressionTable::lookup(Mood::Surprised);
        let lo = neutral.corner_radius.min(surprised.corner_radius);
        let hi = neutral.corner_radius.max(surprised.corner_radius);

        let mut blend = ExpressionBlend::new(Mood::Neutral);
        blend.set_mood(Mood::Surprised, 0.0);
        blend.set_mood(Mood::Neutral, 0.15);

        let mut t = 0.0;
        while t < 0.8 {
            let s = blend.shape_at(t);
            assert!(s.corner_radius >= lo - 1e-4 && s.corner_radius <= hi + 1e-4);
            assert_eq!(s.top_clip_left, 0.0);
            assert_eq!(s.top_clip_right, 0.0);
            assert_eq!(s.bottom_clip, 0.0);
            t += 0.01;
        }
        assert_eq!(blend.shape_at(0.8), neutral);
    }

    #[test]
    fn retarget_keeps_displayed_shape_continuous() {
        let mut blend = ExpressionBlend::new(Mood::Neutral);
        blend.set_mood(Mood::Sleepy, 0.0);
        let before = blend.shape_at(0.1);
        blend.set_mood(Mood::Happy, 0.1);
        assert_eq!(blend.shape_at(0.1), before);
    }
}
