use glam::Vec2;

use crate::config::FlameParameters;
use crate::noise::NoiseField;
use crate::render::target::{Blend, ColorStop, Path, RadialGradient, RenderTarget, Rgba};

/// Points sampled around the emitter ring each frame.
pub const RING_POINTS: usize = 128;

/// Flame ring radius relative to the emitter radius.
const BASE_RADIUS_RATIO: f32 = 1.32;
/// Ring center lift above the emitter center, relative to the radius.
const CROWN_LIFT_RATIO: f32 = 0.06;

// Noise phase rates, per second of drifted time.
const SHAPE_RATE: f64 = 0.15;
const SCROLL_RATE: f64 = 0.32;

const FINE_FREQUENCY: f32 = 0.65;
const FINE_SHAPE_RATE: f32 = 0.45;
const FINE_SCROLL_RATE: f32 = 0.38;
const BROAD_WEIGHT: f32 = 0.72;
const FINE_WEIGHT: f32 = 0.28;

const FBM_OCTAVES: u32 = 4;
const FBM_LACUNARITY: f32 = 2.0;
const FBM_GAIN: f32 = 0.45;

/// Final displacement gain applied on top of amplitude and intensity.
const DISPLACEMENT_GAIN: f32 = 2.5;

const GRADIENT_LIFT_RATIO: f32 = 0.22;
const GRADIENT_INNER_RATIO: f32 = 0.45;
/// How far past the ring the layer gradient fades out, per unit of amplitude.
const GRADIENT_REACH: f32 = 1.3;
const CORONA_REACH: f32 = 2.6;

struct LayerStyle {
    scale: f32,
    alpha: f32,
    inner: [u8; 3],
    outer: [u8; 3],
}

/// Halo, mid and core layers, back to front.
const LAYERS: [LayerStyle; 3] = [
    LayerStyle {
        scale: 1.08,
        alpha: 0.07,
        inner: [255, 112, 28],
        outer: [178, 48, 12],
    },
    LayerStyle {
        scale: 0.96,
        alpha: 0.13,
        inner: [255, 184, 72],
        outer: [236, 96, 20],
    },
    LayerStyle {
        scale: 0.86,
        alpha: 0.25,
        inner: [255, 244, 214],
        outer: [255, 150, 44],
    },
];

const CORONA_COLORS: [[u8; 3]; 3] = [[232, 92, 24], [184, 62, 16], [120, 40, 10]];

/// One filled shape of the flame.
#[derive(Debug, Clone, PartialEq)]
pub struct FlameLayer {
    pub path: Path,
    pub paint: RadialGradient,
    pub blend: Blend,
}

/// Everything drawn for one flame tick, in emitter-local coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlameFrame {
    /// Displaced ring vertices before smoothing.
    pub outline: Vec<Vec2>,
    /// Additive layers, halo first.
    pub layers: Vec<FlameLayer>,
    /// Soft ambient glow, normal blending.
    pub corona: Option<FlameLayer>,
}

impl FlameFrame {
    /// Every fill in draw order.
    pub fn fills(&self) -> impl Iterator<Item = &FlameLayer> {
        self.layers.iter().chain(self.corona.iter())
    }
}

/// Noise-driven flame silhouette around a circular emitter.
///
/// The only state kept between ticks is the noise permutation; the frame
/// buffer is reused to avoid reallocating every tick.
pub struct FlameRenderer {
    noise: NoiseField,
    radius: f32,
    frame: FlameFrame,
}

impl FlameRenderer {
    pub fn with_rng(radius: f32, rng: &mut fastrand::Rng) -> Self {
        Self {
            noise: NoiseField::with_rng(rng),
            radius: sanitize_radius(radius),
            frame: FlameFrame::default(),
        }
    }

    /// Emitter radius in px. Non-finite or negative values clamp to 0.
    pub fn set_radius(&mut self, radius: f32) {
        self.radius = sanitize_radius(radius);
    }

    pub fn frame(&self) -> &FlameFrame {
        &self.frame
    }

    /// Regenerate the flame for `time` seconds of flame-clock.
    pub fn build(&mut self, params: &FlameParameters, time: f64) -> &FlameFrame {
        let p = params.sanitized();
        let r = self.radius;
        let base_radius = r * BASE_RADIUS_RATIO;
        let ring_center = Vec2::new(0.0, -r * CROWN_LIFT_RATIO);

        let phase = time * p.drift as f64;
        let shape = (phase * SHAPE_RATE) as f32;
        let scroll = (phase * SCROLL_RATE) as f32;

        let outline = &mut self.frame.outline;
        outline.clear();
        for i in 0..RING_POINTS {
            let theta = i as f32 / RING_POINTS as f32 * std::f32::consts::TAU;
            let (sin, cos) = theta.sin_cos();

            let broad = self.noise.fractal_sample(
                cos * p.noise_scale + shape,
                sin * p.noise_scale - scroll,
                FBM_OCTAVES,
                FBM_LACUNARITY,
                FBM_GAIN,
            );
            let fine = self.noise.sample(
                cos * FINE_FREQUENCY + shape * FINE_SHAPE_RATE,
                sin * FINE_FREQUENCY - scroll * FINE_SCROLL_RATE,
            );
            let n = broad * BROAD_WEIGHT + fine * FINE_WEIGHT;

            let up = (-sin).max(0.0);
            let upwardness = up.powf(p.spread);
            let sideways = cos.abs() * up;
            let dir = Vec2::new(cos, sin - sideways * p.upward_bias);
            let dir = match dir.length() {
                len if len > 0.0 => dir / len,
                _ => dir,
            };

            let d = n * p.amplitude * p.intensity * upwardness * DISPLACEMENT_GAIN;
            let base = ring_center + Vec2::new(cos, sin) * base_radius;
            outline.push(base + dir * d);
        }

        let smooth = Path::smooth_closed(outline);
        let gradient_center = Vec2::new(0.0, -r * GRADIENT_LIFT_RATIO);
        let inner_radius = r * GRADIENT_INNER_RATIO;
        let outer_radius = (base_radius + p.amplitude * GRADIENT_REACH).max(inner_radius + 1.0);

        self.frame.layers.clear();
        for style in &LAYERS {
            let alpha = style.alpha * p.intensity;
            let inner = |a: f32| Rgba::from_rgb8(style.inner, a);
            let outer = |a: f32| Rgba::from_rgb8(style.outer, a);
            let paint = RadialGradient {
                center: gradient_center,
                inner_radius,
                outer_radius,
                stops: vec![
                    ColorStop { offset: 0.0, color: inner(alpha * 0.95) },
                    ColorStop { offset: 0.4, color: outer(alpha * 0.55) },
                    ColorStop { offset: 1.0, color: outer(0.0) },
                ],
            };
            // Path and gradient share the layer scale.
            self.frame.layers.push(FlameLayer {
                path: smooth.scaled_about(ring_center, style.scale),
                paint: paint.scaled_about(ring_center, style.scale),
                blend: Blend::Additive,
            });
        }

        let corona_radius = (r * CORONA_REACH).max(r + 1.0);
        self.frame.corona = Some(FlameLayer {
            path: Path::ellipse(gradient_center, Vec2::splat(corona_radius), 32),
            paint: RadialGradient {
                center: gradient_center,
                inner_radius: r,
                outer_radius: corona_radius,
                stops: vec![
                    ColorStop {
                        offset: 0.0,
                        color: Rgba::from_rgb8(CORONA_COLORS[0], 0.05 * p.intensity),
                    },
                    ColorStop {
                        offset: 0.55,
                        color: Rgba::from_rgb8(CORONA_COLORS[1], 0.022 * p.intensity),
                    },
                    ColorStop {
                        offset: 1.0,
                        color: Rgba::from_rgb8(CORONA_COLORS[2], 0.0),
                    },
                ],
            },
            blend: Blend::Normal,
        });

        &self.frame
    }

    /// Issue one fill per layer plus the corona.
    pub fn draw(frame: &FlameFrame, target: &mut dyn RenderTarget) {
        for fill in frame.fills() {
            target.fill_path(&fill.path, &fill.paint, fill.blend);
        }
    }
}

fn sanitize_radius(radius: f32) -> f32 {
    if radius.is_finite() {
        radius.max(0.0)
    } else {
        0.0
    }
}
