use glam::Vec2;

use super::target::{Blend, ColorStop, Path, RadialGradient, Rgba};
use super::tessellate::{Tessellator, Transform};
use crate::body::{BodyPose, EyeDisplay};
use crate::mood::{EYE_GAP, EYE_HEIGHT, EYE_RAISE, EYE_WIDTH};

/// Segments used for the unit circle behind the sphere and shadow.
const CIRCLE_SEGMENTS: usize = 48;

/// Sphere body gradient, lit from the upper left.
const SPHERE_STOPS: [(f32, [u8; 3]); 4] = [
    (0.0, [255, 220, 160]),
    (0.3, [250, 146, 62]),
    (0.7, [212, 82, 26]),
    (1.0, [138, 40, 14]),
];
/// Gradient focus and reach in units of the sphere radius.
const SPHERE_LIGHT: Vec2 = Vec2::new(-0.16, -0.36);
const SPHERE_LIGHT_REACH: f32 = 1.79;
const HIGHLIGHT_CENTER: Vec2 = Vec2::new(-0.30, -0.44);
const HIGHLIGHT_REACH: f32 = 0.97;
const HIGHLIGHT_ALPHA: f32 = 0.18;
/// Rim glow band width as a fraction of the radius.
const RIM_GLOW_WIDTH: f32 = 0.28;
const RIM_GLOW_COLOR: [u8; 3] = [255, 176, 72];
const SHADOW_STOPS: [(f32, [u8; 3], f32); 3] = [
    (0.0, [255, 138, 40], 1.0),
    (0.5, [220, 90, 20], 0.4),
    (0.8, [220, 90, 20], 0.0),
];

/// Unit circle shared by every round shape.
pub struct BodyPainter {
    circle: Path,
}

impl Default for BodyPainter {
    fn default() -> Self {
        Self::new()
    }
}

impl BodyPainter {
    pub fn new() -> Self {
        Self {
            circle: Path::ellipse(Vec2::ZERO, Vec2::ONE, CIRCLE_SEGMENTS),
        }
    }

    /// Ground glow under the body. Drawn before the flame.
    pub fn paint_shadow(&self, pose: &BodyPose, out: &mut Tessellator) {
        let s = &pose.shadow;
        let radii = Vec2::new(s.width + s.blur, s.height + s.blur) * 0.5;
        let xf = Transform::new(Vec2::new(0.0, pose.offset_y + s.drop), radii);
        let stops = SHADOW_STOPS
            .iter()
            .map(|&(offset, rgb, a)| ColorStop {
                offset,
                color: Rgba::from_rgb8(rgb, a * s.opacity),
            })
            .collect();
        out.fill(&self.circle, &unit_gradient(Vec2::ZERO, 0.0, 1.0, stops), Blend::Normal, xf);
    }

    /// Sphere, highlight, rim glow and eyes. Drawn over the flame.
    pub fn paint_body(&self, pose: &BodyPose, out: &mut Tessellator) {
        let translate = Vec2::new(0.0, pose.offset_y);
        let sphere = Transform::new(translate, pose.scale * pose.radius);
        let opacity = pose.opacity;

        let body_stops = SPHERE_STOPS
            .iter()
            .map(|&(offset, rgb)| ColorStop {
                offset,
                color: Rgba::from_rgb8(rgb, opacity),
            })
            .collect();
        out.fill(
            &self.circle,
            &unit_gradient(SPHERE_LIGHT, 0.0, SPHERE_LIGHT_REACH, body_stops),
            Blend::Normal,
            sphere,
        );

        let highlight = vec![
            ColorStop {
                offset: 0.0,
                color: Rgba::new(1.0, 1.0, 1.0, HIGHLIGHT_ALPHA * opacity),
            },
            ColorStop {
                offset: 1.0,
                color: Rgba::new(1.0, 1.0, 1.0, 0.0),
            },
        ];
        out.fill(
            &self.circle,
            &unit_gradient(HIGHLIGHT_CENTER, 0.0, HIGHLIGHT_REACH, highlight),
            Blend::Normal,
            sphere,
        );

        let rim = vec![
            ColorStop {
                offset: 0.0,
                color: Rgba::from_rgb8(RIM_GLOW_COLOR, 0.0),
            },
            ColorStop {
                offset: 1.0,
                color: Rgba::from_rgb8(RIM_GLOW_COLOR, pose.core_glow * opacity),
            },
        ];
        out.fill(
            &self.circle,
            &unit_gradient(Vec2::ZERO, 1.0 - RIM_GLOW_WIDTH, 1.0, rim),
            Blend::Normal,
            sphere,
        );

        // Eyes ride the sphere transform but ignore body opacity.
        let eyes = Transform::new(translate, pose.scale);
        let pair_center = Vec2::new(0.0, -EYE_RAISE) + pose.eye_offset;
        let dx = (EYE_GAP + EYE_WIDTH) * 0.5;
        for (side, eye) in [(-1.0, &pose.left_eye), (1.0, &pose.right_eye)] {
            let center = pair_center + Vec2::new(side * dx, 0.0);
            if let Some(path) = eye_path(center, eye, pose.eye_scale_y) {
                let white = vec![ColorStop {
                    offset: 0.0,
                    color: Rgba::new(1.0, 1.0, 1.0, 1.0),
                }];
                out.fill(&path, &unit_gradient(center, 0.0, 1.0, white), Blend::Normal, eyes);
            }
        }
    }
}

/// Visible part of one eye after blink scale and clip. `None` when fully
/// clipped.
pub fn eye_path(center: Vec2, eye: &EyeDisplay, scale_y: f32) -> Option<Path> {
    let height = EYE_HEIGHT * scale_y.max(0.0);
    let top = center.y - height * 0.5 + height * eye.top_clip;
    let bottom = center.y + height * 0.5 - height * eye.bottom_clip;
    if bottom - top <= f32::EPSILON {
        return None;
    }
    let half_w = EYE_WIDTH * 0.5;
    Some(Path::rounded_rect(
        Vec2::new(center.x - half_w, top),
        Vec2::new(center.x + half_w, bottom),
        eye.corner_radius,
    ))
}

fn unit_gradient(center: Vec2, inner: f32, outer: f32, stops: Vec<ColorStop>) -> RadialGradient {
    RadialGradient {
        center,
        inner_radius: inner,
        outer_radius: outer,
        stops,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodySpring;
    use crate::render::target::PathCmd;

    #[test]
    fn body_draws_sphere_layers_and_two_eyes() {
        let pose = BodySpring::new().pose(1.0, 1.0);
        let painter = BodyPainter::new();
        let mut out = Tessellator::new();
        painter.paint_body(&pose, &mut out);
        // Sphere, highlight, rim glow share one circle; each eye adds its own.
        let circle_tris = CIRCLE_SEGMENTS;
        assert!(out.vertices().len() > circle_tris * 3 * 3);
        assert_eq!(out.batches().len(), 1);
    }

    #[test]
    fn transparent_body_keeps_eyes() {
        let pose = BodySpring::new().pose(1.0, 0.0);
        let painter = BodyPainter::new();
        let mut out = Tessellator::new();
        painter.paint_body(&pose, &mut out);
        assert!(!out.is_empty());
        assert!(out.vertices().iter().all(|v| v.colors[0] == [1.0, 1.0, 1.0, 1.0]));
    }

    #[test]
    fn shadow_sits_below_body() {
        let pose = BodySpring::new().pose(1.0, 1.0);
        let painter = BodyPainter::new();
        let mut out = Tessellator::new();
        painter.paint_shadow(&pose, &mut out);
        let center = out.vertices()[0].center;
        assert!((center[1] - (pose.radius + 18.0)).abs() < 1e-4);
    }

    #[test]
    fn eye_clip_shrinks_visible_rect() {
        let eye = EyeDisplay {
            top_clip: 0.5,
            bottom_clip: 0.0,
            corner_radius: 4.0,
        };
        let path = eye_path(Vec2::ZERO, &eye, 1.0).unwrap();
        // Top edge moves down to the eye center.
        assert_eq!(path.cmds[0], PathCmd::MoveTo(Vec2::new(-EYE_WIDTH * 0.5 + 4.0, 0.0)));
    }

    #[test]
    fn fully_clipped_eye_is_skipped() {
        let eye = EyeDisplay {
            top_clip: 0.6,
            bottom_clip: 0.5,
            corner_radius: 10.0,
        };
        assert!(eye_path(Vec2::ZERO, &eye, 1.0).is_none());
        assert!(eye_path(Vec2::ZERO, &EyeDisplay::OPEN, 0.0).is_none());
    }
}
