use glam::Vec2;

use crate::body::BodyPose;

/// Straight (non-premultiplied) RGBA color, components in 0..1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Color from 8-bit channels plus an alpha in 0..1.
    pub fn from_rgb8(rgb: [u8; 3], a: f32) -> Self {
        Self {
            r: rgb[0] as f32 / 255.0,
            g: rgb[1] as f32 / 255.0,
            b: rgb[2] as f32 / 255.0,
            a,
        }
    }

    pub fn premultiplied(self) -> [f32; 4] {
        [self.r * self.a, self.g * self.a, self.b * self.a, self.a]
    }
}

/// How a fill composites onto what is already drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blend {
    /// Source-over.
    Normal,
    /// Additive ("lighter"): overlapping fills brighten.
    Additive,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub offset: f32,
    pub color: Rgba,
}

/// Radial gradient between two concentric circles.
#[derive(Debug, Clone, PartialEq)]
pub struct RadialGradient {
    pub center: Vec2,
    pub inner_radius: f32,
    pub outer_radius: f32,
    pub stops: Vec<ColorStop>,
}

impl RadialGradient {
    /// Largest alpha over all stops.
    pub fn max_alpha(&self) -> f32 {
        self.stops.iter().map(|s| s.color.a).fold(0.0, f32::max)
    }

    /// The same gradient under a uniform scale about `origin`, matching
    /// [`Path::scaled_about`].
    pub fn scaled_about(&self, origin: Vec2, factor: f32) -> Self {
        Self {
            center: origin + (self.center - origin) * factor,
            inner_radius: self.inner_radius * factor,
            outer_radius: self.outer_radius * factor,
            stops: self.stops.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCmd {
    MoveTo(Vec2),
    LineTo(Vec2),
    QuadTo { ctrl: Vec2, to: Vec2 },
    Close,
}

/// A closed outline made of line and quadratic segments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    pub cmds: Vec<PathCmd>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(&mut self, p: Vec2) {
        self.cmds.push(PathCmd::MoveTo(p));
    }

    pub fn line_to(&mut self, p: Vec2) {
        self.cmds.push(PathCmd::LineTo(p));
    }

    pub fn quad_to(&mut self, ctrl: Vec2, to: Vec2) {
        self.cmds.push(PathCmd::QuadTo { ctrl, to });
    }

    pub fn close(&mut self) {
        self.cmds.push(PathCmd::Close);
    }

    /// Closed curve through the midpoints of consecutive points, using each
    /// point as the quadratic control. Leaves no polygon facets.
    pub fn smooth_closed(points: &[Vec2]) -> Self {
        let mut path = Path::new();
        let n = points.len();
        if n < 3 {
            return path;
        }
        path.move_to((points[n - 1] + points[0]) * 0.5);
        for i in 0..n {
            let cur = points[i];
            let next = points[(i + 1) % n];
            path.quad_to(cur, (cur + next) * 0.5);
        }
        path.close();
        path
    }

    /// Axis-aligned ellipse approximated with `segments` quadratic arcs.
    pub fn ellipse(center: Vec2, radii: Vec2, segments: usize) -> Self {
        let segments = segments.max(4);
        let step = std::f32::consts::TAU / segments as f32;
        // Control point distance for a quadratic arc spanning `step`.
        let k = 1.0 / (step * 0.5).cos();
        let at = |a: f32, scale: f32| center + Vec2::new(a.cos() * radii.x, a.sin() * radii.y) * scale;

        let mut path = Path::new();
        path.move_to(at(0.0, 1.0));
        for i in 0..segments {
            let a0 = i as f32 * step;
            path.quad_to(at(a0 + step * 0.5, k), at(a0 + step, 1.0));
        }
        path.close();
        path
    }

    /// Rectangle with rounded corners; radius is clamped to half the
    /// shorter side.
    pub fn rounded_rect(min: Vec2, max: Vec2, radius: f32) -> Self {
        let size = (max - min).max(Vec2::ZERO);
        let r = radius.clamp(0.0, size.x.min(size.y) * 0.5);
        let mut path = Path::new();
        path.move_to(Vec2::new(min.x + r, min.y));
        path.line_to(Vec2::new(max.x - r, min.y));
        path.quad_to(Vec2::new(max.x, min.y), Vec2::new(max.x, min.y + r));
        path.line_to(Vec2::new(max.x, max.y - r));
        path.quad_to(max, Vec2::new(max.x - r, max.y));
        path.line_to(Vec2::new(min.x + r, max.y));
        path.quad_to(Vec2::new(min.x, max.y), Vec2::new(min.x, max.y - r));
        path.line_to(Vec2::new(min.x, min.y + r));
        path.quad_to(min, Vec2::new(min.x + r, min.y));
        path.close();
        path
    }

    /// Copy of this path scaled by `factor` about `origin`.
    pub fn scaled_about(&self, origin: Vec2, factor: f32) -> Self {
        let map = |p: Vec2| origin + (p - origin) * factor;
        let cmds = self
            .cmds
            .iter()
            .map(|cmd| match *cmd {
                PathCmd::MoveTo(p) => PathCmd::MoveTo(map(p)),
                PathCmd::LineTo(p) => PathCmd::LineTo(map(p)),
                PathCmd::QuadTo { ctrl, to } => PathCmd::QuadTo {
                    ctrl: map(ctrl),
                    to: map(to),
                },
                PathCmd::Close => PathCmd::Close,
            })
            .collect();
        Self { cmds }
    }
}

/// Surface the engine draws into once per tick.
///
/// Flame fills arrive in emitter-local coordinates (origin at the sphere
/// center, y down). The body is described by a pose rather than geometry so
/// the target decides how the sphere, eyes and shadow are drawn.
pub trait RenderTarget {
    /// Start a new flame frame, discarding the previous one.
    fn begin_flame(&mut self);

    /// Fill a closed path with a radial gradient onto the flame surface.
    fn fill_path(&mut self, path: &Path, paint: &RadialGradient, blend: Blend);

    /// Apply the latest body transform. The pose's vertical offset moves the
    /// flame surface with the body.
    fn apply_pose(&mut self, pose: &BodyPose);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smooth_closed_emits_one_quad_per_point() {
        let pts = [
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
        ];
        let path = Path::smooth_closed(&pts);
        let quads = path
            .cmds
            .iter()
            .filter(|c| matches!(c, PathCmd::QuadTo { .. }))
            .count();
        assert_eq!(quads, 4);
        assert_eq!(path.cmds.first(), Some(&PathCmd::MoveTo(Vec2::new(0.0, 5.0))));
        assert_eq!(path.cmds.last(), Some(&PathCmd::Close));
    }

    #[test]
    fn too_few_points_yield_empty_path() {
        assert!(Path::smooth_closed(&[Vec2::ZERO, Vec2::ONE]).cmds.is_empty());
    }

    #[test]
    fn scaling_about_origin_moves_points() {
        let mut path = Path::new();
        path.move_to(Vec2::new(2.0, 0.0));
        let scaled = path.scaled_about(Vec2::new(1.0, 0.0), 2.0);
        assert_eq!(scaled.cmds[0], PathCmd::MoveTo(Vec2::new(3.0, 0.0)));
    }

    #[test]
    fn rounded_rect_clamps_radius() {
        let path = Path::rounded_rect(Vec2::ZERO, Vec2::new(10.0, 4.0), 50.0);
        // radius clamps to 2, so the first edge starts 2px in
        assert_eq!(path.cmds[0], PathCmd::MoveTo(Vec2::new(2.0, 0.0)));
    }
}
