use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use super::target::{Blend, Path, PathCmd, RadialGradient};

/// Gradient stops carried per vertex; longer gradients are truncated.
pub const MAX_STOPS: usize = 4;

/// Target length (px) of one flattened curve segment.
const FLATTEN_SEGMENT_LEN: f32 = 6.0;
const MAX_CURVE_SEGMENTS: usize = 16;

/// Triangle vertex with the whole gradient attached.
/// Stride = 112 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FillVertex {
    /// Position relative to the scene origin (px).
    pub position: [f32; 2],
    /// Gradient center in the same space as `position`.
    pub center: [f32; 2],
    /// Gradient axis scale; (1, 1) is a circular gradient.
    pub axes: [f32; 2],
    /// Inner and outer gradient radius in gradient space.
    pub radii: [f32; 2],
    pub offsets: [f32; MAX_STOPS],
    /// Premultiplied RGBA per stop.
    pub colors: [[f32; 4]; MAX_STOPS],
}

impl FillVertex {
    pub const ATTRIBS: [wgpu::VertexAttribute; 9] = wgpu::vertex_attr_array![
        0 => Float32x2, // position
        1 => Float32x2, // center
        2 => Float32x2, // axes
        3 => Float32x2, // radii
        4 => Float32x4, // offsets
        5 => Float32x4, // color 0
        6 => Float32x4, // color 1
        7 => Float32x4, // color 2
        8 => Float32x4, // color 3
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<FillVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Scale then translate, applied to both geometry and gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translate: Vec2,
    pub scale: Vec2,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translate: Vec2::ZERO,
        scale: Vec2::ONE,
    };

    pub fn new(translate: Vec2, scale: Vec2) -> Self {
        Self { translate, scale }
    }

    pub fn apply(&self, p: Vec2) -> Vec2 {
        self.translate + p * self.scale
    }
}

/// A run of vertices drawn with one blend mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub blend: Blend,
    pub vertices: Range<u32>,
}

/// Turns filled paths into triangle lists grouped by blend mode.
///
/// Paths are filled with the nonzero winding rule, so concave and
/// self-intersecting outlines (folded flame tongues) cover each pixel at
/// most once.
#[derive(Debug, Default)]
pub struct Tessellator {
    vertices: Vec<FillVertex>,
    batches: Vec<Batch>,
    scratch: Vec<Vec2>,
    sweep: SweepScratch,
    triangles: Vec<[Vec2; 3]>,
}

impl Tessellator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertices: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices),
            batches: Vec::new(),
            scratch: Vec::new(),
            sweep: SweepScratch::default(),
            triangles: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.batches.clear();
    }

    pub fn vertices(&self) -> &[FillVertex] {
        &self.vertices
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Tessellate one filled path. Fully transparent paints emit nothing.
    pub fn fill(&mut self, path: &Path, paint: &RadialGradient, blend: Blend, xf: Transform) {
        if paint.stops.is_empty() || paint.max_alpha() <= 0.0 {
            return;
        }
        flatten(path, xf.scale.abs(), &mut self.scratch);
        if self.scratch.len() < 3 {
            return;
        }

        let mut offsets = [0.0; MAX_STOPS];
        let mut colors = [[0.0; 4]; MAX_STOPS];
        for i in 0..MAX_STOPS {
            let stop = paint.stops[i.min(paint.stops.len() - 1)];
            // Padding repeats the last stop at offset 1.
            offsets[i] = if i < paint.stops.len() { stop.offset } else { 1.0 };
            colors[i] = stop.color.premultiplied();
        }

        let template = FillVertex {
            position: [0.0; 2],
            center: xf.apply(paint.center).into(),
            axes: xf.scale.abs().max(Vec2::splat(1e-6)).into(),
            radii: [paint.inner_radius, paint.outer_radius],
            offsets,
            colors,
        };

        fill_nonzero(&self.scratch, &mut self.sweep, &mut self.triangles);
        if self.triangles.is_empty() {
            return;
        }

        let start = self.vertices.len() as u32;
        for tri in &self.triangles {
            for &p in tri {
                let mut v = template;
                v.position = xf.apply(p).into();
                self.vertices.push(v);
            }
        }
        self.push_batch(blend, start..self.vertices.len() as u32);
    }

    /// Append `other`'s geometry moved by `offset`.
    pub fn append_translated(&mut self, other: &Tessellator, offset: Vec2) {
        let base = self.vertices.len() as u32;
        self.vertices.extend(other.vertices.iter().map(|v| {
            let mut v = *v;
            v.position = (Vec2::from(v.position) + offset).into();
            v.center = (Vec2::from(v.center) + offset).into();
            v
        }));
        for batch in &other.batches {
            self.push_batch(
                batch.blend,
                base + batch.vertices.start..base + batch.vertices.end,
            );
        }
    }

    fn push_batch(&mut self, blend: Blend, range: Range<u32>) {
        if let Some(last) = self.batches.last_mut() {
            if last.blend == blend && last.vertices.end == range.start {
                last.vertices.end = range.end;
                return;
            }
        }
        self.batches.push(Batch {
            blend,
            vertices: range,
        });
    }
}

/// Flatten a path into a closed polyline. Curves are split by their length
/// after scaling by `scale`.
pub fn flatten(path: &Path, scale: Vec2, out: &mut Vec<Vec2>) {
    out.clear();
    let mut cursor = Vec2::ZERO;
    for cmd in &path.cmds {
        match *cmd {
            PathCmd::MoveTo(p) => {
                // Only the first subpath is filled.
                if !out.is_empty() {
                    break;
                }
                out.push(p);
                cursor = p;
            }
            PathCmd::LineTo(p) => {
                out.push(p);
                cursor = p;
            }
            PathCmd::QuadTo { ctrl, to } => {
                let len = ((ctrl - cursor) * scale).length() + ((to - ctrl) * scale).length();
                let segments = ((len / FLATTEN_SEGMENT_LEN).ceil() as usize).clamp(1, MAX_CURVE_SEGMENTS);
                for s in 1..=segments {
                    let t = s as f32 / segments as f32;
                    let u = 1.0 - t;
                    out.push(cursor * (u * u) + ctrl * (2.0 * u * t) + to * (t * t));
                }
                cursor = to;
            }
            PathCmd::Close => break,
        }
    }
    // Drop a duplicated closing point.
    if out.len() > 1 && out[0].distance_squared(out[out.len() - 1]) < 1e-8 {
        out.pop();
    }
}

/// Slabs thinner than this are skipped.
const MIN_SLAB_HEIGHT: f32 = 1e-4;

/// Polygon edge stored top to bottom (y grows downward).
#[derive(Debug, Clone, Copy)]
struct Edge {
    top: Vec2,
    bottom: Vec2,
    /// +1 when the polygon runs downward along this edge, -1 upward.
    winding: i32,
}

impl Edge {
    fn x_at(&self, y: f32) -> f32 {
        let t = (y - self.top.y) / (self.bottom.y - self.top.y);
        self.top.x + (self.bottom.x - self.top.x) * t
    }

    /// Height of a proper crossing with `other`, if the two edges cross.
    fn crossing_y(&self, other: &Edge) -> Option<f32> {
        let r = self.bottom - self.top;
        let s = other.bottom - other.top;
        let denom = r.perp_dot(s);
        if denom == 0.0 {
            return None;
        }
        let d = other.top - self.top;
        let t = d.perp_dot(s) / denom;
        let u = d.perp_dot(r) / denom;
        (t > 0.0 && t < 1.0 && u > 0.0 && u < 1.0).then(|| self.top.y + r.y * t)
    }
}

/// Reusable buffers for [`fill_nonzero`].
#[derive(Debug, Default)]
pub struct SweepScratch {
    edges: Vec<Edge>,
    ys: Vec<f32>,
    active: Vec<usize>,
    /// (x at slab middle, x at top, x at bottom, winding) per active edge.
    spans: Vec<(f32, f32, f32, i32)>,
}

/// Nonzero-rule fill of a closed polygon, written as triangles into `out`.
///
/// The polygon is cut into horizontal slabs at every vertex and every
/// self-intersection, so no two edges cross inside a slab. Within a slab the
/// edges are ordered by x and their windings summed; each run with nonzero
/// winding becomes one trapezoid. Every emitted triangle has positive
/// `perp_dot` winding and no two triangles overlap.
pub fn fill_nonzero(points: &[Vec2], scratch: &mut SweepScratch, out: &mut Vec<[Vec2; 3]>) {
    out.clear();
    let SweepScratch {
        edges,
        ys,
        active,
        spans,
    } = scratch;
    edges.clear();
    ys.clear();
    active.clear();

    let n = points.len();
    if n < 3 {
        return;
    }
    for i in 0..n {
        let (a, b) = (points[i], points[(i + 1) % n]);
        if !(a.is_finite() && b.is_finite()) || a.y == b.y {
            continue;
        }
        let (top, bottom, winding) = if a.y < b.y { (a, b, 1) } else { (b, a, -1) };
        edges.push(Edge {
            top,
            bottom,
            winding,
        });
        ys.push(a.y);
        ys.push(b.y);
    }
    if edges.len() < 2 {
        return;
    }
    edges.sort_by(|a, b| a.top.y.total_cmp(&b.top.y));

    for (i, e) in edges.iter().enumerate() {
        for f in &edges[i + 1..] {
            if f.top.y >= e.bottom.y {
                break;
            }
            if let Some(y) = e.crossing_y(f) {
                ys.push(y);
            }
        }
    }
    ys.sort_by(f32::total_cmp);
    ys.dedup();

    let mut next = 0;
    for slab in ys.windows(2) {
        let (y0, y1) = (slab[0], slab[1]);
        if y1 - y0 < MIN_SLAB_HEIGHT {
            continue;
        }
        while next < edges.len() && edges[next].top.y <= y0 {
            active.push(next);
            next += 1;
        }
        active.retain(|&i| edges[i].bottom.y > y0);

        let mid = 0.5 * (y0 + y1);
        spans.clear();
        spans.extend(active.iter().map(|&i| {
            let e = &edges[i];
            (e.x_at(mid), e.x_at(y0), e.x_at(y1), e.winding)
        }));
        spans.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut winding = 0;
        let mut left = (0.0, 0.0);
        for &(_, x0, x1, w) in spans.iter() {
            let was_inside = winding != 0;
            winding += w;
            match (was_inside, winding != 0) {
                (false, true) => left = (x0, x1),
                (true, false) => push_trapezoid(out, y0, y1, left, (x0, x1)),
                _ => {}
            }
        }
    }
}

/// Split the trapezoid between a left and right edge (x at top, x at
/// bottom) into two triangles, dropping any that collapse.
fn push_trapezoid(out: &mut Vec<[Vec2; 3]>, y0: f32, y1: f32, left: (f32, f32), right: (f32, f32)) {
    let a = Vec2::new(left.0, y0);
    let b = Vec2::new(right.0, y0);
    let c = Vec2::new(right.1, y1);
    let d = Vec2::new(left.1, y1);
    for tri in [[a, b, c], [a, c, d]] {
        if (tri[1] - tri[0]).perp_dot(tri[2] - tri[0]) > 0.0 {
            out.push(tri);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlameParameters;
    use crate::flame::FlameRenderer;
    use crate::render::target::{ColorStop, Rgba};

    fn solid(alpha: f32) -> RadialGradient {
        RadialGradient {
            center: Vec2::ZERO,
            inner_radius: 0.0,
            outer_radius: 10.0,
            stops: vec![
                ColorStop { offset: 0.0, color: Rgba::new(1.0, 0.5, 0.0, alpha) },
                ColorStop { offset: 1.0, color: Rgba::new(1.0, 0.5, 0.0, 0.0) },
            ],
        }
    }

    fn square() -> Path {
        let mut path = Path::new();
        path.move_to(Vec2::new(0.0, 0.0));
        path.line_to(Vec2::new(10.0, 0.0));
        path.line_to(Vec2::new(10.0, 10.0));
        path.line_to(Vec2::new(0.0, 10.0));
        path.close();
        path
    }

    fn triangle_areas(vertices: &[FillVertex]) -> Vec<f32> {
        vertices
            .chunks(3)
            .map(|t| {
                let [a, b, c] = [t[0], t[1], t[2]].map(|v| Vec2::from(v.position));
                (b - a).perp_dot(c - a) * 0.5
            })
            .collect()
    }

    fn filled_area(poly: &[Vec2]) -> f32 {
        let mut tris = Vec::new();
        fill_nonzero(poly, &mut SweepScratch::default(), &mut tris);
        assert!(tris.iter().all(|[a, b, c]| (*b - *a).perp_dot(*c - *a) > 0.0));
        tris.iter().map(|[a, b, c]| (*b - *a).perp_dot(*c - *a) * 0.5).sum()
    }

    /// Nonzero winding number of `poly` around `p`, plus the distance from
    /// `p` to the nearest edge.
    fn winding_at(poly: &[Vec2], p: Vec2) -> (i32, f32) {
        let mut winding = 0;
        let mut nearest = f32::INFINITY;
        for i in 0..poly.len() {
            let (a, b) = (poly[i], poly[(i + 1) % poly.len()]);
            let ab = b - a;
            let t = ((p - a).dot(ab) / ab.length_squared().max(1e-12)).clamp(0.0, 1.0);
            nearest = nearest.min(p.distance(a + ab * t));
            let side = ab.perp_dot(p - a);
            if a.y <= p.y {
                if b.y > p.y && side > 0.0 {
                    winding += 1;
                }
            } else if b.y <= p.y && side < 0.0 {
                winding -= 1;
            }
        }
        (winding, nearest)
    }

    fn covers(tri: &[Vec2; 3], p: Vec2) -> bool {
        let [a, b, c] = *tri;
        (b - a).perp_dot(p - a) >= 0.0 && (c - b).perp_dot(p - b) >= 0.0 && (a - c).perp_dot(p - c) >= 0.0
    }

    #[test]
    fn square_fills_with_two_triangles() {
        let mut tess = Tessellator::new();
        tess.fill(&square(), &solid(1.0), Blend::Normal, Transform::IDENTITY);
        assert_eq!(tess.vertices().len(), 6);
        assert_eq!(tess.batches(), &[Batch { blend: Blend::Normal, vertices: 0..6 }]);
        let total: f32 = triangle_areas(tess.vertices()).iter().sum();
        assert!((total - 100.0).abs() < 1e-4);
    }

    #[test]
    fn concave_polygon_is_covered_exactly_once() {
        // Arrow pointing up with a deep notch in the bottom edge.
        let poly = [
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, -20.0),
            Vec2::new(20.0, 0.0),
            Vec2::new(10.0, -15.0),
        ];
        assert!((filled_area(&poly) - 50.0).abs() < 1e-3);
    }

    #[test]
    fn collinear_points_add_no_area() {
        let poly = [
            Vec2::new(0.0, 0.0),
            Vec2::new(5.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
            Vec2::new(0.0, 5.0),
        ];
        assert!((filled_area(&poly) - 100.0).abs() < 1e-4);
    }

    #[test]
    fn degenerate_polygon_emits_nothing() {
        let line = [Vec2::ZERO, Vec2::new(5.0, 0.0), Vec2::new(10.0, 0.0)];
        let mut tris = Vec::new();
        fill_nonzero(&line, &mut SweepScratch::default(), &mut tris);
        assert!(tris.is_empty());
    }

    #[test]
    fn self_intersecting_bowtie_fills_both_lobes() {
        let bowtie = [
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(0.0, 10.0),
        ];
        assert!((filled_area(&bowtie) - 50.0).abs() < 1e-3);
    }

    #[test]
    fn doubled_loop_is_filled_once() {
        let square = [
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
        ];
        let twice: Vec<Vec2> = square.iter().chain(square.iter()).copied().collect();
        assert!((filled_area(&twice) - 100.0).abs() < 1e-3);
    }

    #[test]
    fn dramatic_flame_layers_fill_without_backward_triangles() {
        let dramatic = FlameParameters {
            amplitude: 70.0,
            intensity: 2.0,
            drift: 2.5,
            noise_scale: 2.0,
            upward_bias: 1.2,
            spread: 1.8,
        };
        let extreme = FlameParameters {
            amplitude: 120.0,
            intensity: 3.0,
            drift: 2.5,
            noise_scale: 2.0,
            upward_bias: 1.2,
            spread: 1.8,
        };
        let mut flame = FlameRenderer::with_rng(80.0, &mut fastrand::Rng::with_seed(17));
        let mut outline = Vec::new();
        let mut sweep = SweepScratch::default();
        let mut tris = Vec::new();
        for params in [dramatic, extreme] {
            for step in 0..12 {
                let t = step as f64 * 0.35;
                let frame = flame.build(&params, t);
                for layer in &frame.layers {
                    flatten(&layer.path, Vec2::ONE, &mut outline);
                    fill_nonzero(&outline, &mut sweep, &mut tris);
                    assert!(!tris.is_empty());
                    assert!(
                        tris.iter().all(|[a, b, c]| (*b - *a).perp_dot(*c - *a) > 0.0),
                        "backward triangle at t {t}"
                    );

                    // Every grid sample off the outline is covered once if
                    // the outline winds around it, never otherwise.
                    let min = outline.iter().copied().fold(Vec2::splat(f32::MAX), Vec2::min);
                    let max = outline.iter().copied().fold(Vec2::splat(f32::MIN), Vec2::max);
                    let mut y = min.y + 0.37;
                    while y < max.y {
                        let mut x = min.x + 0.61;
                        while x < max.x {
                            let p = Vec2::new(x, y);
                            let (winding, nearest) = winding_at(&outline, p);
                            if nearest > 0.05 {
                                let hits = tris.iter().filter(|tri| covers(tri, p)).count();
                                assert_eq!(hits, usize::from(winding != 0), "at {p} t {t}");
                            }
                            x += 10.0;
                        }
                        y += 10.0;
                    }
                }
            }
        }
    }

    #[test]
    fn stops_are_padded_and_premultiplied() {
        let mut tess = Tessellator::new();
        tess.fill(&square(), &solid(0.5), Blend::Additive, Transform::IDENTITY);
        let v = tess.vertices()[0];
        assert_eq!(v.offsets, [0.0, 1.0, 1.0, 1.0]);
        assert_eq!(v.colors[0], [0.5, 0.25, 0.0, 0.5]);
        assert_eq!(v.colors[3], [0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn transparent_fill_is_skipped() {
        let mut tess = Tessellator::new();
        tess.fill(&square(), &solid(0.0), Blend::Additive, Transform::IDENTITY);
        assert!(tess.is_empty());
        assert!(tess.batches().is_empty());
    }

    #[test]
    fn batches_merge_by_blend() {
        let mut tess = Tessellator::new();
        tess.fill(&square(), &solid(1.0), Blend::Additive, Transform::IDENTITY);
        tess.fill(&square(), &solid(1.0), Blend::Additive, Transform::IDENTITY);
        tess.fill(&square(), &solid(1.0), Blend::Normal, Transform::IDENTITY);
        let blends: Vec<Blend> = tess.batches().iter().map(|b| b.blend).collect();
        assert_eq!(blends, vec![Blend::Additive, Blend::Normal]);
        assert_eq!(tess.batches()[0].vertices, 0..12);
    }

    #[test]
    fn transform_moves_geometry_and_gradient() {
        let mut tess = Tessellator::new();
        let xf = Transform::new(Vec2::new(100.0, 50.0), Vec2::new(2.0, 0.5));
        tess.fill(&square(), &solid(1.0), Blend::Normal, xf);
        let v = tess.vertices()[0];
        assert_eq!(v.position, [100.0, 50.0]);
        assert_eq!(v.center, [100.0, 50.0]);
        assert_eq!(v.axes, [2.0, 0.5]);
    }

    #[test]
    fn append_translated_offsets_batches() {
        let mut flame = Tessellator::new();
        flame.fill(&square(), &solid(1.0), Blend::Additive, Transform::IDENTITY);
        let mut scene = Tessellator::new();
        scene.fill(&square(), &solid(1.0), Blend::Normal, Transform::IDENTITY);
        scene.append_translated(&flame, Vec2::new(0.0, -20.0));
        assert_eq!(scene.vertices().len(), 12);
        assert_eq!(scene.vertices()[6].position, [0.0, -20.0]);
        assert_eq!(scene.vertices()[6].center, [0.0, -20.0]);
        assert_eq!(scene.batches()[1], Batch { blend: Blend::Additive, vertices: 6..12 });
    }

    #[test]
    fn flatten_splits_curves() {
        let mut path = Path::new();
        path.move_to(Vec2::ZERO);
        path.quad_to(Vec2::new(30.0, 0.0), Vec2::new(30.0, 30.0));
        path.close();
        let mut pts = Vec::new();
        flatten(&path, Vec2::ONE, &mut pts);
        assert_eq!(pts.len(), 11);
        assert_eq!(*pts.last().unwrap(), Vec2::new(30.0, 30.0));
    }

    #[test]
    fn flatten_drops_closing_duplicate() {
        let ellipse = Path::ellipse(Vec2::ZERO, Vec2::splat(20.0), 8);
        let mut pts = Vec::new();
        flatten(&ellipse, Vec2::ONE, &mut pts);
        assert!(pts[0].distance(pts[pts.len() - 1]) > 1.0);
    }
}
