/// 2D gradient noise with a per-instance shuffled permutation table.
///
/// The table is built once at construction and never changes, so every
/// `NoiseField` produces a distinct but internally consistent texture.
pub struct NoiseField {
    perm: [u8; 512],
}

impl NoiseField {
    /// Build a field from a caller-provided RNG (deterministic in tests).
    pub fn with_rng(rng: &mut fastrand::Rng) -> Self {
        let mut p: [u8; 256] = std::array::from_fn(|i| i as u8);
        rng.shuffle(&mut p);

        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = p[i & 255];
        }
        Self { perm }
    }

    /// Coherent noise at (x, y). Output is in [-1, 1].
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let fx = x.floor();
        let fy = y.floor();
        let xi = (fx as i32 & 255) as usize;
        let yi = (fy as i32 & 255) as usize;
        let xf = x - fx;
        let yf = y - fy;

        let u = fade(xf);
        let v = fade(yf);

        let p = &self.perm;
        let aa = p[p[xi] as usize + yi];
        let ab = p[p[xi] as usize + yi + 1];
        let ba = p[p[xi + 1] as usize + yi];
        let bb = p[p[xi + 1] as usize + yi + 1];

        let value = lerp(
            v,
            lerp(u, grad(aa, xf, yf), grad(ba, xf - 1.0, yf)),
            lerp(u, grad(ab, xf, yf - 1.0), grad(bb, xf - 1.0, yf - 1.0)),
        );
        value.clamp(-1.0, 1.0)
    }

    /// Fractal sum of `octaves` samples, normalized by total amplitude.
    ///
    /// Frequency grows by `lacunarity` and amplitude by `gain` per octave.
    /// An octave count of zero is treated as one.
    pub fn fractal_sample(&self, x: f32, y: f32, octaves: u32, lacunarity: f32, gain: f32) -> f32 {
        let mut value = 0.0;
        let mut amp = 1.0;
        let mut freq = 1.0;
        let mut total = 0.0;
        for _ in 0..octaves.max(1) {
            value += amp * self.sample(x * freq, y * freq);
            total += amp;
            amp *= gain;
            freq *= lacunarity;
        }
        if total > 0.0 {
            (value / total).clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Quintic fade curve 6t^5 - 15t^4 + 10t^3.
fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(t: f32, a: f32, b: f32) -> f32 {
    a + t * (b - a)
}

/// Pseudo-gradient dot product keyed by the low three bits of the hash.
fn grad(hash: u8, x: f32, y: f32) -> f32 {
    let h = hash & 7;
    let (u, v) = if h < 4 { (x, y) } else { (y, x) };
    let u = if h & 1 != 0 { -u } else { u };
    let v = if h & 2 != 0 { -v } else { v };
    u + v
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64) -> NoiseField {
        NoiseField::with_rng(&mut fastrand::Rng::with_seed(seed))
    }

    #[test]
    fn permutation_is_a_doubled_shuffle() {
        let field = seeded(3);
        let mut seen = [false; 256];
        for &v in &field.perm[..256] {
            seen[v as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(field.perm[..256], field.perm[256..]);
    }

    #[test]
    fn sample_stays_in_range() {
        let field = seeded(11);
        let mut rng = fastrand::Rng::with_seed(99);
        for _ in 0..10_000 {
            let x = rng.f32() * 512.0 - 256.0;
            let y = rng.f32() * 512.0 - 256.0;
            let n = field.sample(x, y);
            assert!((-1.0..=1.0).contains(&n), "sample({x}, {y}) = {n}");
        }
    }

    #[test]
    fn sample_is_zero_on_lattice_points() {
        let field = seeded(5);
        for i in -4..4 {
            for j in -4..4 {
                assert!(field.sample(i as f32, j as f32).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn sample_is_continuous_across_cell_boundaries() {
        let field = seeded(21);
        let eps = 1e-3;
        for i in -8..8 {
            for k in 0..20 {
                let y = k as f32 * 0.173 + 0.05;
                let edge = i as f32;
                let a = field.sample(edge - eps, y);
                let b = field.sample(edge + eps, y);
                assert!((a - b).abs() < 0.02, "x jump at {edge}: {a} vs {b}");

                let c = field.sample(y, edge - eps);
                let d = field.sample(y, edge + eps);
                assert!((c - d).abs() < 0.02, "y jump at {edge}: {c} vs {d}");
            }
        }
    }

    #[test]
    fn same_table_same_output() {
        let a = seeded(42);
        let b = seeded(42);
        assert_eq!(a.sample(1.3, -7.9), b.sample(1.3, -7.9));
        assert_eq!(
            a.fractal_sample(0.4, 2.2, 4, 2.0, 0.45),
            b.fractal_sample(0.4, 2.2, 4, 2.0, 0.45)
        );
    }

    #[test]
    fn fractal_sample_stays_in_range() {
        let field = seeded(8);
        let mut rng = fastrand::Rng::with_seed(1);
        for octaves in 1..=8 {
            for &(lacunarity, gain) in &[(2.0, 0.45), (1.5, 0.9), (3.0, 0.25), (2.0, 1.0)] {
                for _ in 0..500 {
                    let x = rng.f32() * 64.0 - 32.0;
                    let y = rng.f32() * 64.0 - 32.0;
                    let n = field.fractal_sample(x, y, octaves, lacunarity, gain);
                    assert!((-1.0..=1.0).contains(&n));
                }
            }
        }
    }

    #[test]
    fn single_octave_matches_sample() {
        let field = seeded(13);
        let (x, y) = (3.7, -1.25);
        assert!((field.fractal_sample(x, y, 1, 2.0, 0.5) - field.sample(x, y)).abs() < 1e-6);
        assert_eq!(
            field.fractal_sample(x, y, 0, 2.0, 0.5),
            field.fractal_sample(x, y, 1, 2.0, 0.5)
        );
    }
}
