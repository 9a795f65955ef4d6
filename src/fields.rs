//! Smooth scalar fields over tile space.
//!
//! Value noise built on [`rand01`]: lattice points every `scale` tiles get a hashed
//! value, points in between are blended with smoothstep on both axes (C1 continuous).
//! [`Fbm`] sums octaves at doubling frequency and halving amplitude.
//!
//! Both types implement [`noise::NoiseFn`] so they can be fed through the `noise`
//! crate's combinators like any other source.

use noise::NoiseFn;

use crate::seeds::{rand01, WorldSeed};

/// Default octave count for the climate fields
pub const DEFAULT_OCTAVES: u32 = 5;

/// Single-octave smoothed value noise in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValueNoise {
    seed: u64,
    scale: f64,
}

impl ValueNoise {
    /// `scale` is the lattice spacing in tiles (must be positive).
    pub fn new(seed: u64, scale: f64) -> Self {
        debug_assert!(scale > 0.0, "noise scale must be positive");
        Self { seed, scale: scale.max(f64::MIN_POSITIVE) }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Sample at a tile-space position.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        value_noise(self.seed, x, y, self.scale)
    }

    /// Upper bound on `|d/dx sample|` (and `d/dy`), in value units per tile.
    ///
    /// Smoothstep peaks at slope 1.5 and neighbouring lattice values differ by less than 1.
    pub fn max_slope(&self) -> f64 {
        1.5 / self.scale
    }
}

impl NoiseFn<f64, 2> for ValueNoise {
    fn get(&self, point: [f64; 2]) -> f64 {
        self.sample(point[0], point[1])
    }
}

/// Fractal sum of [`ValueNoise`] octaves, normalised back into `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fbm {
    seed: u64,
    base_scale: f64,
    octaves: u32,
}

impl Fbm {
    pub fn new(seed: u64, base_scale: f64, octaves: u32) -> Self {
        Self { seed, base_scale, octaves: octaves.max(1) }
    }

    pub fn sample(&self, x: f64, y: f64) -> f64 {
        fbm(self.seed, x, y, self.base_scale, self.octaves)
    }
}

impl NoiseFn<f64, 2> for Fbm {
    fn get(&self, point: [f64; 2]) -> f64 {
        self.sample(point[0], point[1])
    }
}

/// `noise(seed, x, y, scale)`: smoothed value noise in `[0, 1]`.
pub fn value_noise(seed: u64, x: f64, y: f64, scale: f64) -> f64 {
    let gx = x / scale;
    let gy = y / scale;
    let x0 = gx.floor();
    let y0 = gy.floor();
    let u = smoothstep(gx - x0);
    let v = smoothstep(gy - y0);

    let xi = x0 as i64;
    let yi = y0 as i64;
    let a = rand01(seed, xi, yi);
    let b = rand01(seed, xi + 1, yi);
    let c = rand01(seed, xi, yi + 1);
    let d = rand01(seed, xi + 1, yi + 1);

    lerp(lerp(a, b, u), lerp(c, d, u), v)
}

/// Fractal Brownian motion over [`value_noise`].
///
/// Octave `i` uses scale `base_scale / 2^i` and amplitude `0.5^i`; the sum is divided
/// by the total amplitude so the result stays in `[0, 1]`.
pub fn fbm(seed: u64, x: f64, y: f64, base_scale: f64, octaves: u32) -> f64 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut max_value = 0.0;
    let mut scale = base_scale;

    for octave in 0..octaves.max(1) {
        // Each octave gets its own lattice so octaves don't line up
        let octave_seed = seed.wrapping_add((octave as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15));
        total += amplitude * value_noise(octave_seed, x, y, scale);
        max_value += amplitude;
        amplitude *= 0.5;
        scale *= 0.5;
    }

    total / max_value
}

pub fn smoothstep(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// The three climate fields the biome classifier reads.
///
/// Each field is salted with its own sub-seed so they are decorrelated.
#[derive(Clone, Copy, Debug)]
pub struct ClimateFields {
    pub height: Fbm,
    pub moisture: Fbm,
    pub heat: Fbm,
}

/// Raw climate values at one tile
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClimateSample {
    pub height: f64,
    pub moisture: f64,
    pub heat: f64,
}

impl ClimateFields {
    pub fn new(seed: &WorldSeed, height_scale: f64, moisture_scale: f64, heat_scale: f64, octaves: u32) -> Self {
        Self {
            height: Fbm::new(seed.derive("height"), height_scale, octaves),
            moisture: Fbm::new(seed.derive("moisture"), moisture_scale, octaves),
            heat: Fbm::new(seed.derive("heat"), heat_scale, octaves),
        }
    }

    pub fn sample(&self, tx: i32, ty: i32) -> ClimateSample {
        let point = [tx as f64, ty as f64];
        ClimateSample {
            height: self.height.get(point),
            moisture: self.moisture.get(point),
            heat: self.heat.get(point),
        }
    }
}
